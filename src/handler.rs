//! HTTP surface
//!
//! - POST /api/extract - base64 PDF in, indexed product rows out
//! - GET /health - liveness check
//!
//! Every response body is JSON; failures are always `{"error": "..."}`.

use crate::error::{bad_request, method_not_allowed, payload_too_large, ApiError, ExtractError};
use crate::extraction::{self, ExtractionRequest, IndexedProductRow};
use crate::gemini::GeminiClient;
use crate::pdf_extractor::{self, PdfExtractText, TextExtractor};
use crate::settings::Settings;
use axum::{
    body::Body,
    extract::State,
    http::{header, Method},
    response::Json,
    routing::{any, get},
    Router,
};
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Clone)]
pub struct AppState {
    pub extractor: Arc<dyn TextExtractor>,
    pub gemini: GeminiClient,
    pub max_body_bytes: usize,
}

impl AppState {
    pub fn new(settings: &Settings) -> Self {
        Self {
            extractor: Arc::new(PdfExtractText),
            gemini: GeminiClient::new(
                settings.gemini_base_url.clone(),
                settings.gemini_model.clone(),
                settings.gemini_api_key.clone(),
            ),
            max_body_bytes: settings.max_body_bytes,
        }
    }
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/api/extract", any(extract_handler))
        .route("/health", get(health_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ============================================================================
// Handlers
// ============================================================================

// ANY /api/extract
async fn extract_handler(
    State(state): State<AppState>,
    method: Method,
    body: Body,
) -> Result<Json<Vec<IndexedProductRow>>, ApiError> {
    if method != Method::POST {
        return Err(method_not_allowed());
    }

    let bytes = axum::body::to_bytes(body, state.max_body_bytes)
        .await
        .map_err(|_| payload_too_large(state.max_body_bytes))?;

    let req: ExtractionRequest = serde_json::from_slice(&bytes)
        .map_err(|e| bad_request(format!("Invalid JSON body: {}", e)))?;

    let pdf_data = req
        .pdf_data()
        .ok_or_else(|| bad_request("No PDF data was provided."))?;

    match run_extraction(&state, pdf_data, req.additional_prompt()).await {
        Ok(rows) => Ok(Json(rows)),
        Err(e) => {
            tracing::error!(error = %e, "PDF extraction request failed");
            Err(e.into())
        }
    }
}

/// Decode, extract, prompt, call Gemini, number the rows.
async fn run_extraction(
    state: &AppState,
    pdf_data: &str,
    additional_prompt: Option<&str>,
) -> Result<Vec<IndexedProductRow>, ExtractError> {
    let pdf_bytes = extraction::decode_pdf_data(pdf_data)?;
    tracing::debug!(bytes = pdf_bytes.len(), "Decoded PDF payload");

    let text = pdf_extractor::extract_blocking(state.extractor.clone(), pdf_bytes).await?;
    tracing::debug!(chars = text.len(), "Extracted PDF text");

    let prompt = extraction::build_prompt(&text, additional_prompt);
    let rows = state.gemini.generate_rows(&prompt).await?;

    tracing::info!(rows = rows.len(), model = state.gemini.model(), "Extracted product rows");
    Ok(extraction::index_rows(rows))
}

// GET /health
async fn health_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok", "version": VERSION }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        extract::Query,
        http::{Request, StatusCode, Uri},
        response::{IntoResponse, Response},
    };
    use secrecy::SecretString;
    use serde_json::{json, Value};
    use std::collections::HashMap;
    use std::sync::Mutex;
    use tower::ServiceExt; // for `oneshot`
    use url::Url;

    const PDF_TEXT: &str = "A1 Widget PC 3 10,00 30,00";

    struct FixedText;

    impl TextExtractor for FixedText {
        fn extract_text(&self, _pdf_bytes: &[u8]) -> Result<String, ExtractError> {
            Ok(PDF_TEXT.to_string())
        }
    }

    /// What the fake Gemini endpoint saw and how it answers.
    #[derive(Clone)]
    struct MockGemini {
        status: StatusCode,
        body: Value,
        seen: Arc<Mutex<Vec<(String, HashMap<String, String>, Value)>>>,
    }

    async fn mock_generate(
        State(mock): State<MockGemini>,
        uri: Uri,
        Query(query): Query<HashMap<String, String>>,
        Json(payload): Json<Value>,
    ) -> Response {
        mock.seen
            .lock()
            .unwrap()
            .push((uri.path().to_string(), query, payload));
        (mock.status, Json(mock.body.clone())).into_response()
    }

    fn envelope(text: &str) -> Value {
        json!({
            "candidates": [{
                "content": { "role": "model", "parts": [{ "text": text }] },
                "finishReason": "STOP"
            }]
        })
    }

    /// Start a fake Gemini server and build app state pointing at it.
    async fn setup(status: StatusCode, body: Value) -> (AppState, MockGemini) {
        let mock = MockGemini {
            status,
            body,
            seen: Arc::new(Mutex::new(Vec::new())),
        };
        let app = Router::new().fallback(mock_generate).with_state(mock.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let state = AppState {
            extractor: Arc::new(FixedText),
            gemini: GeminiClient::new(
                Url::parse(&format!("http://{}", addr)).unwrap(),
                "gemini-test",
                SecretString::from("test-key"),
            ),
            max_body_bytes: 1024 * 1024,
        };
        (state, mock)
    }

    fn post(body: Value) -> Request<Body> {
        Request::builder()
            .method(Method::POST)
            .uri("/api/extract")
            .header("Content-Type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn send(state: AppState, request: Request<Body>) -> (StatusCode, Value) {
        let response = router(state).oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_extract_rows() {
        let reply = r#"[{"produto":"A1","descricao":"Widget","um":"PC","quantidade":"3","precoVenda":"10.00","total":"30.00"}]"#;
        let (state, mock) = setup(StatusCode::OK, envelope(reply)).await;

        let (status, body) = send(
            state,
            post(json!({ "pdfData": "ZHVtbXk=", "additionalPrompt": "only rows with quantity > 0" })),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!([{
                "item": "1", "produto": "A1", "descricao": "Widget", "um": "PC",
                "quantidade": "3", "precoVenda": "10.00", "total": "30.00"
            }])
        );

        let seen = mock.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        let (path, query, payload) = &seen[0];
        assert_eq!(path, "/v1beta/models/gemini-test:generateContent");
        assert_eq!(query.get("key").map(String::as_str), Some("test-key"));
        let prompt = payload["contents"][0]["parts"][0]["text"].as_str().unwrap();
        assert!(prompt.contains(PDF_TEXT));
        assert!(prompt.contains("only rows with quantity > 0"));
        assert_eq!(payload["generationConfig"]["responseMimeType"], "application/json");
    }

    #[tokio::test]
    async fn test_rows_numbered_in_order() {
        let reply = json!([
            { "produto": "A1" },
            { "produto": "A2", "total": "5" },
            { "produto": "A3" }
        ])
        .to_string();
        let (state, _mock) = setup(StatusCode::OK, envelope(&reply)).await;

        let (status, body) = send(state, post(json!({ "pdfData": "ZHVtbXk=" }))).await;

        assert_eq!(status, StatusCode::OK);
        let rows = body.as_array().unwrap();
        assert_eq!(rows.len(), 3);
        for (i, row) in rows.iter().enumerate() {
            assert_eq!(row["item"], (i + 1).to_string());
            assert_eq!(row["produto"], format!("A{}", i + 1));
        }
        assert_eq!(rows[1]["total"], "5");
        assert_eq!(rows[0]["descricao"], "");
    }

    #[tokio::test]
    async fn test_non_post_is_405() {
        for method in [Method::GET, Method::PUT, Method::DELETE, Method::PATCH] {
            let (state, mock) = setup(StatusCode::OK, envelope("[]")).await;
            let request = Request::builder()
                .method(method)
                .uri("/api/extract")
                .body(Body::empty())
                .unwrap();

            let (status, body) = send(state, request).await;
            assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
            assert!(body["error"].is_string());
            assert!(mock.seen.lock().unwrap().is_empty());
        }
    }

    #[tokio::test]
    async fn test_missing_pdf_data_is_400() {
        for payload in [json!({}), json!({ "pdfData": "" }), json!({ "additionalPrompt": "x" })] {
            let (state, mock) = setup(StatusCode::OK, envelope("[]")).await;
            let (status, body) = send(state, post(payload)).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert!(body["error"].is_string());
            assert!(mock.seen.lock().unwrap().is_empty());
        }
    }

    #[tokio::test]
    async fn test_invalid_json_body_is_400() {
        let (state, _mock) = setup(StatusCode::OK, envelope("[]")).await;
        let request = Request::builder()
            .method(Method::POST)
            .uri("/api/extract")
            .body(Body::from("pdfData=abc"))
            .unwrap();

        let (status, body) = send(state, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().starts_with("Invalid JSON body"));
    }

    #[tokio::test]
    async fn test_oversized_body_is_413() {
        let (mut state, _mock) = setup(StatusCode::OK, envelope("[]")).await;
        state.max_body_bytes = 16;

        let (status, body) = send(state, post(json!({ "pdfData": "ZHVtbXk=ZHVtbXk=ZHVtbXk=" }))).await;
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn test_gemini_error_status_is_500() {
        let (state, _mock) = setup(
            StatusCode::SERVICE_UNAVAILABLE,
            json!({ "error": { "message": "overloaded" } }),
        )
        .await;

        let (status, body) = send(state, post(json!({ "pdfData": "ZHVtbXk=" }))).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        let message = body["error"].as_str().unwrap();
        assert!(message.contains("503"));
        assert!(message.contains("overloaded"));
    }

    #[tokio::test]
    async fn test_malformed_model_json_is_500() {
        let (state, _mock) = setup(StatusCode::OK, envelope("this is not json")).await;

        let (status, body) = send(state, post(json!({ "pdfData": "ZHVtbXk=" }))).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body["error"].as_str().unwrap().starts_with("Failed to parse rows"));
    }

    #[tokio::test]
    async fn test_empty_candidates_is_500() {
        let (state, _mock) = setup(StatusCode::OK, json!({ "candidates": [] })).await;

        let (status, body) = send(state, post(json!({ "pdfData": "ZHVtbXk=" }))).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Gemini response has no text content");
    }

    #[tokio::test]
    async fn test_invalid_base64_is_500() {
        let (state, mock) = setup(StatusCode::OK, envelope("[]")).await;

        let (status, body) = send(state, post(json!({ "pdfData": "%%%not base64%%%" }))).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body["error"].as_str().unwrap().starts_with("Invalid base64"));
        assert!(mock.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unparseable_pdf_is_500() {
        let (mut state, mock) = setup(StatusCode::OK, envelope("[]")).await;
        state.extractor = Arc::new(PdfExtractText);

        let (status, body) = send(state, post(json!({ "pdfData": "ZHVtbXk=" }))).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body["error"].as_str().unwrap().starts_with("Failed to extract text from PDF"));
        assert!(mock.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unreachable_gemini_is_500() {
        let (mut state, _mock) = setup(StatusCode::OK, envelope("[]")).await;
        // Port 9 (discard) is not listening locally
        state.gemini = GeminiClient::new(
            Url::parse("http://127.0.0.1:9").unwrap(),
            "gemini-test",
            SecretString::from("test-key"),
        );

        let (status, body) = send(state, post(json!({ "pdfData": "ZHVtbXk=" }))).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        let message = body["error"].as_str().unwrap();
        assert!(message.starts_with("Gemini request failed"));
        assert!(!message.contains("test-key"));
        assert!(!message.contains("key="));
    }

    #[tokio::test]
    async fn test_undecodable_envelope_hides_api_key() {
        let (state, _mock) = setup(StatusCode::OK, json!("not an envelope")).await;

        let (status, body) = send(state, post(json!({ "pdfData": "ZHVtbXk=" }))).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        let message = body["error"].as_str().unwrap();
        assert!(message.starts_with("Gemini request failed"));
        assert!(!message.contains("test-key"));
    }

    #[tokio::test]
    async fn test_health() {
        let (state, _mock) = setup(StatusCode::OK, envelope("[]")).await;
        let request = Request::builder().uri("/health").body(Body::empty()).unwrap();

        let (status, body) = send(state, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }
}
