//! Error types for the extraction pipeline and the HTTP boundary.
//!
//! Everything that can go wrong after request validation is an
//! [`ExtractError`]; the handler turns any of them into a 500 with the
//! same `{ "error": ... }` body used for client errors.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("Invalid base64 PDF data: {0}")]
    Decode(#[from] base64::DecodeError),

    #[error("Failed to extract text from PDF: {0}")]
    PdfExtraction(String),

    /// Built through [`ExtractError::http`], which strips the request URL.
    #[error("Gemini request failed: {0}")]
    Http(reqwest::Error),

    #[error("Gemini API error: {status} - {body}")]
    GeminiStatus { status: u16, body: String },

    #[error("Gemini response has no text content")]
    EmptyResponse,

    #[error("Failed to parse rows from Gemini response: {0}")]
    MalformedRows(#[from] serde_json::Error),
}

impl ExtractError {
    /// The request URL carries the API key, so it never reaches the message.
    pub fn http(e: reqwest::Error) -> Self {
        ExtractError::Http(e.without_url())
    }
}

// ============================================================================
// HTTP error response
// ============================================================================

/// Status code plus message, rendered as `{"error": message}`.
#[derive(Debug)]
pub struct ApiError(pub StatusCode, pub String);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.0, Json(serde_json::json!({ "error": self.1 }))).into_response()
    }
}

impl From<ExtractError> for ApiError {
    fn from(e: ExtractError) -> Self {
        ApiError(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
    }
}

pub fn bad_request(msg: impl Into<String>) -> ApiError {
    ApiError(StatusCode::BAD_REQUEST, msg.into())
}

pub fn method_not_allowed() -> ApiError {
    ApiError(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed.".to_string())
}

pub fn payload_too_large(limit: usize) -> ApiError {
    ApiError(
        StatusCode::PAYLOAD_TOO_LARGE,
        format!("Request body exceeds {} bytes.", limit),
    )
}
