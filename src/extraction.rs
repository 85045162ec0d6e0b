//! Request/response model, prompt construction and row post-processing.

use crate::error::ExtractError;
use base64::{
    alphabet,
    engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig},
    Engine as _,
};
use serde::{Deserialize, Deserializer, Serialize};

/// Standard alphabet, padding optional.
const PDF_BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Body of `POST /api/extract`
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionRequest {
    #[serde(default)]
    pub pdf_data: Option<String>,
    #[serde(default)]
    pub additional_prompt: Option<String>,
}

impl ExtractionRequest {
    /// The base64 payload, if present and non-empty.
    pub fn pdf_data(&self) -> Option<&str> {
        self.pdf_data.as_deref().filter(|s| !s.is_empty())
    }

    pub fn additional_prompt(&self) -> Option<&str> {
        self.additional_prompt.as_deref().filter(|s| !s.is_empty())
    }
}

/// One line item as returned by the model.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductRow {
    #[serde(default, deserialize_with = "lenient_string")]
    pub produto: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub descricao: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub um: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub quantidade: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub preco_venda: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub total: String,
    /// Keys outside the six columns, passed through as returned.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// A [`ProductRow`] with its 1-based position. `item` serializes first.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexedProductRow {
    pub item: String,
    #[serde(flatten)]
    pub row: ProductRow,
}

/// Accepts strings, numbers and booleans as text; `null` becomes "".
fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    match value {
        serde_json::Value::Null => Ok(String::new()),
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        serde_json::Value::Bool(b) => Ok(b.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected a string value, got {}",
            other
        ))),
    }
}

/// Decode the client's base64 PDF payload. ASCII whitespace is ignored.
pub fn decode_pdf_data(data: &str) -> Result<Vec<u8>, ExtractError> {
    let compact: String = data.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    Ok(PDF_BASE64.decode(compact)?)
}

/// Build the extraction prompt sent to the model.
///
/// The column list and expected object shape are fixed; the user's extra
/// instructions and the PDF text are embedded verbatim.
pub fn build_prompt(pdf_text: &str, additional_prompt: Option<&str>) -> String {
    let additional = additional_prompt
        .filter(|p| !p.is_empty())
        .map(|p| format!("Instruções adicionais do usuário: {}", p))
        .unwrap_or_default();

    format!(
        r#"Extraia os dados de produtos do texto abaixo e formate-os em uma planilha com as seguintes colunas:
- Produto: O código do produto.
- Descricao: A descrição completa do produto.
- UM: A unidade de medida.
- Quantidade: A quantidade.
- Preco Venda: O preço de venda.
- Total: O preço total.
{}

TEXTO DO PDF:
"{}"

A resposta deve ser um array de objetos JSON, onde cada objeto representa uma linha da tabela, seguindo a estrutura:
{{
  "produto": "string",
  "descricao": "string",
  "um": "string",
  "quantidade": "string",
  "precoVenda": "string",
  "total": "string"
}}"#,
        additional, pdf_text
    )
}

/// Parse the model's JSON text into rows.
///
/// Tolerates a Markdown code fence around the array.
pub fn parse_rows(text: &str) -> Result<Vec<ProductRow>, ExtractError> {
    let trimmed = text.trim();
    let json_text = if trimmed.starts_with("```") {
        trimmed
            .lines()
            .skip(1)
            .take_while(|l| !l.starts_with("```"))
            .collect::<Vec<_>>()
            .join("\n")
    } else {
        trimmed.to_string()
    };

    Ok(serde_json::from_str(&json_text)?)
}

/// Number rows from 1, leaving every other field untouched.
///
/// An `item` key sent by the model is replaced by the row position.
pub fn index_rows(rows: Vec<ProductRow>) -> Vec<IndexedProductRow> {
    rows.into_iter()
        .enumerate()
        .map(|(i, mut row)| {
            row.extra.remove("item");
            IndexedProductRow {
                item: (i + 1).to_string(),
                row,
            }
        })
        .collect()
}
