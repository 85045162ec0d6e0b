//! PDF text extraction wrapper
//!
//! Wraps the pdf-extract crate behind [`TextExtractor`] so the handler can run
//! it on the blocking pool and tests can swap in canned text.

use crate::error::ExtractError;
use std::sync::Arc;

pub trait TextExtractor: Send + Sync {
    fn extract_text(&self, pdf_bytes: &[u8]) -> Result<String, ExtractError>;
}

/// Extraction backed by `pdf_extract::extract_text_from_mem`
#[derive(Debug, Default, Clone, Copy)]
pub struct PdfExtractText;

impl TextExtractor for PdfExtractText {
    fn extract_text(&self, pdf_bytes: &[u8]) -> Result<String, ExtractError> {
        pdf_extract::extract_text_from_mem(pdf_bytes)
            .map_err(|e| ExtractError::PdfExtraction(e.to_string()))
    }
}

/// Run `extractor` on the blocking pool.
///
/// pdf-extract can panic on malformed input; that surfaces as
/// `PdfExtraction` instead of tearing down the request task.
pub async fn extract_blocking(
    extractor: Arc<dyn TextExtractor>,
    pdf_bytes: Vec<u8>,
) -> Result<String, ExtractError> {
    tokio::task::spawn_blocking(move || extractor.extract_text(&pdf_bytes))
        .await
        .map_err(|e| ExtractError::PdfExtraction(format!("extraction task failed: {}", e)))?
}
