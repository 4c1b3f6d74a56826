//! PDF text extraction utilities.
//!
//! Text is extracted from an in-memory buffer with the pdf-extract crate.
//! Extraction is CPU bound, so async callers should run it on a blocking
//! thread.

use thiserror::Error;

/// Magic bytes every PDF document starts with
const PDF_MAGIC: &[u8] = b"%PDF";

/// Errors that can occur during PDF extraction
#[derive(Debug, Error)]
pub enum PdfExtractError {
    #[error("Not a PDF document")]
    NotPdf,

    #[error("Failed to extract text from PDF: {0}")]
    ExtractionFailed(String),
}

/// Check the leading bytes for the PDF signature
pub fn looks_like_pdf(bytes: &[u8]) -> bool {
    bytes
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .is_some_and(|start| bytes[start..].starts_with(PDF_MAGIC))
}

/// Extract text from a PDF held in memory.
pub fn extract_text_from_bytes(bytes: &[u8]) -> Result<String, PdfExtractError> {
    if !looks_like_pdf(bytes) {
        return Err(PdfExtractError::NotPdf);
    }

    let text = pdf_extract::extract_text_from_mem(bytes)
        .map_err(|e| PdfExtractError::ExtractionFailed(e.to_string()))?;

    if text.trim().is_empty() {
        // Usually a scanned, image-only document
        tracing::debug!(bytes = bytes.len(), "extracted empty text from PDF");
    }

    Ok(text)
}
