//! Text extraction from uploaded files.

use std::path::Path;

use super::IngestError;

/// Pulls plain text out of one file format.
///
/// The pipeline picks the first registered extractor whose [`supports`]
/// accepts the path; a file no extractor claims is rejected at validation.
///
/// [`supports`]: TextExtractor::supports
pub trait TextExtractor: Send + Sync {
    /// Whether this extractor handles the file, judged by extension.
    fn supports(&self, path: &Path) -> bool;

    /// Extract the full text from raw file bytes.
    fn extract(&self, bytes: &[u8]) -> Result<String, IngestError>;
}

/// `pdf-extract` backed extraction for `.pdf` files.
pub struct PdfExtractor;

impl TextExtractor for PdfExtractor {
    fn supports(&self, path: &Path) -> bool {
        path.extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"))
    }

    fn extract(&self, bytes: &[u8]) -> Result<String, IngestError> {
        pdf_extract::extract_text_from_mem(bytes)
            .map_err(|err| IngestError::Extract(err.to_string()))
    }
}

/// Pass-through extraction for `.txt` and `.md` files.
pub struct PlainTextExtractor;

impl TextExtractor for PlainTextExtractor {
    fn supports(&self, path: &Path) -> bool {
        path.extension().is_some_and(|ext| {
            ext.eq_ignore_ascii_case("txt") || ext.eq_ignore_ascii_case("md")
        })
    }

    fn extract(&self, bytes: &[u8]) -> Result<String, IngestError> {
        Ok(String::from_utf8_lossy(bytes).into_owned())
    }
}
