use std::path::Path;

use posconvert_core::{BackendError, PdfBackend};

/// [`PdfBackend`] implementation backed by the `pdf-extract` crate.
///
/// This crate exists to isolate the extraction dependency: the rest of
/// the pipeline only sees the trait, so the library can be swapped
/// without touching conversion code, and tests can use a mock backend.
#[derive(Debug, Default)]
pub struct PdfExtractBackend;

impl PdfExtractBackend {
    pub fn new() -> Self {
        Self
    }
}

impl PdfBackend for PdfExtractBackend {
    fn extract_text(&self, path: &Path) -> Result<String, BackendError> {
        let bytes = std::fs::read(path).map_err(|e| BackendError::OpenError(e.to_string()))?;
        pdf_extract::extract_text_from_mem(&bytes)
            .map_err(|e| BackendError::ExtractionError(e.to_string()))
    }
}
