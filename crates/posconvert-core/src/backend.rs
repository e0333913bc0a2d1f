use std::path::Path;

use thiserror::Error;

/// Errors from a PDF text-extraction backend.
#[derive(Error, Debug)]
pub enum BackendError {
    #[error("failed to open PDF: {0}")]
    OpenError(String),
    #[error("failed to extract text: {0}")]
    ExtractionError(String),
}

/// Text extraction seam for PDF files.
///
/// The conversion pipeline only ever sees this trait; the concrete
/// extraction library lives in its own crate so it can be swapped (or
/// mocked in tests) without touching the pipeline.
pub trait PdfBackend: Send + Sync {
    /// Extract the full page text of the PDF at `path`.
    fn extract_text(&self, path: &Path) -> Result<String, BackendError>;
}
