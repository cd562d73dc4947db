use std::path::Path;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("failed to open PDF: {0}")]
    OpenError(String),
    #[error("failed to extract text: {0}")]
    ExtractionError(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Trait for PDF text extraction backends.
///
/// Implementations are synchronous; the pipeline runs them on the blocking
/// thread pool. A failure here is fatal for the whole run.
pub trait PdfBackend: Send + Sync {
    /// Extract the text of every non-empty page, joined by newlines.
    fn extract_text(&self, path: &Path) -> Result<String, BackendError>;
}
