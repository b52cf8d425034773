//! Error types for the render service

use thiserror::Error;

/// Result type alias for service operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while rendering and relaying a document
#[derive(Error, Debug)]
pub enum Error {
    /// Failed to launch the browser backend
    #[error("Browser launch failed: {0}")]
    Launch(String),

    /// Failed to load the document
    #[error("Navigation failed: {0}")]
    Navigation(String),

    /// Failed to evaluate a script in the page
    #[error("Page evaluation failed: {0}")]
    Evaluation(String),

    /// Failed to capture the viewport
    #[error("Capture failed: {0}")]
    Capture(String),

    /// Local storage fault (temp files, artifact writes)
    #[error("Storage error: {0}")]
    Storage(#[from] std::io::Error),

    /// Re-encoding the capture failed (advisory; swallowed by the orchestrator)
    #[error("Image compression failed: {0}")]
    Compression(String),

    /// The object store is not configured; uploads cannot proceed
    #[error("object store is not configured: set endpoint, credentials, and bucket")]
    StoreNotConfigured,

    /// The object store rejected or failed the upload
    #[error("Upload failed: {0}")]
    Upload(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Error::Other(err.to_string())
    }
}
