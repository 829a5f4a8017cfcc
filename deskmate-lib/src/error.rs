//! Error types for DeskMate

use std::path::PathBuf;

use thiserror::Error;

use crate::provider::BackendError;

/// Result type alias for DeskMate operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in DeskMate operations
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid chunking parameters or settings
    #[error("config error: {0}")]
    Config(String),

    /// The embedding backend failed or returned inconsistent vectors
    #[error("embedding error: {0}")]
    Embedding(String),

    /// Failed to write or read the persisted index
    #[error("storage error: {0}")]
    Storage(String),

    /// No index has been persisted at the given location
    #[error("no index found at {}", .0.display())]
    IndexNotFound(PathBuf),

    /// Persisted index exists but cannot be trusted
    #[error("index is corrupt: {0}")]
    IndexCorrupt(String),

    /// Both the primary and the fallback generation backends failed
    #[error("generation failed: primary: {primary}; fallback: {fallback}")]
    Generation {
        primary: BackendError,
        fallback: BackendError,
    },

    /// Invalid input provided
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A long-running operation was cancelled by the caller
    #[error("operation cancelled")]
    Cancelled,
}

impl Error {
    /// Short hint telling the user what to do about this error.
    #[must_use]
    pub fn user_hint(&self) -> &'static str {
        match self {
            Error::IndexNotFound(_) | Error::IndexCorrupt(_) => {
                "run `deskmate ingest` on your documents first"
            }
            Error::Embedding(_) | Error::Generation { .. } => {
                "the model provider is unavailable; check the endpoint, API key and quota"
            }
            Error::Config(_) | Error::InvalidInput(_) => "fix the input or settings and retry",
            Error::Storage(_) => "check disk space and permissions for the index location",
            Error::Cancelled => "the operation was interrupted; nothing was written",
        }
    }
}
