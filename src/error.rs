//! Error types for archive-watch
//!
//! Only construction and start-up return these errors to the host. Once a
//! watch session is running, failures are either swallowed and retried on the
//! next tick, logged, or reported as a single
//! [`ExtractionEvent::Failed`](crate::types::ExtractionEvent::Failed).

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for archive-watch operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for archive-watch
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "poll_interval")
        key: Option<String>,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Archive extraction error
    #[error("extraction error: {0}")]
    Extraction(#[from] ExtractionError),

    /// Folder watching error
    #[error("folder watch error: {0}")]
    FolderWatch(String),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

/// Errors raised by the archive backends
#[derive(Debug, Error)]
pub enum ExtractionError {
    /// The archive could not be opened, listed or decoded
    #[error("failed to extract {archive}: {reason}")]
    ExtractionFailed {
        /// Archive that failed
        archive: PathBuf,
        /// What went wrong
        reason: String,
    },

    /// No backend handles this file extension
    #[error("unsupported archive format: {archive}")]
    UnsupportedFormat {
        /// Archive with the unrecognized extension
        archive: PathBuf,
    },

    /// The blocking extraction task went away before reporting a result
    #[error("extraction of {archive} was interrupted")]
    Interrupted {
        /// Archive whose extraction was interrupted
        archive: PathBuf,
    },
}

impl ExtractionError {
    pub(crate) fn failed(archive: &std::path::Path, reason: impl Into<String>) -> Self {
        ExtractionError::ExtractionFailed {
            archive: archive.to_path_buf(),
            reason: reason.into(),
        }
    }
}
