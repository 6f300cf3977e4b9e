//! Error types for credential-cache.

use std::path::PathBuf;
use thiserror::Error;

/// Boxed error returned by an external verification callback.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in credential-cache.
#[derive(Debug, Error)]
pub enum Error {
    /// The external verification callback failed. No record was created.
    #[error("verification failed for subject {subject_id}: {source}")]
    VerificationFailed {
        /// Subject the verification was requested for.
        subject_id: String,
        /// Error raised by the callback.
        #[source]
        source: BoxError,
    },

    /// The durable log could not be parsed.
    ///
    /// Only surfaced when strict loading is enabled; otherwise the store
    /// recovers by starting empty.
    #[error("credential log is corrupt: {0}")]
    StorageCorrupt(String),

    /// The atomic replace of the durable log failed. The record is not committed.
    #[error("failed to write credential log {}: {source}", path.display())]
    StorageWriteFailed {
        /// Path of the durable log.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Subject identifier was empty.
    #[error("subject id must not be empty")]
    InvalidSubject,

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Returns true if this error came from the verification callback rather
    /// than from the cache itself.
    #[must_use]
    pub fn is_verification_failure(&self) -> bool {
        matches!(self, Self::VerificationFailed { .. })
    }
}
