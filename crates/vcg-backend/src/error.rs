//! Error types for backend operations.

use std::time::Duration;

use thiserror::Error;
use vcg_types::FileId;

/// Errors raised by a backend connection or one of its commands.
#[derive(Debug, Error)]
pub enum BackendError {
    /// The backend is misconfigured (server, user, or client missing).
    #[error("backend configuration error: {0}")]
    Config(String),

    /// The backend could not be initialized or reached.
    #[error("backend initialization error: {0}")]
    Init(String),

    /// A command was issued without a successful connect.
    #[error("backend is not connected")]
    NotConnected,

    /// The backend rejected a per-file command.
    #[error("{file}: {message}")]
    Rejected { file: FileId, message: String },

    /// The backend did not answer in time.
    #[error("backend timed out after {0:?}")]
    Timeout(Duration),

    /// Depot fixture could not be parsed or written.
    #[error("fixture error: {0}")]
    Fixture(String),

    /// I/O error while reading or writing a fixture.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl BackendError {
    /// Create a per-file rejection.
    pub fn rejected(file: &FileId, message: impl Into<String>) -> Self {
        Self::Rejected {
            file: file.clone(),
            message: message.into(),
        }
    }

    /// Whether this error means the connection itself could not be opened.
    ///
    /// Configuration and initialization failures are treated identically by
    /// the core: the enclosing operation fails and nothing is retried.
    pub fn is_connect_failure(&self) -> bool {
        matches!(self, Self::Config(_) | Self::Init(_) | Self::Timeout(_))
    }
}

/// Convenience type alias for backend operations.
pub type BackendResult<T> = std::result::Result<T, BackendError>;
