use thiserror::Error;
use vcg_backend::BackendError;

/// Errors that fail a whole batch.
///
/// Per-file command failures are not errors; they are recorded in the
/// [`BatchReport`](crate::BatchReport).
#[derive(Debug, Error)]
pub enum ExecError {
    /// The backend connection could not be opened. No file was attempted and
    /// no refresh was queued.
    #[error("could not connect to backend: {0}")]
    Connect(#[from] BackendError),
}

/// Convenience type alias for executor operations.
pub type ExecResult<T> = std::result::Result<T, ExecError>;
