//! Error types for the state cache.

use thiserror::Error;
use vcg_backend::BackendError;

/// Errors raised by cache refreshes.
#[derive(Debug, Error)]
pub enum CacheError {
    /// The backend connection for a refresh batch could not be opened.
    #[error("refresh could not connect: {0}")]
    Connect(#[from] BackendError),

    /// The cache map lock was poisoned by a panicking writer.
    #[error("cache lock poisoned")]
    Poisoned,

    /// The refresh worker stopped before the request completed.
    #[error("refresh canceled: worker stopped")]
    RefreshCanceled,

    /// The cache was started outside a tokio runtime.
    #[error("no tokio runtime available to run the refresh worker")]
    NoRuntime,
}

/// Convenience type alias for cache operations.
pub type CacheResult<T> = std::result::Result<T, CacheError>;
