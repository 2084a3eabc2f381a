use std::path::PathBuf;

use thiserror::Error;
use vcg_cache::CacheError;
use vcg_exec::ExecError;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("cannot access {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("session has no workspace root")]
    NoRoot,

    #[error("workspace scan failed: {0}")]
    Scan(String),

    #[error("no tokio runtime available")]
    NoRuntime,

    #[error("listener failed: {0}")]
    Listener(String),

    #[error("cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("executor error: {0}")]
    Exec(#[from] ExecError),
}

impl SessionError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Convenience type alias for session operations.
pub type SessionResult<T> = std::result::Result<T, SessionError>;
