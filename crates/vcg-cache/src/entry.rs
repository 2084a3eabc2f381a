//! Cache entries, refresh modes, and the refresh-completed notification.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;
use vcg_types::{FileId, FileStatus, NodeId};

use crate::error::{CacheError, CacheResult};

/// The last-known status of one file.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub file: FileId,
    pub status: FileStatus,
    /// Generation of the refresh that produced this value. Strictly
    /// increasing across refreshes of one cache.
    pub generation: u64,
    pub refreshed_at: DateTime<Utc>,
}

/// How a refresh request is carried out.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshMode {
    /// Query the backend on the caller's thread before returning.
    Foreground,
    /// Queue the request for the refresh worker and return immediately.
    #[default]
    Background,
}

/// Raised once per completed refresh batch, whether or not any status
/// changed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshCompleted {
    /// Every file the batch covered.
    pub files: Vec<FileId>,
    /// UI nodes referencing those files.
    pub nodes: Vec<NodeId>,
    /// Files whose status could not be determined; their entries were left
    /// untouched.
    pub failed: Vec<FileId>,
    /// Files whose status differs from the previous entry (or had none).
    pub changed: Vec<FileId>,
    pub generation: u64,
    pub completed_at: DateTime<Utc>,
}

impl RefreshCompleted {
    /// Whether every file in the batch was refreshed.
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Handle to the completion of one refresh request.
///
/// Resolves to the notification of the batch that served the request. If the
/// worker stops first, resolves to [`CacheError::RefreshCanceled`]. Dropping
/// the ticket does not cancel the refresh.
#[derive(Debug)]
pub struct RefreshTicket {
    rx: oneshot::Receiver<RefreshCompleted>,
}

impl RefreshTicket {
    pub(crate) fn pending() -> (oneshot::Sender<RefreshCompleted>, Self) {
        let (tx, rx) = oneshot::channel();
        (tx, Self { rx })
    }

    /// A ticket that is already resolved.
    pub(crate) fn ready(event: RefreshCompleted) -> Self {
        let (tx, ticket) = Self::pending();
        // The receiver is alive, so the send cannot fail.
        let _ = tx.send(event);
        ticket
    }

    /// Wait for the refresh to complete.
    pub async fn wait(self) -> CacheResult<RefreshCompleted> {
        self.rx.await.map_err(|_| CacheError::RefreshCanceled)
    }

    /// Block the current thread until the refresh completes.
    ///
    /// Must not be called from within an async execution context.
    pub fn blocking_wait(self) -> CacheResult<RefreshCompleted> {
        self.rx.blocking_recv().map_err(|_| CacheError::RefreshCanceled)
    }

    /// The result if the refresh already completed.
    pub fn try_result(&mut self) -> Option<CacheResult<RefreshCompleted>> {
        match self.rx.try_recv() {
            Ok(event) => Some(Ok(event)),
            Err(oneshot::error::TryRecvError::Empty) => None,
            Err(oneshot::error::TryRecvError::Closed) => Some(Err(CacheError::RefreshCanceled)),
        }
    }
}
