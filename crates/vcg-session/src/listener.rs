use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use vcg_cache::{RefreshCompleted, RefreshStream};
use vcg_types::SessionId;

use crate::error::SessionResult;

/// Host callback for refresh-completed notifications.
///
/// Each listener runs on its own task and sees every notification in the
/// order batches completed. An error is logged and the listener keeps
/// receiving.
#[async_trait]
pub trait RefreshListener: Send + Sync {
    async fn on_refresh(&self, event: &RefreshCompleted) -> SessionResult<()>;

    /// The listener fell behind and `missed` notifications were dropped.
    async fn on_lagged(&self, _missed: u64) -> SessionResult<()> {
        Ok(())
    }
}

pub struct NoOpListener;

#[async_trait]
impl RefreshListener for NoOpListener {
    async fn on_refresh(&self, _event: &RefreshCompleted) -> SessionResult<()> {
        Ok(())
    }
}

/// Feed `stream` into `listener` until the cache's channel closes.
pub(crate) fn spawn(
    runtime: &tokio::runtime::Handle,
    session: SessionId,
    mut stream: RefreshStream,
    listener: Arc<dyn RefreshListener>,
) -> JoinHandle<()> {
    runtime.spawn(async move {
        loop {
            match stream.recv().await {
                Ok(event) => {
                    if let Err(e) = listener.on_refresh(&event).await {
                        warn!(session = %session, generation = event.generation, error = %e, "refresh listener failed");
                    }
                }
                Err(RecvError::Lagged(missed)) => {
                    warn!(session = %session, missed, "refresh listener lagged");
                    if let Err(e) = listener.on_lagged(missed).await {
                        warn!(session = %session, error = %e, "refresh listener failed");
                    }
                }
                Err(RecvError::Closed) => break,
            }
        }
        debug!(session = %session, "refresh listener stopped");
    })
}
