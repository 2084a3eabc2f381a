//! The refresh worker: a tokio task that serves queued refresh requests one
//! batch at a time.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};
use vcg_types::Selection;

use crate::cache::CacheShared;
use crate::entry::RefreshCompleted;

/// Messages accepted by the refresh worker.
pub(crate) enum WorkerMessage {
    Refresh {
        selection: Selection,
        reply: Option<oneshot::Sender<RefreshCompleted>>,
    },
    Shutdown,
}

pub(crate) struct RefreshWorker {
    shared: Arc<CacheShared>,
    max_coalesced: usize,
}

impl RefreshWorker {
    pub(crate) fn new(shared: Arc<CacheShared>, max_coalesced: usize) -> Self {
        Self {
            shared,
            max_coalesced: max_coalesced.max(1),
        }
    }

    /// Run until `Shutdown` is received or every sender is dropped.
    ///
    /// Requests already waiting when a batch starts are merged into it, up to
    /// `max_coalesced` requests. On shutdown the queue is closed and drained;
    /// the reply senders of drained requests are dropped so their tickets
    /// resolve as canceled.
    pub(crate) async fn run(self, mut rx: mpsc::UnboundedReceiver<WorkerMessage>) {
        debug!("refresh worker started");

        while let Some(msg) = rx.recv().await {
            let mut batch = Vec::new();
            let mut shutdown = false;
            match msg {
                WorkerMessage::Refresh { selection, reply } => batch.push((selection, reply)),
                WorkerMessage::Shutdown => shutdown = true,
            }
            while !shutdown && batch.len() < self.max_coalesced {
                match rx.try_recv() {
                    Ok(WorkerMessage::Refresh { selection, reply }) => batch.push((selection, reply)),
                    Ok(WorkerMessage::Shutdown) => shutdown = true,
                    Err(_) => break,
                }
            }

            if !batch.is_empty() {
                self.serve(batch).await;
            }

            if shutdown {
                rx.close();
                let mut canceled = 0usize;
                while let Some(msg) = rx.recv().await {
                    if let WorkerMessage::Refresh { .. } = msg {
                        canceled += 1;
                    }
                }
                info!(canceled, "refresh worker stopped");
                return;
            }
        }

        debug!("refresh worker stopped: all handles dropped");
    }

    async fn serve(&self, batch: Vec<(Selection, Option<oneshot::Sender<RefreshCompleted>>)>) {
        let requests = batch.len();
        let mut merged = Selection::new();
        let mut replies = Vec::with_capacity(requests);
        for (selection, reply) in batch {
            merged.merge(selection);
            replies.extend(reply);
        }

        let shared = Arc::clone(&self.shared);
        let work = merged.clone();
        let event = match tokio::task::spawn_blocking(move || shared.refresh_batch(&work).event).await {
            Ok(event) => event,
            Err(e) => {
                warn!(error = %e, files = merged.len(), "refresh batch panicked");
                self.shared.fail_all(&merged)
            }
        };

        debug!(
            requests,
            files = event.files.len(),
            failed = event.failed.len(),
            generation = event.generation,
            "refresh batch served"
        );
        self.shared.publish(&event);
        for reply in replies {
            if reply.send(event.clone()).is_err() {
                debug!("refresh ticket dropped before completion");
            }
        }
    }
}
