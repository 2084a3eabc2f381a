//! The [`StateCache`]: last-known status per file, refreshed from the backend.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use vcg_backend::BackendLink;
use vcg_policy::classify;
use vcg_types::{FileId, FileStatus, Selection, StatusReply};

use crate::entry::{CacheEntry, RefreshCompleted, RefreshMode, RefreshTicket};
use crate::error::{CacheError, CacheResult};
use crate::worker::{RefreshWorker, WorkerMessage};

/// Receiver of refresh-completed notifications.
pub type RefreshStream = broadcast::Receiver<RefreshCompleted>;

/// Tuning for a [`StateCache`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Queue a background refresh when `lookup` misses.
    pub refresh_unknown_on_lookup: bool,
    /// Capacity of the notification broadcast channel.
    pub notification_capacity: usize,
    /// Maximum number of queued requests merged into one batch.
    pub max_coalesced_requests: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            refresh_unknown_on_lookup: false,
            notification_capacity: 256,
            max_coalesced_requests: 32,
        }
    }
}

/// Result of one refresh batch.
pub(crate) struct BatchOutcome {
    pub(crate) event: RefreshCompleted,
    pub(crate) error: Option<CacheError>,
}

/// State shared between the cache handle and its refresh worker.
pub(crate) struct CacheShared {
    entries: RwLock<HashMap<FileId, CacheEntry>>,
    generation: AtomicU64,
    link: BackendLink,
    events: broadcast::Sender<RefreshCompleted>,
    /// Files with a lookup-miss refresh queued and not yet published.
    missed: Mutex<HashSet<FileId>>,
}

impl CacheShared {
    /// Query every file of `selection` under one connection and apply the
    /// results.
    ///
    /// Results are written while the connection is still held, so batches
    /// apply in the order they queried the backend.
    pub(crate) fn refresh_batch(&self, selection: &Selection) -> BatchOutcome {
        if selection.is_empty() {
            return BatchOutcome {
                event: self.apply(selection, Vec::new()).event,
                error: None,
            };
        }

        let mut conn = match self.link.connect() {
            Ok(conn) => conn,
            Err(e) => {
                warn!(error = %e, files = selection.len(), "refresh could not connect");
                return BatchOutcome {
                    event: self.fail_all(selection),
                    error: Some(CacheError::Connect(e)),
                };
            }
        };
        let replies: Vec<(FileId, StatusReply)> = selection
            .iter()
            .map(|file| (file.clone(), conn.status(file)))
            .collect();
        let outcome = self.apply(selection, replies);
        drop(conn);
        outcome
    }

    /// Classify replies and write them under a single write lock.
    fn apply(&self, selection: &Selection, replies: Vec<(FileId, StatusReply)>) -> BatchOutcome {
        let generation = self.next_generation();
        let refreshed_at = Utc::now();

        let mut failed = Vec::new();
        let mut fresh = Vec::with_capacity(replies.len());
        for (file, reply) in replies {
            if let StatusReply::Error(message) = &reply {
                debug!(file = %file, error = %message, "status query failed, keeping last-known value");
                failed.push(file);
                continue;
            }
            let status = classify(&reply);
            fresh.push(CacheEntry {
                file,
                status,
                generation,
                refreshed_at,
            });
        }

        let mut changed = Vec::new();
        let error = match self.entries.write() {
            Ok(mut entries) => {
                for entry in fresh {
                    let status = entry.status;
                    let file = entry.file.clone();
                    let previous = entries.insert(file.clone(), entry);
                    if previous.map(|p| p.status) != Some(status) {
                        changed.push(file);
                    }
                }
                None
            }
            Err(_) => {
                warn!(generation, "cache lock poisoned, refresh discarded");
                failed = selection.files().to_vec();
                Some(CacheError::Poisoned)
            }
        };

        BatchOutcome {
            event: RefreshCompleted {
                files: selection.files().to_vec(),
                nodes: selection.nodes().to_vec(),
                failed,
                changed,
                generation,
                completed_at: refreshed_at,
            },
            error,
        }
    }

    /// Notification for a batch in which no file could be refreshed.
    pub(crate) fn fail_all(&self, selection: &Selection) -> RefreshCompleted {
        RefreshCompleted {
            files: selection.files().to_vec(),
            nodes: selection.nodes().to_vec(),
            failed: selection.files().to_vec(),
            changed: Vec::new(),
            generation: self.next_generation(),
            completed_at: Utc::now(),
        }
    }

    pub(crate) fn publish(&self, event: &RefreshCompleted) {
        {
            let mut missed = self.missed.lock().unwrap_or_else(PoisonError::into_inner);
            if !missed.is_empty() {
                for file in &event.files {
                    missed.remove(file);
                }
            }
        }
        if self.events.send(event.clone()).is_err() {
            debug!(generation = event.generation, "no refresh subscribers");
        }
    }

    fn next_generation(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }
}

/// In-memory map from file to last-known [`FileStatus`], kept current by a
/// background refresh worker.
///
/// Reads never touch the backend. Writes happen only at the end of a refresh
/// batch, all files of the batch under one write lock, so a reader sees
/// either the previous value or the completed batch's value, never a mix.
/// At most one backend refresh is in flight: the worker serves one batch at
/// a time and foreground refreshes share the same backend link.
pub struct StateCache {
    shared: Arc<CacheShared>,
    requests: mpsc::UnboundedSender<WorkerMessage>,
    worker: Mutex<Option<JoinHandle<()>>>,
    config: CacheConfig,
}

impl StateCache {
    /// Create an empty cache and spawn its refresh worker on the current
    /// tokio runtime.
    pub fn start(link: BackendLink, config: CacheConfig) -> CacheResult<Self> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| CacheError::NoRuntime)?;
        let (events, _) = broadcast::channel(config.notification_capacity.max(1));
        let shared = Arc::new(CacheShared {
            entries: RwLock::new(HashMap::new()),
            generation: AtomicU64::new(0),
            link,
            events,
            missed: Mutex::new(HashSet::new()),
        });
        let (requests, rx) = mpsc::unbounded_channel();
        let worker = RefreshWorker::new(Arc::clone(&shared), config.max_coalesced_requests);
        let handle = runtime.spawn(worker.run(rx));

        info!(
            max_coalesced = config.max_coalesced_requests,
            refresh_unknown_on_lookup = config.refresh_unknown_on_lookup,
            "state cache started"
        );
        Ok(Self {
            shared,
            requests,
            worker: Mutex::new(Some(handle)),
            config,
        })
    }

    /// Last-known status of a file; `Unknown` if never resolved.
    ///
    /// Never blocks on the backend.
    pub fn lookup(&self, file: &FileId) -> FileStatus {
        let status = match self.shared.entries.read() {
            Ok(entries) => entries.get(file).map(|e| e.status),
            Err(_) => {
                warn!(file = %file, "cache lock poisoned, reporting unknown");
                return FileStatus::Unknown;
            }
        };
        match status {
            Some(status) => status,
            None => {
                if self.config.refresh_unknown_on_lookup {
                    self.queue_miss(file);
                }
                FileStatus::Unknown
            }
        }
    }

    /// Last-known status of several files, read under one lock.
    pub fn lookup_all<'a>(&self, files: impl IntoIterator<Item = &'a FileId>) -> Vec<(FileId, FileStatus)> {
        match self.shared.entries.read() {
            Ok(entries) => files
                .into_iter()
                .map(|f| (f.clone(), entries.get(f).map_or(FileStatus::Unknown, |e| e.status)))
                .collect(),
            Err(_) => files
                .into_iter()
                .map(|f| (f.clone(), FileStatus::Unknown))
                .collect(),
        }
    }

    /// Full entry of a file, including its refresh marker.
    pub fn entry(&self, file: &FileId) -> Option<CacheEntry> {
        self.shared
            .entries
            .read()
            .ok()
            .and_then(|entries| entries.get(file).cloned())
    }

    /// Populate the cache for a whole workspace.
    ///
    /// `Foreground` returns after the cache holds the result (and fails if the
    /// backend could not be reached); `Background` only queues the work.
    pub fn initialize(&self, selection: Selection, mode: RefreshMode) -> CacheResult<RefreshTicket> {
        info!(files = selection.len(), mode = ?mode, "initializing state cache");
        match mode {
            RefreshMode::Foreground => self.add_or_update(selection).map(RefreshTicket::ready),
            RefreshMode::Background => Ok(self.enqueue(selection)),
        }
    }

    /// Re-query the backend for exactly the files in `selection`.
    ///
    /// The ticket resolves to the batch's notification. A foreground refresh
    /// that cannot connect still yields a notification listing every file as
    /// failed.
    pub fn refresh(&self, selection: Selection, mode: RefreshMode) -> RefreshTicket {
        match mode {
            RefreshMode::Background => self.enqueue(selection),
            RefreshMode::Foreground => {
                let outcome = self.shared.refresh_batch(&selection);
                self.shared.publish(&outcome.event);
                RefreshTicket::ready(outcome.event)
            }
        }
    }

    /// Refresh `selection` on the caller's thread; the cache is current for
    /// it when this returns `Ok`.
    ///
    /// Blocks while a worker batch holds the backend.
    pub fn add_or_update(&self, selection: Selection) -> CacheResult<RefreshCompleted> {
        let BatchOutcome { event, error } = self.shared.refresh_batch(&selection);
        self.shared.publish(&event);
        match error {
            Some(e) => Err(e),
            None => Ok(event),
        }
    }

    /// Subscribe to refresh-completed notifications.
    pub fn subscribe(&self) -> RefreshStream {
        self.shared.events.subscribe()
    }

    /// Number of files with an entry.
    pub fn len(&self) -> usize {
        self.shared.entries.read().map_or(0, |entries| entries.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every entry, ordered by file.
    pub fn snapshot(&self) -> Vec<CacheEntry> {
        let mut entries: Vec<CacheEntry> = match self.shared.entries.read() {
            Ok(entries) => entries.values().cloned().collect(),
            Err(_) => Vec::new(),
        };
        entries.sort_by(|a, b| a.file.cmp(&b.file));
        entries
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Ask the worker to stop without waiting for it.
    pub fn stop(&self) {
        let _ = self.requests.send(WorkerMessage::Shutdown);
    }

    /// Stop the worker and wait until it exits. Requests still queued behind
    /// the shutdown resolve as canceled; later requests are canceled at once.
    pub async fn shutdown(&self) {
        self.stop();
        let handle = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!(error = %e, "refresh worker ended abnormally");
            }
        }
    }

    fn enqueue(&self, selection: Selection) -> RefreshTicket {
        let (reply, ticket) = RefreshTicket::pending();
        self.send(selection, Some(reply));
        ticket
    }

    /// Queue a refresh for a missed file unless one is already pending.
    fn queue_miss(&self, file: &FileId) {
        let fresh = self
            .shared
            .missed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(file.clone());
        if !fresh {
            return;
        }
        debug!(file = %file, "lookup miss, queueing refresh");
        if !self.send(Selection::from_files([file.clone()]), None) {
            self.shared
                .missed
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(file);
        }
    }

    fn send(&self, selection: Selection, reply: Option<oneshot::Sender<RefreshCompleted>>) -> bool {
        let files = selection.len();
        let sent = self
            .requests
            .send(WorkerMessage::Refresh { selection, reply })
            .is_ok();
        if !sent {
            debug!(files, "refresh worker stopped, request canceled");
        }
        sent
    }
}

impl Drop for StateCache {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use vcg_backend::{ConnectFailure, DepotFixture, DepotRecord, InMemoryBackend};
    use vcg_policy::{is_eligible_for_add, is_eligible_for_check_out};
    use vcg_types::{FileAction, NodeId};

    fn three_files() -> InMemoryBackend {
        InMemoryBackend::from_fixture(
            DepotFixture::default()
                .with_file("head.txt", DepotRecord::at_head(3))
                .with_file("mine.txt", DepotRecord::at_head(2).with_action(FileAction::Edit)),
        )
    }

    fn selection() -> Selection {
        Selection::from_files(["head.txt", "mine.txt", "new.txt"])
    }

    fn start(backend: &InMemoryBackend) -> StateCache {
        StateCache::start(BackendLink::new(backend.clone()), CacheConfig::default()).unwrap()
    }

    // ---------------------------------------------------------------
    // Lookup and initialization
    // ---------------------------------------------------------------

    #[tokio::test(flavor = "multi_thread")]
    async fn lookup_before_refresh_is_unknown() {
        let backend = three_files();
        let cache = start(&backend);
        assert_eq!(cache.lookup(&FileId::new("head.txt")), FileStatus::Unknown);
        assert!(cache.entry(&FileId::new("head.txt")).is_none());
        assert!(cache.is_empty());
        assert!(backend.calls().is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn initialize_three_file_scenario() {
        let backend = three_files();
        let cache = start(&backend);
        cache.initialize(selection(), RefreshMode::Foreground).unwrap();

        let statuses: Vec<FileStatus> = selection().iter().map(|f| cache.lookup(f)).collect();
        assert_eq!(
            statuses,
            vec![FileStatus::CheckedInHead, FileStatus::CheckedOut, FileStatus::NotControlled]
        );
        let checkout: Vec<bool> = statuses.iter().map(|s| is_eligible_for_check_out(*s)).collect();
        let add: Vec<bool> = statuses.iter().map(|s| is_eligible_for_add(*s)).collect();
        assert_eq!(checkout, vec![true, false, false]);
        assert_eq!(add, vec![false, false, true]);
        assert_eq!(cache.len(), 3);
        assert_eq!(backend.connect_count(), 1);
        assert_eq!(backend.disconnect_count(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn background_initialize_resolves_ticket() {
        let backend = three_files();
        let cache = start(&backend);
        let ticket = cache.initialize(selection(), RefreshMode::Background).unwrap();
        let event = ticket.wait().await.unwrap();
        assert_eq!(event.files.len(), 3);
        assert!(event.is_complete());
        assert_eq!(cache.lookup(&FileId::new("mine.txt")), FileStatus::CheckedOut);
    }

    // ---------------------------------------------------------------
    // Notifications
    // ---------------------------------------------------------------

    #[tokio::test(flavor = "multi_thread")]
    async fn notification_carries_nodes_and_fires_without_changes() {
        let backend = three_files();
        let cache = start(&backend);
        let mut events = cache.subscribe();
        cache.add_or_update(selection()).unwrap();
        let first = events.recv().await.unwrap();
        assert_eq!(first.changed.len(), 3);

        let sel = Selection::from_files(["head.txt"]).with_nodes([NodeId(7)]);
        let event = cache.refresh(sel, RefreshMode::Background).wait().await.unwrap();
        assert_eq!(event.nodes, vec![NodeId(7)]);
        assert!(event.changed.is_empty());
        assert_eq!(events.recv().await.unwrap(), event);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn lookup_after_notification_sees_refreshed_value() {
        let backend = three_files();
        let cache = start(&backend);
        cache.add_or_update(selection()).unwrap();

        let head = FileId::new("head.txt");
        backend.update(&head, |r| r.action = Some(FileAction::Edit));
        let event = cache
            .refresh(Selection::from_files([head.clone()]), RefreshMode::Background)
            .wait()
            .await
            .unwrap();
        assert_eq!(event.changed, vec![head.clone()]);
        let entry = cache.entry(&head).unwrap();
        assert_eq!(entry.status, FileStatus::CheckedOut);
        assert_eq!(entry.generation, event.generation);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn lookup_serves_last_known_value_while_refresh_in_flight() {
        let backend = three_files();
        let cache = start(&backend);
        cache.add_or_update(selection()).unwrap();

        let head = FileId::new("head.txt");
        backend.update(&head, |r| r.action = Some(FileAction::Delete));
        backend.set_status_delay(Some(Duration::from_millis(150)));
        let ticket = cache.refresh(Selection::from_files([head.clone()]), RefreshMode::Background);
        assert_eq!(cache.lookup(&head), FileStatus::CheckedInHead);
        ticket.wait().await.unwrap();
        assert_eq!(cache.lookup(&head), FileStatus::OpenForDelete);
    }

    // ---------------------------------------------------------------
    // Failures
    // ---------------------------------------------------------------

    #[tokio::test(flavor = "multi_thread")]
    async fn status_error_keeps_last_known_entry() {
        let backend = three_files();
        let cache = start(&backend);
        cache.add_or_update(selection()).unwrap();
        let before = cache.entry(&FileId::new("head.txt")).unwrap();

        backend.fail_status_on("head.txt");
        let event = cache.refresh(selection(), RefreshMode::Background).wait().await.unwrap();
        assert_eq!(event.failed, vec![FileId::new("head.txt")]);
        assert_eq!(cache.entry(&FileId::new("head.txt")).unwrap(), before);
        assert!(cache.entry(&FileId::new("mine.txt")).unwrap().generation > before.generation);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn connect_failure_fails_batch_and_leaves_cache() {
        let backend = three_files();
        let cache = start(&backend);
        cache.add_or_update(selection()).unwrap();
        let before = cache.snapshot();

        backend.set_connect_failure(Some(ConnectFailure::Init("server down".into())));
        let err = cache.add_or_update(selection()).unwrap_err();
        assert!(matches!(err, CacheError::Connect(_)));

        let event = cache.refresh(selection(), RefreshMode::Background).wait().await.unwrap();
        assert_eq!(event.failed.len(), 3);
        assert_eq!(cache.snapshot(), before);
        assert_eq!(backend.disconnect_count(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn foreground_initialize_propagates_connect_failure() {
        let backend = three_files();
        backend.set_connect_failure(Some(ConnectFailure::Config("no client".into())));
        let cache = start(&backend);
        assert!(cache.initialize(selection(), RefreshMode::Foreground).is_err());
        assert!(cache.is_empty());
    }

    // ---------------------------------------------------------------
    // Worker behavior
    // ---------------------------------------------------------------

    #[tokio::test(flavor = "multi_thread")]
    async fn requests_queued_behind_a_batch_are_coalesced() {
        let backend = three_files();
        let cache = start(&backend);
        let head = FileId::new("head.txt");

        let hold = backend.hold_status();
        let first = cache.refresh(Selection::from_files([head.clone()]), RefreshMode::Background);
        while backend.status_queries(&head) == 0 {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }

        let queued: Vec<RefreshTicket> = ["head.txt", "mine.txt", "new.txt", "head.txt"]
            .into_iter()
            .map(|f| cache.refresh(Selection::from_files([f]), RefreshMode::Background))
            .collect();
        assert_eq!(backend.connect_count(), 1);
        hold.release();

        // The in-flight batch finishes with only its own file.
        let first = first.wait().await.unwrap();
        assert_eq!(first.files, vec![head.clone()]);

        let mut events = Vec::new();
        for ticket in queued {
            events.push(ticket.wait().await.unwrap());
        }
        let generation = events[0].generation;
        assert!(generation > first.generation);
        assert!(events.iter().all(|e| e.generation == generation));
        let mut files = events[0].files.clone();
        files.sort();
        assert_eq!(
            files,
            vec![FileId::new("head.txt"), FileId::new("mine.txt"), FileId::new("new.txt")]
        );

        assert_eq!(backend.connect_count(), 2);
        assert_eq!(backend.status_queries(&head), 2);
        assert_eq!(cache.len(), 3);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn snapshots_never_mix_batches() {
        let backend = three_files();
        let cache = Arc::new(start(&backend));
        cache.add_or_update(selection()).unwrap();

        let reader = {
            let cache = Arc::clone(&cache);
            tokio::task::spawn_blocking(move || {
                for _ in 0..2000 {
                    let snapshot = cache.snapshot();
                    let first = snapshot[0].generation;
                    assert!(snapshot.iter().all(|e| e.generation == first));
                }
            })
        };
        let mut tickets = Vec::new();
        for round in 0..20u32 {
            backend.update(&FileId::new("head.txt"), |r| r.head_rev = 3 + round);
            tickets.push(cache.refresh(selection(), RefreshMode::Background));
        }
        for ticket in tickets {
            ticket.wait().await.unwrap();
        }
        reader.await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn generations_increase() {
        let backend = three_files();
        let cache = start(&backend);
        let a = cache.add_or_update(selection()).unwrap();
        let b = cache.refresh(selection(), RefreshMode::Foreground).wait().await.unwrap();
        assert!(b.generation > a.generation);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn lookup_miss_queues_refresh_when_enabled() {
        let backend = three_files();
        let config = CacheConfig {
            refresh_unknown_on_lookup: true,
            ..CacheConfig::default()
        };
        let cache = StateCache::start(BackendLink::new(backend.clone()), config).unwrap();
        let mut events = cache.subscribe();
        let head = FileId::new("head.txt");
        assert_eq!(cache.lookup(&head), FileStatus::Unknown);
        let event = events.recv().await.unwrap();
        assert_eq!(event.files, vec![head.clone()]);
        assert_eq!(cache.lookup(&head), FileStatus::CheckedInHead);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn repeated_misses_queue_one_refresh() {
        let backend = three_files();
        let config = CacheConfig {
            refresh_unknown_on_lookup: true,
            ..CacheConfig::default()
        };
        let cache = StateCache::start(BackendLink::new(backend.clone()), config).unwrap();
        let head = FileId::new("head.txt");

        let hold = backend.hold_status();
        for _ in 0..3 {
            assert_eq!(cache.lookup(&head), FileStatus::Unknown);
        }
        while backend.status_queries(&head) == 0 {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        assert_eq!(cache.lookup(&head), FileStatus::Unknown);
        hold.release();

        // The worker serves requests in order, so a duplicate would run first.
        cache
            .refresh(Selection::from_files(["mine.txt"]), RefreshMode::Background)
            .wait()
            .await
            .unwrap();
        assert_eq!(cache.lookup(&head), FileStatus::CheckedInHead);
        assert_eq!(backend.status_queries(&head), 1);
        assert_eq!(backend.connect_count(), 2);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn shutdown_cancels_later_requests() {
        let backend = three_files();
        let cache = start(&backend);
        cache.shutdown().await;
        let ticket = cache.refresh(selection(), RefreshMode::Background);
        assert!(matches!(ticket.wait().await, Err(CacheError::RefreshCanceled)));
        assert_eq!(backend.connect_count(), 0);
    }

    #[test]
    fn start_requires_runtime() {
        let link = BackendLink::new(InMemoryBackend::new());
        assert!(matches!(
            StateCache::start(link, CacheConfig::default()),
            Err(CacheError::NoRuntime)
        ));
    }
}
