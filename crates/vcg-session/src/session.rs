use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use vcg_backend::{BackendLink, LocalFs, VcsBackend, WorkspaceFs};
use vcg_cache::{CacheEntry, RefreshMode, RefreshStream, RefreshTicket, StateCache};
use vcg_exec::{BatchReport, CommandExecutor};
use vcg_policy::{glyph_for, is_eligible, permitted, Glyph, OperationSet};
use vcg_query::{Decider, EditOutcome, QueryEditFlags, QueryProtocol, QuerySaveFlags, SaveOutcome};
use vcg_types::{CommandKind, FileId, FileStatus, Operation, Selection, SessionId};

use crate::config::SessionConfig;
use crate::error::{SessionError, SessionResult};
use crate::listener::{self, RefreshListener};
use crate::scan::scan_workspace;

/// Everything scoped to one open workspace.
///
/// The backend link, the state cache and the approval set are created
/// together in [`open`](Self::open) and dropped together in
/// [`close`](Self::close). The cache and the link always refer to the same
/// workspace.
pub struct WorkspaceSession {
    id: SessionId,
    root: Option<PathBuf>,
    config: SessionConfig,
    opened_at: DateTime<Utc>,
    fs: Arc<dyn WorkspaceFs>,
    cache: Arc<StateCache>,
    executor: Arc<CommandExecutor>,
    query: QueryProtocol,
    listeners: Mutex<Vec<JoinHandle<()>>>,
}

impl WorkspaceSession {
    /// Open a session over `backend` and the host filesystem `fs`.
    ///
    /// Must be called inside a tokio runtime; the refresh worker is spawned
    /// on it.
    pub fn open(
        backend: impl VcsBackend + 'static,
        fs: Arc<dyn WorkspaceFs>,
        decider: Arc<dyn Decider>,
        config: SessionConfig,
    ) -> SessionResult<Self> {
        Self::open_inner(None, backend, fs, decider, config)
    }

    /// Open a session over a workspace directory on the local disk.
    pub fn open_local(
        root: impl Into<PathBuf>,
        backend: impl VcsBackend + 'static,
        decider: Arc<dyn Decider>,
        config: SessionConfig,
    ) -> SessionResult<Self> {
        let root = root.into();
        let fs: Arc<dyn WorkspaceFs> = Arc::new(LocalFs::new(root.clone()));
        Self::open_inner(Some(root), backend, fs, decider, config)
    }

    fn open_inner(
        root: Option<PathBuf>,
        backend: impl VcsBackend + 'static,
        fs: Arc<dyn WorkspaceFs>,
        decider: Arc<dyn Decider>,
        config: SessionConfig,
    ) -> SessionResult<Self> {
        config.validate()?;
        let id = SessionId::new();
        let link = BackendLink::new(backend);
        let cache = Arc::new(StateCache::start(link.clone(), config.cache_config())?);
        let executor = Arc::new(CommandExecutor::new(link, Arc::clone(&cache), Arc::clone(&fs)));
        let query = QueryProtocol::new(
            Arc::clone(&cache),
            Arc::clone(&executor),
            Arc::clone(&fs),
            decider,
            config.query_policy(),
        );

        info!(
            session = %id,
            root = ?root,
            server = config.backend.server.as_deref().unwrap_or("-"),
            user = config.backend.user.as_deref().unwrap_or("-"),
            client = config.backend.client.as_deref().unwrap_or("-"),
            "workspace session opened"
        );
        Ok(Self {
            id,
            root,
            config,
            opened_at: Utc::now(),
            fs,
            cache,
            executor,
            query,
            listeners: Mutex::new(Vec::new()),
        })
    }

    /// Stop the refresh worker, drop the cache, the link and the approvals,
    /// and wait for listeners to drain the notifications already raised.
    pub async fn close(self) {
        let Self {
            id,
            cache,
            executor,
            query,
            listeners,
            ..
        } = self;
        cache.shutdown().await;
        drop(query);
        drop(executor);
        drop(cache);

        let handles = listeners.into_inner().unwrap_or_else(PoisonError::into_inner);
        for handle in handles {
            if let Err(e) = handle.await {
                warn!(session = %id, error = %e, "refresh listener ended abnormally");
            }
        }
        info!(session = %id, "workspace session closed");
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn opened_at(&self) -> DateTime<Utc> {
        self.opened_at
    }

    pub fn cache(&self) -> &StateCache {
        &self.cache
    }

    pub fn fs(&self) -> &dyn WorkspaceFs {
        self.fs.as_ref()
    }

    /// The query protocol, for approval management.
    pub fn query(&self) -> &QueryProtocol {
        &self.query
    }

    pub fn set_decider(&mut self, decider: Arc<dyn Decider>) {
        self.query.set_decider(decider);
    }

    // -----------------------------------------------------------------------
    // Status
    // -----------------------------------------------------------------------

    /// Every file under the workspace root, honoring ignore files.
    pub fn scan(&self) -> SessionResult<Selection> {
        let root = self.root.as_deref().ok_or(SessionError::NoRoot)?;
        scan_workspace(root)
    }

    /// Populate the cache for `selection` using the configured initial
    /// refresh mode.
    pub fn initialize(&self, selection: Selection) -> SessionResult<RefreshTicket> {
        debug!(session = %self.id, files = selection.len(), mode = ?self.config.initial_refresh, "initializing");
        Ok(self.cache.initialize(selection, self.config.initial_refresh)?)
    }

    pub fn lookup(&self, file: &FileId) -> FileStatus {
        self.cache.lookup(file)
    }

    pub fn entry(&self, file: &FileId) -> Option<CacheEntry> {
        self.cache.entry(file)
    }

    pub fn is_eligible(&self, file: &FileId, operation: Operation) -> bool {
        is_eligible(self.lookup(file), operation)
    }

    pub fn permitted(&self, file: &FileId) -> OperationSet {
        permitted(self.lookup(file))
    }

    pub fn glyph(&self, file: &FileId) -> Glyph {
        glyph_for(self.lookup(file))
    }

    /// Queue a background refresh.
    pub fn refresh(&self, selection: Selection) -> RefreshTicket {
        self.cache.refresh(selection, RefreshMode::Background)
    }

    pub fn subscribe(&self) -> RefreshStream {
        self.cache.subscribe()
    }

    /// Deliver every refresh-completed notification to `listener` on its own
    /// task until the session closes.
    pub fn spawn_listener(&self, listener: Arc<dyn RefreshListener>) -> SessionResult<()> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| SessionError::NoRuntime)?;
        let handle = listener::spawn(&runtime, self.id, self.cache.subscribe(), listener);
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(handle);
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Commands and queries
    // -----------------------------------------------------------------------

    pub fn query_edit(&self, files: &[FileId], flags: QueryEditFlags) -> EditOutcome {
        self.query.query_edit(files, flags)
    }

    pub fn query_save(&self, files: &[FileId], flags: QuerySaveFlags) -> SaveOutcome {
        self.query.query_save(files, flags)
    }

    pub fn execute_operation(&self, command: CommandKind, selection: Selection) -> SessionResult<BatchReport> {
        Ok(self.executor.run(command, selection)?)
    }

    pub fn rename(&self, pairs: Vec<(FileId, FileId)>) -> SessionResult<BatchReport> {
        Ok(self.executor.rename(pairs, Vec::new())?)
    }

    // -----------------------------------------------------------------------
    // Host lifecycle events
    // -----------------------------------------------------------------------

    /// The host added files to the workspace. With `auto_add`, the files are
    /// resolved in the cache and opened for add.
    pub fn on_files_added(&self, selection: Selection) -> SessionResult<Option<BatchReport>> {
        if !self.config.auto_add {
            debug!(session = %self.id, files = selection.len(), "files added, auto_add off");
            return Ok(None);
        }
        // New files have no entry yet and Unknown permits nothing.
        self.cache.add_or_update(selection.clone())?;
        self.execute_operation(CommandKind::Add, selection).map(Some)
    }

    /// The host removed files. With `auto_delete`, they are opened for
    /// delete.
    pub fn on_files_removed(&self, selection: Selection) -> SessionResult<Option<BatchReport>> {
        if !self.config.auto_delete {
            debug!(session = %self.id, files = selection.len(), "files removed, auto_delete off");
            return Ok(None);
        }
        self.execute_operation(CommandKind::Delete, selection).map(Some)
    }

    /// The host renamed files. With `auto_rename`, the depot moves follow.
    pub fn on_files_renamed(&self, pairs: Vec<(FileId, FileId)>) -> SessionResult<Option<BatchReport>> {
        if !self.config.auto_rename {
            debug!(session = %self.id, pairs = pairs.len(), "files renamed, auto_rename off");
            return Ok(None);
        }
        self.rename(pairs).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use tokio::sync::mpsc;

    use vcg_backend::{BackendCall, DepotFixture, DepotRecord, InMemoryBackend, InMemoryFs};
    use vcg_cache::RefreshCompleted;
    use vcg_query::{AutoAllow, Verdict};
    use vcg_types::FileAction;

    fn id(name: &str) -> FileId {
        FileId::new(name)
    }

    fn depot() -> DepotFixture {
        DepotFixture::default()
            .with_file("head.txt", DepotRecord::at_head(3))
            .with_file("mine.txt", DepotRecord::at_head(1).with_action(FileAction::Edit))
    }

    fn open(config: SessionConfig) -> (WorkspaceSession, InMemoryBackend, InMemoryFs) {
        let fs = InMemoryFs::new();
        fs.insert("head.txt", true);
        fs.insert("mine.txt", false);
        fs.insert("new.txt", false);
        let backend = InMemoryBackend::from_fixture(depot()).with_workspace(Arc::new(fs.clone()));
        let session =
            WorkspaceSession::open(backend.clone(), Arc::new(fs.clone()), Arc::new(AutoAllow), config)
                .unwrap();
        (session, backend, fs)
    }

    fn three_files() -> Selection {
        Selection::from_files(["head.txt", "mine.txt", "new.txt"])
    }

    struct Forward(mpsc::UnboundedSender<RefreshCompleted>);

    #[async_trait]
    impl RefreshListener for Forward {
        async fn on_refresh(&self, event: &RefreshCompleted) -> SessionResult<()> {
            self.0
                .send(event.clone())
                .map_err(|e| SessionError::Listener(e.to_string()))
        }
    }

    // ---------------------------------------------------------------
    // Lifecycle
    // ---------------------------------------------------------------

    #[tokio::test(flavor = "multi_thread")]
    async fn three_file_scenario() {
        let (session, _, _) = open(SessionConfig::default());
        let event = session.initialize(three_files()).unwrap().wait().await.unwrap();
        assert_eq!(event.files.len(), 3);

        let check_out: Vec<bool> = three_files()
            .iter()
            .map(|f| session.is_eligible(f, Operation::CheckOut))
            .collect();
        let add: Vec<bool> = three_files()
            .iter()
            .map(|f| session.is_eligible(f, Operation::Add))
            .collect();
        assert_eq!(check_out, vec![true, false, false]);
        assert_eq!(add, vec![false, false, true]);
        session.close().await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn foreground_initialize_is_resolved_on_return() {
        let config = SessionConfig {
            initial_refresh: RefreshMode::Foreground,
            ..SessionConfig::default()
        };
        let (session, _, _) = open(config);
        let mut ticket = session.initialize(three_files()).unwrap();
        assert_eq!(session.lookup(&id("head.txt")), FileStatus::CheckedInHead);
        assert!(ticket.try_result().is_some());
        session.close().await;
    }

    #[tokio::test]
    async fn invalid_config_is_rejected_at_open() {
        let config = SessionConfig {
            notification_capacity: 0,
            ..SessionConfig::default()
        };
        let result = WorkspaceSession::open(
            InMemoryBackend::new(),
            Arc::new(InMemoryFs::new()),
            Arc::new(AutoAllow),
            config,
        );
        assert!(matches!(result, Err(SessionError::Config(_))));
    }

    #[test]
    fn open_needs_a_runtime() {
        let result = WorkspaceSession::open(
            InMemoryBackend::new(),
            Arc::new(InMemoryFs::new()),
            Arc::new(AutoAllow),
            SessionConfig::default(),
        );
        assert!(matches!(result, Err(SessionError::Cache(_))));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn listeners_see_refreshes_and_stop_on_close() {
        let (session, _, _) = open(SessionConfig::default());
        let (tx, mut rx) = mpsc::unbounded_channel();
        session.spawn_listener(Arc::new(Forward(tx))).unwrap();

        session.initialize(three_files()).unwrap().wait().await.unwrap();
        let event = rx.recv().await.unwrap();
        assert_eq!(event.files.len(), 3);

        session.close().await;
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn scan_requires_a_root() {
        let (session, _, _) = open(SessionConfig::default());
        assert!(matches!(session.scan(), Err(SessionError::NoRoot)));
        session.close().await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn local_session_scans_its_root() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "a").unwrap();
        let session = WorkspaceSession::open_local(
            dir.path(),
            InMemoryBackend::new(),
            Arc::new(AutoAllow),
            SessionConfig::default(),
        )
        .unwrap();
        assert_eq!(session.root(), Some(dir.path()));
        let selection = session.scan().unwrap();
        assert_eq!(selection.files(), &[id("a.txt")]);
        assert!(session.fs().exists(&id("a.txt")));
        session.close().await;
    }

    // ---------------------------------------------------------------
    // Queries and commands
    // ---------------------------------------------------------------

    #[tokio::test(flavor = "multi_thread")]
    async fn query_edit_uses_configured_policy() {
        let config = SessionConfig {
            auto_checkout_on_edit: true,
            ..SessionConfig::default()
        };
        let (session, backend, fs) = open(config);
        session.cache().add_or_update(three_files()).unwrap();
        let outcome = session.query_edit(&[id("head.txt")], QueryEditFlags::empty());
        assert_eq!(outcome.verdict, Verdict::Allow);
        assert!(backend
            .commands()
            .contains(&BackendCall::Command(CommandKind::Edit, id("head.txt"))));
        assert!(!fs.is_read_only(&id("head.txt")).unwrap());

        outcome.checkout.unwrap().take_refresh().unwrap().wait().await.unwrap();
        assert_eq!(session.lookup(&id("head.txt")), FileStatus::CheckedOut);
        session.close().await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn execute_operation_runs_through_the_executor() {
        let (session, backend, _) = open(SessionConfig::default());
        session.cache().add_or_update(three_files()).unwrap();
        let report = session
            .execute_operation(CommandKind::Add, three_files())
            .unwrap();
        assert_eq!(report.done().count(), 1);
        assert_eq!(report.skipped().count(), 2);
        assert_eq!(
            backend.commands(),
            vec![BackendCall::Command(CommandKind::Add, id("new.txt"))]
        );
        session.close().await;
    }

    // ---------------------------------------------------------------
    // Host events
    // ---------------------------------------------------------------

    #[tokio::test(flavor = "multi_thread")]
    async fn host_events_do_nothing_when_preferences_are_off() {
        let (session, backend, _) = open(SessionConfig::default());
        session.cache().add_or_update(three_files()).unwrap();
        backend.clear_calls();
        assert!(session.on_files_added(Selection::from_files(["new.txt"])).unwrap().is_none());
        assert!(session.on_files_removed(Selection::from_files(["head.txt"])).unwrap().is_none());
        assert!(session
            .on_files_renamed(vec![(id("head.txt"), id("moved.txt"))])
            .unwrap()
            .is_none());
        assert!(backend.calls().is_empty());
        session.close().await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn added_files_are_resolved_then_opened_for_add() {
        let config = SessionConfig {
            auto_add: true,
            ..SessionConfig::default()
        };
        let (session, backend, _) = open(config);
        let report = session
            .on_files_added(Selection::from_files(["new.txt"]))
            .unwrap()
            .unwrap();
        assert!(report.succeeded());
        assert_eq!(report.done().count(), 1);
        assert_eq!(
            backend.commands(),
            vec![BackendCall::Command(CommandKind::Add, id("new.txt"))]
        );
        session.close().await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn removed_and_renamed_files_follow_preferences() {
        let config = SessionConfig {
            auto_delete: true,
            auto_rename: true,
            ..SessionConfig::default()
        };
        let (session, backend, _) = open(config);
        session.cache().add_or_update(three_files()).unwrap();
        backend.clear_calls();

        let removed = session
            .on_files_removed(Selection::from_files(["head.txt"]))
            .unwrap()
            .unwrap();
        assert_eq!(removed.done().count(), 1);

        let renamed = session
            .on_files_renamed(vec![(id("mine.txt"), id("renamed.txt"))])
            .unwrap()
            .unwrap();
        assert_eq!(renamed.attempted(), 1);
        assert!(backend.commands().contains(&BackendCall::Move(id("mine.txt"), id("renamed.txt"))));
        session.close().await;
    }
}
