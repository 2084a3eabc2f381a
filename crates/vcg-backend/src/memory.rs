//! In-memory implementation of [`VcsBackend`].
//!
//! [`InMemoryBackend`] is a small functional depot: commands change the
//! per-file [`DepotRecord`]s the way a real server would, and `status`
//! reports them back. Every call is logged, connect/disconnect brackets are
//! counted, and failures can be injected per file or at connect time.
//!
//! The handle is cheaply cloneable; clones share state, so a test can keep
//! one handle for inspection while the other lives inside a
//! [`BackendLink`](crate::BackendLink).

use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tracing::{debug, warn};
use vcg_types::{CommandKind, FileAction, FileId, StatusReply};

use crate::error::{BackendError, BackendResult};
use crate::fixture::{DepotFixture, DepotRecord};
use crate::traits::VcsBackend;
use crate::workspace::WorkspaceFs;

/// One logged backend interaction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BackendCall {
    Connect,
    Disconnect,
    Status(FileId),
    Command(CommandKind, FileId),
    Move(FileId, FileId),
}

/// Injected connect failure.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConnectFailure {
    Config(String),
    Init(String),
}

#[derive(Default)]
struct DepotState {
    files: BTreeMap<FileId, DepotRecord>,
    connected: bool,
    connects: usize,
    disconnects: usize,
    calls: Vec<BackendCall>,
    connect_failure: Option<ConnectFailure>,
    failing_commands: HashSet<FileId>,
    failing_status: HashSet<FileId>,
    status_delay: Option<Duration>,
    status_hold: Option<Arc<HoldGate>>,
    workspace: Option<Arc<dyn WorkspaceFs>>,
}

#[derive(Default)]
struct HoldGate {
    released: Mutex<bool>,
    opened: Condvar,
}

impl HoldGate {
    fn wait(&self) {
        let mut released = self.released.lock().unwrap_or_else(PoisonError::into_inner);
        while !*released {
            released = self.opened.wait(released).unwrap_or_else(PoisonError::into_inner);
        }
    }

    fn open(&self) {
        *self.released.lock().unwrap_or_else(PoisonError::into_inner) = true;
        self.opened.notify_all();
    }
}

/// Holds status queries of an [`InMemoryBackend`] until released or dropped.
///
/// A held query is logged before it blocks, so a caller can see from
/// [`InMemoryBackend::status_queries`] that a batch is in flight.
pub struct StatusHold {
    gate: Arc<HoldGate>,
    backend: InMemoryBackend,
}

impl StatusHold {
    /// Let held and later status queries proceed.
    pub fn release(self) {}
}

impl Drop for StatusHold {
    fn drop(&mut self) {
        self.backend.state().status_hold = None;
        self.gate.open();
    }
}

/// Fixture-backed, in-process depot.
#[derive(Clone, Default)]
pub struct InMemoryBackend {
    state: Arc<Mutex<DepotState>>,
}

impl InMemoryBackend {
    /// Create an empty depot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a depot seeded from a fixture.
    pub fn from_fixture(fixture: DepotFixture) -> Self {
        let backend = Self::new();
        backend.state().files = fixture.files;
        backend
    }

    /// Snapshot the depot as a fixture.
    pub fn to_fixture(&self) -> DepotFixture {
        DepotFixture {
            files: self.state().files.clone(),
        }
    }

    /// Mirror workspace effects into a file system: files become writable
    /// when opened, read-only again when reverted or synced, and moves
    /// rename the file on disk.
    pub fn with_workspace(self, fs: Arc<dyn WorkspaceFs>) -> Self {
        self.state().workspace = Some(fs);
        self
    }

    /// Insert or replace one file's record.
    pub fn insert(&self, file: impl Into<FileId>, record: DepotRecord) {
        self.state().files.insert(file.into(), record);
    }

    /// Current record of a file, if the depot knows it.
    pub fn record(&self, file: &FileId) -> Option<DepotRecord> {
        self.state().files.get(file).cloned()
    }

    /// Mutate a file's record in place (simulates changes made elsewhere).
    pub fn update(&self, file: &FileId, f: impl FnOnce(&mut DepotRecord)) {
        if let Some(record) = self.state().files.get_mut(file) {
            f(record);
        }
    }

    /// Make subsequent connects fail (or succeed again with `None`).
    pub fn set_connect_failure(&self, failure: Option<ConnectFailure>) {
        self.state().connect_failure = failure;
    }

    /// Make every command on `file` fail with a rejection.
    pub fn fail_commands_on(&self, file: impl Into<FileId>) {
        self.state().failing_commands.insert(file.into());
    }

    /// Make status queries of `file` return an error reply.
    pub fn fail_status_on(&self, file: impl Into<FileId>) {
        self.state().failing_status.insert(file.into());
    }

    /// Sleep this long inside every status query.
    pub fn set_status_delay(&self, delay: Option<Duration>) {
        self.state().status_delay = delay;
    }

    /// Block every status query until the returned hold is released.
    pub fn hold_status(&self) -> StatusHold {
        let gate = Arc::new(HoldGate::default());
        self.state().status_hold = Some(Arc::clone(&gate));
        StatusHold {
            gate,
            backend: self.clone(),
        }
    }

    /// Whether a bracket is currently open.
    pub fn is_connected(&self) -> bool {
        self.state().connected
    }

    /// Number of successful connects.
    pub fn connect_count(&self) -> usize {
        self.state().connects
    }

    /// Number of disconnects.
    pub fn disconnect_count(&self) -> usize {
        self.state().disconnects
    }

    /// Every call in the order it was made.
    pub fn calls(&self) -> Vec<BackendCall> {
        self.state().calls.clone()
    }

    /// Number of status queries issued for `file`.
    pub fn status_queries(&self, file: &FileId) -> usize {
        self.state()
            .calls
            .iter()
            .filter(|call| matches!(call, BackendCall::Status(f) if f == file))
            .count()
    }

    /// Commands issued, without status queries or brackets.
    pub fn commands(&self) -> Vec<BackendCall> {
        self.state()
            .calls
            .iter()
            .filter(|call| matches!(call, BackendCall::Command(..) | BackendCall::Move(..)))
            .cloned()
            .collect()
    }

    /// Forget the call log and counters.
    pub fn clear_calls(&self) {
        let mut state = self.state();
        state.calls.clear();
        state.connects = 0;
        state.disconnects = 0;
    }

    fn state(&self) -> MutexGuard<'_, DepotState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Common prologue of every per-file command.
    fn begin(&self, command: CommandKind, file: &FileId) -> BackendResult<MutexGuard<'_, DepotState>> {
        let mut state = self.state();
        if !state.connected {
            return Err(BackendError::NotConnected);
        }
        state.calls.push(BackendCall::Command(command, file.clone()));
        if state.failing_commands.contains(file) {
            warn!(file = %file, command = %command, "injected command failure");
            return Err(BackendError::rejected(file, "injected failure"));
        }
        Ok(state)
    }
}

impl DepotState {
    fn existing(&mut self, file: &FileId) -> BackendResult<&mut DepotRecord> {
        self.files
            .get_mut(file)
            .ok_or_else(|| BackendError::rejected(file, "no such file(s)"))
    }

    fn set_read_only(&self, file: &FileId, read_only: bool) {
        if let Some(fs) = &self.workspace {
            if fs.exists(file) {
                if let Err(e) = fs.set_read_only(file, read_only) {
                    warn!(file = %file, error = %e, "could not update read-only bit");
                }
            }
        }
    }

    fn move_on_disk(&self, from: &FileId, to: &FileId) {
        if let Some(fs) = &self.workspace {
            if fs.exists(from) {
                if let Err(e) = fs.rename(from, to) {
                    warn!(from = %from, to = %to, error = %e, "could not move workspace file");
                }
            }
        }
    }

    /// Discard my action on one file without touching a move partner.
    fn revert_one(&mut self, file: &FileId) -> BackendResult<String> {
        let record = self.existing(file)?;
        let Some(action) = record.action else {
            return Err(BackendError::rejected(file, "file(s) not opened on this client"));
        };
        if record.head_rev == 0 {
            self.files.remove(file);
            return Ok(format!("{file} - was {}, abandoned", action_name(action)));
        }
        record.action = None;
        record.our_lock = false;
        record.differs = false;
        record.unresolved = false;
        self.set_read_only(file, true);
        Ok(format!("{file} - was {}, reverted", action_name(action)))
    }

    fn revert(&mut self, file: &FileId) -> BackendResult<String> {
        let record = self.existing(file)?;
        match (record.action, record.moved_from.clone()) {
            (Some(FileAction::MoveAdd), Some(source)) => {
                let message = self.revert_one(file)?;
                if self.files.get(&source).is_some_and(|r| r.action.is_some()) {
                    self.revert_one(&source)?;
                }
                Ok(message)
            }
            (Some(FileAction::MoveDelete), _) => {
                let partner = self
                    .files
                    .iter()
                    .find(|(_, r)| r.moved_from.as_ref() == Some(file))
                    .map(|(f, _)| f.clone());
                if let Some(target) = partner {
                    self.revert_one(&target)?;
                }
                self.revert_one(file)
            }
            _ => self.revert_one(file),
        }
    }
}

fn action_name(action: FileAction) -> &'static str {
    match action {
        FileAction::Add => "add",
        FileAction::Edit => "edit",
        FileAction::Delete => "delete",
        FileAction::Branch => "branch",
        FileAction::Integrate => "integrate",
        FileAction::MoveAdd => "move/add",
        FileAction::MoveDelete => "move/delete",
    }
}

impl VcsBackend for InMemoryBackend {
    fn connect(&mut self) -> BackendResult<()> {
        let mut state = self.state();
        if let Some(failure) = state.connect_failure.clone() {
            return Err(match failure {
                ConnectFailure::Config(m) => BackendError::Config(m),
                ConnectFailure::Init(m) => BackendError::Init(m),
            });
        }
        if state.connected {
            return Err(BackendError::Init("connection already open".into()));
        }
        state.connected = true;
        state.connects += 1;
        state.calls.push(BackendCall::Connect);
        Ok(())
    }

    fn disconnect(&mut self) {
        let mut state = self.state();
        if state.connected {
            state.connected = false;
            state.disconnects += 1;
            state.calls.push(BackendCall::Disconnect);
        }
    }

    fn status(&mut self, file: &FileId) -> StatusReply {
        let (delay, hold) = {
            let mut state = self.state();
            if !state.connected {
                return StatusReply::Error("backend is not connected".into());
            }
            state.calls.push(BackendCall::Status(file.clone()));
            (state.status_delay, state.status_hold.clone())
        };
        if let Some(gate) = hold {
            gate.wait();
        }
        if let Some(delay) = delay {
            std::thread::sleep(delay);
        }
        let state = self.state();
        if state.failing_status.contains(file) {
            return StatusReply::Error(format!("{file}: injected status failure"));
        }
        match state.files.get(file) {
            Some(record) => StatusReply::Found(record.to_raw()),
            None => StatusReply::NotInDepot,
        }
    }

    fn edit(&mut self, file: &FileId) -> BackendResult<String> {
        let mut state = self.begin(CommandKind::Edit, file)?;
        let record = state.existing(file)?;
        if !record.is_live_at_head() && record.action.is_none() {
            return Err(BackendError::rejected(file, "file(s) not on client"));
        }
        let message = match record.action {
            None => {
                record.action = Some(FileAction::Edit);
                format!("{file}#{} - opened for edit", record.have_rev.unwrap_or(0))
            }
            Some(FileAction::Edit) => format!("{file} - currently opened for edit"),
            Some(other) => {
                return Err(BackendError::rejected(
                    file,
                    format!("can't edit (already opened for {})", action_name(other)),
                ))
            }
        };
        state.set_read_only(file, false);
        debug!(file = %file, "opened for edit");
        Ok(message)
    }

    fn add(&mut self, file: &FileId) -> BackendResult<String> {
        let mut state = self.begin(CommandKind::Add, file)?;
        match state.files.get_mut(file) {
            None => {
                state.files.insert(file.clone(), DepotRecord::new_add());
            }
            Some(record) if !record.is_live_at_head() && record.action.is_none() => {
                record.action = Some(FileAction::Add);
            }
            Some(_) => {
                return Err(BackendError::rejected(file, "can't add existing file"));
            }
        }
        state.set_read_only(file, false);
        Ok(format!("{file} - opened for add"))
    }

    fn delete(&mut self, file: &FileId) -> BackendResult<String> {
        let mut state = self.begin(CommandKind::Delete, file)?;
        let record = state.existing(file)?;
        if !record.is_live_at_head() || record.action.is_some() {
            return Err(BackendError::rejected(file, "can't delete (not checked in)"));
        }
        record.action = Some(FileAction::Delete);
        Ok(format!("{file} - opened for delete"))
    }

    fn revert(&mut self, file: &FileId) -> BackendResult<String> {
        let mut state = self.begin(CommandKind::Revert, file)?;
        state.revert(file)
    }

    fn revert_if_unchanged(&mut self, file: &FileId) -> BackendResult<String> {
        let mut state = self.begin(CommandKind::RevertIfUnchanged, file)?;
        let record = state.existing(file)?;
        if record.action == Some(FileAction::Edit) && !record.differs {
            state.revert_one(file)
        } else {
            Ok(format!("{file} - not reverted"))
        }
    }

    fn lock(&mut self, file: &FileId) -> BackendResult<String> {
        let mut state = self.begin(CommandKind::Lock, file)?;
        let record = state.existing(file)?;
        if record.action.is_none() {
            return Err(BackendError::rejected(file, "file(s) not opened on this client"));
        }
        if record.other_lock {
            return Err(BackendError::rejected(file, "already locked by another client"));
        }
        record.our_lock = true;
        Ok(format!("{file} - locking"))
    }

    fn sync(&mut self, file: &FileId) -> BackendResult<String> {
        let mut state = self.begin(CommandKind::Sync, file)?;
        let record = state.existing(file)?;
        if record.head_rev == 0 {
            return Err(BackendError::rejected(file, "no such file(s)"));
        }
        if record.have_rev == Some(record.head_rev) {
            return Ok(format!("{file} - file(s) up-to-date"));
        }
        let head = record.head_rev;
        let deleted = record.head_action.is_some_and(FileAction::is_delete);
        if record.action.is_some() {
            // Syncing an opened file schedules a resolve.
            record.unresolved = true;
        }
        record.have_rev = if deleted { None } else { Some(head) };
        let opened = record.action.is_some();
        if !opened && !deleted {
            state.set_read_only(file, true);
        }
        Ok(if deleted {
            format!("{file}#{head} - deleted as {file}")
        } else {
            format!("{file}#{head} - updating {file}")
        })
    }

    fn move_file(&mut self, from: &FileId, to: &FileId) -> BackendResult<String> {
        let mut state = self.state();
        if !state.connected {
            return Err(BackendError::NotConnected);
        }
        state.calls.push(BackendCall::Move(from.clone(), to.clone()));
        if state.failing_commands.contains(from) || state.failing_commands.contains(to) {
            return Err(BackendError::rejected(from, "injected failure"));
        }
        if state.files.get(to).is_some_and(|r| r.is_live_at_head() || r.action.is_some()) {
            return Err(BackendError::rejected(to, "can't move to an existing file"));
        }
        let source = state.existing(from)?;
        match source.action {
            Some(FileAction::Add) => {
                let record = source.clone();
                state.files.remove(from);
                state.files.insert(to.clone(), record);
            }
            None | Some(FileAction::Edit) => {
                if !source.is_live_at_head() {
                    return Err(BackendError::rejected(from, "file(s) not on client"));
                }
                source.action = Some(FileAction::MoveDelete);
                let differs = source.differs;
                let target = DepotRecord {
                    action: Some(FileAction::MoveAdd),
                    differs,
                    moved_from: Some(from.clone()),
                    ..DepotRecord::default()
                };
                state.files.insert(to.clone(), target);
            }
            Some(other) => {
                return Err(BackendError::rejected(
                    from,
                    format!("can't move (already opened for {})", action_name(other)),
                ))
            }
        }
        state.move_on_disk(from, to);
        debug!(from = %from, to = %to, "moved");
        Ok(format!("{to} - moved from {from}"))
    }

    fn history(&mut self, file: &FileId) -> BackendResult<String> {
        let mut state = self.begin(CommandKind::History, file)?;
        let record = state.existing(file)?;
        Ok(format!("{file} - {} revision(s)", record.head_rev))
    }

    fn diff(&mut self, file: &FileId) -> BackendResult<String> {
        let mut state = self.begin(CommandKind::Diff, file)?;
        let record = state.existing(file)?;
        Ok(if record.differs {
            format!("==== {file}#{} - content differs ====", record.have_rev.unwrap_or(0))
        } else {
            format!("==== {file}#{} - identical ====", record.have_rev.unwrap_or(0))
        })
    }

    fn time_lapse(&mut self, file: &FileId) -> BackendResult<String> {
        let mut state = self.begin(CommandKind::TimeLapse, file)?;
        let record = state.existing(file)?;
        Ok(format!("{file} - time-lapse over {} revision(s)", record.head_rev))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workspace::InMemoryFs;
    use vcg_types::RawStatus;

    fn connected(fixture: DepotFixture) -> InMemoryBackend {
        let mut backend = InMemoryBackend::from_fixture(fixture);
        backend.connect().unwrap();
        backend
    }

    fn raw(backend: &mut InMemoryBackend, file: &str) -> RawStatus {
        match backend.status(&FileId::new(file)) {
            StatusReply::Found(raw) => raw,
            other => panic!("unexpected reply {other:?}"),
        }
    }

    #[test]
    fn commands_require_connect() {
        let mut backend = InMemoryBackend::new();
        let err = backend.edit(&FileId::new("a")).unwrap_err();
        assert!(matches!(err, BackendError::NotConnected));
        assert!(matches!(backend.status(&FileId::new("a")), StatusReply::Error(_)));
    }

    #[test]
    fn double_connect_is_rejected() {
        let mut backend = InMemoryBackend::new();
        backend.connect().unwrap();
        assert!(backend.connect().is_err());
        backend.disconnect();
        backend.disconnect();
        assert_eq!(backend.disconnect_count(), 1);
    }

    #[test]
    fn status_reports_records_and_unknown_files() {
        let mut backend =
            connected(DepotFixture::default().with_file("a.txt", DepotRecord::at_head(2)));
        assert_eq!(raw(&mut backend, "a.txt").head_rev, Some(2));
        assert_eq!(backend.status(&FileId::new("b.txt")), StatusReply::NotInDepot);
        assert_eq!(backend.status_queries(&FileId::new("a.txt")), 1);
    }

    #[test]
    fn held_status_waits_for_release() {
        let backend =
            connected(DepotFixture::default().with_file("a.txt", DepotRecord::at_head(1)));
        let hold = backend.hold_status();
        let query = {
            let mut backend = backend.clone();
            std::thread::spawn(move || backend.status(&FileId::new("a.txt")))
        };
        while backend.status_queries(&FileId::new("a.txt")) == 0 {
            std::thread::yield_now();
        }
        assert!(!query.is_finished());
        hold.release();
        assert!(matches!(query.join().unwrap(), StatusReply::Found(_)));
    }

    #[test]
    fn edit_then_revert() {
        let mut backend =
            connected(DepotFixture::default().with_file("a.txt", DepotRecord::at_head(2)));
        let a = FileId::new("a.txt");
        backend.edit(&a).unwrap();
        assert_eq!(raw(&mut backend, "a.txt").action, Some(FileAction::Edit));
        backend.lock(&a).unwrap();
        assert!(raw(&mut backend, "a.txt").our_lock);
        backend.revert(&a).unwrap();
        let after = raw(&mut backend, "a.txt");
        assert_eq!(after.action, None);
        assert!(!after.our_lock);
    }

    #[test]
    fn edit_of_unknown_file_is_rejected() {
        let mut backend = connected(DepotFixture::default());
        let err = backend.edit(&FileId::new("nope")).unwrap_err();
        assert!(matches!(err, BackendError::Rejected { .. }));
    }

    #[test]
    fn add_and_abandon() {
        let mut backend = connected(DepotFixture::default());
        let n = FileId::new("new.txt");
        backend.add(&n).unwrap();
        assert_eq!(raw(&mut backend, "new.txt").action, Some(FileAction::Add));
        assert!(backend.add(&n).is_err());
        backend.revert(&n).unwrap();
        assert_eq!(backend.status(&n), StatusReply::NotInDepot);
    }

    #[test]
    fn revert_if_unchanged_keeps_modified_files_open() {
        let mut backend = connected(
            DepotFixture::default()
                .with_file("same", DepotRecord::at_head(1).with_action(FileAction::Edit))
                .with_file("changed", DepotRecord {
                    differs: true,
                    ..DepotRecord::at_head(1).with_action(FileAction::Edit)
                }),
        );
        backend.revert_if_unchanged(&FileId::new("same")).unwrap();
        backend.revert_if_unchanged(&FileId::new("changed")).unwrap();
        assert_eq!(raw(&mut backend, "same").action, None);
        assert_eq!(raw(&mut backend, "changed").action, Some(FileAction::Edit));
    }

    #[test]
    fn sync_brings_have_to_head() {
        let mut backend = connected(
            DepotFixture::default().with_file("a", DepotRecord::at_head(5).with_have(3)),
        );
        backend.sync(&FileId::new("a")).unwrap();
        assert_eq!(raw(&mut backend, "a").have_rev, Some(5));
    }

    #[test]
    fn move_opens_both_sides_and_revert_restores() {
        let mut backend =
            connected(DepotFixture::default().with_file("old", DepotRecord::at_head(1)));
        let (old, new) = (FileId::new("old"), FileId::new("new"));
        backend.move_file(&old, &new).unwrap();
        assert_eq!(raw(&mut backend, "old").action, Some(FileAction::MoveDelete));
        assert_eq!(raw(&mut backend, "new").action, Some(FileAction::MoveAdd));

        backend.revert(&new).unwrap();
        assert_eq!(raw(&mut backend, "old").action, None);
        assert_eq!(backend.status(&new), StatusReply::NotInDepot);
    }

    #[test]
    fn move_onto_existing_file_is_rejected() {
        let mut backend = connected(
            DepotFixture::default()
                .with_file("a", DepotRecord::at_head(1))
                .with_file("b", DepotRecord::at_head(1)),
        );
        assert!(backend.move_file(&FileId::new("a"), &FileId::new("b")).is_err());
        assert_eq!(raw(&mut backend, "a").action, None);
    }

    #[test]
    fn injected_failures() {
        let mut backend = connected(DepotFixture::default().with_file("a", DepotRecord::at_head(1)));
        backend.fail_commands_on("a");
        backend.fail_status_on("a");
        assert!(backend.edit(&FileId::new("a")).is_err());
        assert!(matches!(backend.status(&FileId::new("a")), StatusReply::Error(_)));
        assert_eq!(
            backend.commands(),
            vec![BackendCall::Command(CommandKind::Edit, FileId::new("a"))]
        );
    }

    #[test]
    fn workspace_read_only_bits_follow_open_state() {
        let fs = InMemoryFs::new();
        fs.insert("a", true);
        let mut backend = InMemoryBackend::from_fixture(
            DepotFixture::default().with_file("a", DepotRecord::at_head(1)),
        )
        .with_workspace(Arc::new(fs.clone()));
        backend.connect().unwrap();
        let a = FileId::new("a");
        backend.edit(&a).unwrap();
        assert!(!fs.is_read_only(&a).unwrap());
        backend.revert(&a).unwrap();
        assert!(fs.is_read_only(&a).unwrap());
    }

    #[test]
    fn fixture_round_trips_through_backend() {
        let fixture = DepotFixture::default().with_file("a", DepotRecord::at_head(1));
        let mut backend = connected(fixture.clone());
        backend.edit(&FileId::new("a")).unwrap();
        let after = backend.to_fixture();
        assert_eq!(after.files[&FileId::new("a")].action, Some(FileAction::Edit));
        assert_ne!(after, fixture);
    }
}
