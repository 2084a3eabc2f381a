//! The [`VcsBackend`] trait defining the backend command interface.

use vcg_types::{CommandKind, FileId, StatusReply};

use crate::error::BackendResult;

/// A stateful connection to a version-control backend.
///
/// The interface is synchronous and not safe for concurrent use: callers
/// reach it only through a [`Connection`](crate::Connection) guard, which
/// holds exclusive access between `connect` and `disconnect`. Every command
/// requires a prior successful [`connect`](VcsBackend::connect) and returns a
/// human-readable message on success.
pub trait VcsBackend: Send {
    /// Open the connection. May fail with a configuration or initialization
    /// error; a failed connect leaves nothing to disconnect.
    fn connect(&mut self) -> BackendResult<()>;

    /// Close the connection. Infallible from the caller's point of view.
    fn disconnect(&mut self);

    /// Query the status of one file.
    fn status(&mut self, file: &FileId) -> StatusReply;

    /// Open a file for edit (checkout).
    fn edit(&mut self, file: &FileId) -> BackendResult<String>;

    /// Open a new file for add.
    fn add(&mut self, file: &FileId) -> BackendResult<String>;

    /// Open a file for delete.
    fn delete(&mut self, file: &FileId) -> BackendResult<String>;

    /// Discard my open action on a file.
    fn revert(&mut self, file: &FileId) -> BackendResult<String>;

    /// Revert only if the local content is unchanged.
    fn revert_if_unchanged(&mut self, file: &FileId) -> BackendResult<String>;

    /// Lock a file I have open.
    fn lock(&mut self, file: &FileId) -> BackendResult<String>;

    /// Bring the workspace copy to the head revision.
    fn sync(&mut self, file: &FileId) -> BackendResult<String>;

    /// Rename (move) a file.
    fn move_file(&mut self, from: &FileId, to: &FileId) -> BackendResult<String>;

    /// Open the revision history report.
    fn history(&mut self, file: &FileId) -> BackendResult<String>;

    /// Open a diff against the depot revision.
    fn diff(&mut self, file: &FileId) -> BackendResult<String>;

    /// Open the time-lapse (annotated history) report.
    fn time_lapse(&mut self, file: &FileId) -> BackendResult<String>;

    /// Dispatch a per-file command by kind.
    fn run(&mut self, command: CommandKind, file: &FileId) -> BackendResult<String> {
        match command {
            CommandKind::Edit => self.edit(file),
            CommandKind::Add => self.add(file),
            CommandKind::Delete => self.delete(file),
            CommandKind::Revert => self.revert(file),
            CommandKind::RevertIfUnchanged => self.revert_if_unchanged(file),
            CommandKind::Lock => self.lock(file),
            CommandKind::Sync => self.sync(file),
            CommandKind::History => self.history(file),
            CommandKind::Diff => self.diff(file),
            CommandKind::TimeLapse => self.time_lapse(file),
        }
    }
}
