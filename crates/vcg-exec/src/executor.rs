use std::sync::Arc;

use tracing::{debug, info, warn};

use vcg_backend::{BackendLink, BackendResult, VcsBackend, WorkspaceFs};
use vcg_cache::{RefreshMode, StateCache};
use vcg_policy::{is_eligible, is_eligible_for_rename};
use vcg_types::{CommandKind, FileId, FileStatus, NodeId, Operation, Selection};

use crate::error::ExecResult;
use crate::report::{BatchReport, FileOutcome, OutcomeKind};

// ---------------------------------------------------------------------------
// CommandExecutor
// ---------------------------------------------------------------------------

/// Runs backend commands over selections of files.
///
/// Each batch holds the backend for exactly one connect..disconnect bracket.
/// Files are handled independently: an ineligible file is skipped, a
/// rejected command is recorded, and the batch continues either way.
pub struct CommandExecutor {
    link: BackendLink,
    cache: Arc<StateCache>,
    fs: Arc<dyn WorkspaceFs>,
}

impl CommandExecutor {
    pub fn new(link: BackendLink, cache: Arc<StateCache>, fs: Arc<dyn WorkspaceFs>) -> Self {
        Self { link, cache, fs }
    }

    /// Run `action` for every file of `selection` whose cached status
    /// satisfies `predicate`.
    ///
    /// An empty selection succeeds without connecting. A connect failure
    /// fails the whole batch before any file is attempted. The connection is
    /// closed on every exit path, including a panicking action; afterwards a
    /// background refresh of the selection is queued and its ticket is
    /// returned in the report.
    pub fn execute<P, A>(
        &self,
        selection: Selection,
        operation: Operation,
        predicate: P,
        action: A,
    ) -> ExecResult<BatchReport>
    where
        P: Fn(FileStatus) -> bool,
        A: FnMut(&mut dyn VcsBackend, &FileId) -> BackendResult<String>,
    {
        if selection.is_empty() {
            return Ok(BatchReport::empty(operation));
        }
        let outcomes = self.bracket(operation, selection.files(), |f| f, predicate, action)?;
        Ok(self.finish(operation, outcomes, selection))
    }

    /// Run a backend command with the eligibility table as predicate.
    pub fn run(&self, command: CommandKind, selection: Selection) -> ExecResult<BatchReport> {
        let operation = command.operation();
        self.execute(
            selection,
            operation,
            |status| is_eligible(status, operation),
            |backend, file| backend.run(command, file),
        )
    }

    /// Open the time-lapse report for each eligible file.
    pub fn time_lapse(&self, selection: Selection) -> ExecResult<BatchReport> {
        self.run(CommandKind::TimeLapse, selection)
    }

    /// Rename files.
    ///
    /// Eligibility is evaluated on the old name. If the host already renamed
    /// the file on disk (new exists, old does not), the old name is restored
    /// first so the backend move sees the file where it expects it; a failed
    /// restore is logged and the move is attempted anyway. The queued refresh
    /// covers both names.
    pub fn rename(&self, pairs: Vec<(FileId, FileId)>, nodes: Vec<NodeId>) -> ExecResult<BatchReport> {
        if pairs.is_empty() {
            return Ok(BatchReport::empty(Operation::Rename));
        }
        let fs = Arc::clone(&self.fs);
        let outcomes = self.bracket(
            Operation::Rename,
            &pairs,
            |(old, _)| old,
            is_eligible_for_rename,
            |backend, (old, new)| {
                if fs.exists(new) && !fs.exists(old) {
                    match fs.rename(new, old) {
                        Ok(()) => debug!(old = %old, new = %new, "restored original name before move"),
                        Err(e) => warn!(old = %old, new = %new, error = %e, "could not restore original name"),
                    }
                }
                backend.move_file(old, new)
            },
        )?;

        let mut refresh = Selection::new().with_nodes(nodes);
        for (old, new) in pairs {
            refresh.push_file(old);
            refresh.push_file(new);
        }
        Ok(self.finish(Operation::Rename, outcomes, refresh))
    }

    /// One connect..disconnect bracket over `items`.
    fn bracket<T, K, P, A>(
        &self,
        operation: Operation,
        items: &[T],
        subject: K,
        predicate: P,
        mut action: A,
    ) -> ExecResult<Vec<FileOutcome>>
    where
        K: Fn(&T) -> &FileId,
        P: Fn(FileStatus) -> bool,
        A: FnMut(&mut dyn VcsBackend, &T) -> BackendResult<String>,
    {
        let mut conn = self.link.connect().map_err(|e| {
            warn!(operation = %operation, error = %e, "batch could not connect");
            e
        })?;

        let mut outcomes = Vec::with_capacity(items.len());
        for item in items {
            let file = subject(item);
            let status = self.cache.lookup(file);
            let kind = if !predicate(status) {
                debug!(file = %file, status = %status, operation = %operation, "skipped: not eligible");
                OutcomeKind::Skipped { status }
            } else {
                match action(&mut *conn, item) {
                    Ok(message) => {
                        debug!(file = %file, operation = %operation, "done");
                        OutcomeKind::Done { message }
                    }
                    Err(e) => {
                        warn!(file = %file, operation = %operation, error = %e, "command failed");
                        OutcomeKind::Failed { error: e.to_string() }
                    }
                }
            };
            outcomes.push(FileOutcome {
                file: file.clone(),
                kind,
            });
        }
        drop(conn);
        Ok(outcomes)
    }

    /// Queue the post-batch refresh once the connection is closed.
    fn finish(&self, operation: Operation, outcomes: Vec<FileOutcome>, refresh: Selection) -> BatchReport {
        let ticket = self.cache.refresh(refresh, RefreshMode::Background);
        let report = BatchReport {
            operation,
            outcomes,
            refresh: Some(ticket),
        };
        info!(
            operation = %operation,
            done = report.done().count(),
            skipped = report.skipped().count(),
            failed = report.failed().count(),
            "batch finished"
        );
        report
    }
}
