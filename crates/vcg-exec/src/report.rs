//! Per-file outcomes of a batch.

use serde::{Deserialize, Serialize};
use vcg_cache::RefreshTicket;
use vcg_types::{FileId, FileStatus, Operation};

/// What happened to one file.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum OutcomeKind {
    /// The command ran; carries the backend's message.
    Done { message: String },
    /// The cached status was not eligible; nothing was sent to the backend.
    Skipped { status: FileStatus },
    /// The backend rejected the command.
    Failed { error: String },
}

/// One file's result within a batch.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileOutcome {
    pub file: FileId,
    #[serde(flatten)]
    pub kind: OutcomeKind,
}

impl FileOutcome {
    pub fn is_done(&self) -> bool {
        matches!(self.kind, OutcomeKind::Done { .. })
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self.kind, OutcomeKind::Skipped { .. })
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.kind, OutcomeKind::Failed { .. })
    }
}

/// Result of one executor batch.
#[derive(Debug)]
pub struct BatchReport {
    pub operation: Operation,
    pub outcomes: Vec<FileOutcome>,
    /// Ticket of the refresh queued after the connection closed; `None` for
    /// an empty selection.
    pub refresh: Option<RefreshTicket>,
}

impl BatchReport {
    pub(crate) fn empty(operation: Operation) -> Self {
        Self {
            operation,
            outcomes: Vec::new(),
            refresh: None,
        }
    }

    /// True when every attempted file succeeded. Skipped files do not count
    /// against success.
    pub fn succeeded(&self) -> bool {
        !self.outcomes.iter().any(FileOutcome::is_failed)
    }

    /// Number of files sent to the backend.
    pub fn attempted(&self) -> usize {
        self.outcomes.iter().filter(|o| !o.is_skipped()).count()
    }

    pub fn done(&self) -> impl Iterator<Item = &FileOutcome> {
        self.outcomes.iter().filter(|o| o.is_done())
    }

    pub fn skipped(&self) -> impl Iterator<Item = &FileOutcome> {
        self.outcomes.iter().filter(|o| o.is_skipped())
    }

    pub fn failed(&self) -> impl Iterator<Item = &FileOutcome> {
        self.outcomes.iter().filter(|o| o.is_failed())
    }

    /// Outcome recorded for `file`, if it was part of the batch.
    pub fn outcome(&self, file: &FileId) -> Option<&FileOutcome> {
        self.outcomes.iter().find(|o| &o.file == file)
    }

    /// Take the refresh ticket, leaving `None`.
    pub fn take_refresh(&mut self) -> Option<RefreshTicket> {
        self.refresh.take()
    }
}
