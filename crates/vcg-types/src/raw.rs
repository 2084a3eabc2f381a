//! Raw per-file answers from the version-control backend.
//!
//! The backend reports a set of flags for each file (head revision, what I
//! have open, what other users have open, locks). The classifier in
//! `vcg-policy` derives exactly one [`FileStatus`](crate::FileStatus) from
//! them.

use serde::{Deserialize, Serialize};

/// An action a file is open for, or the action of its head revision.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FileAction {
    Add,
    Edit,
    Delete,
    Branch,
    Integrate,
    MoveAdd,
    MoveDelete,
}

impl FileAction {
    /// Whether this action removes the file at its path.
    pub fn is_delete(self) -> bool {
        matches!(self, Self::Delete | Self::MoveDelete)
    }
}

/// Flags reported by the backend for a file it knows about.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawStatus {
    /// Action of the head revision.
    pub head_action: Option<FileAction>,
    /// Head revision number.
    pub head_rev: Option<u32>,
    /// Revision present in the workspace.
    pub have_rev: Option<u32>,
    /// What I have the file open for.
    pub action: Option<FileAction>,
    /// What other users have the file open for.
    pub other_actions: Vec<FileAction>,
    /// I hold the lock.
    pub our_lock: bool,
    /// Another user holds the lock.
    pub other_lock: bool,
    /// Pending integration needs resolving.
    pub unresolved: bool,
    /// Local content differs from the revision I opened; `None` if not
    /// computed.
    pub differs: Option<bool>,
}

impl RawStatus {
    /// A file checked in and synced at revision `rev`.
    pub fn at_head(rev: u32) -> Self {
        Self {
            head_action: Some(FileAction::Edit),
            head_rev: Some(rev),
            have_rev: Some(rev),
            ..Self::default()
        }
    }

    /// Set my open action.
    pub fn opened(mut self, action: FileAction) -> Self {
        self.action = Some(action);
        self
    }

    /// Add another user's open action.
    pub fn opened_by_other(mut self, action: FileAction) -> Self {
        self.other_actions.push(action);
        self
    }
}

/// The backend's answer to a status query for one file.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum StatusReply {
    /// The backend knows the file.
    Found(RawStatus),
    /// The file is not in the backend's index.
    NotInDepot,
    /// The query failed or the answer was ambiguous.
    Error(String),
}

impl StatusReply {
    /// Whether the reply is a definitive answer.
    pub fn is_definitive(&self) -> bool {
        !matches!(self, Self::Error(_))
    }
}
