use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// A column of the eligibility table: something a user may ask to do to a
/// file, whose permission depends only on the file's status.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Operation {
    CheckOut,
    Lock,
    Delete,
    Rename,
    Add,
    Revert,
    RevertIfUnchanged,
    Diff,
    History,
    GetLatest,
}

impl Operation {
    /// Every operation, in declaration order.
    pub const ALL: [Operation; 10] = [
        Self::CheckOut,
        Self::Lock,
        Self::Delete,
        Self::Rename,
        Self::Add,
        Self::Revert,
        Self::RevertIfUnchanged,
        Self::Diff,
        Self::History,
        Self::GetLatest,
    ];

    /// Kebab-case name used on the command line and in logs.
    pub fn name(self) -> &'static str {
        match self {
            Self::CheckOut => "check-out",
            Self::Lock => "lock",
            Self::Delete => "delete",
            Self::Rename => "rename",
            Self::Add => "add",
            Self::Revert => "revert",
            Self::RevertIfUnchanged => "revert-if-unchanged",
            Self::Diff => "diff",
            Self::History => "history",
            Self::GetLatest => "get-latest",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Operation {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|op| op.name() == wanted || op.name().replace('-', "") == wanted)
            .ok_or_else(|| TypeError::UnknownOperation(s.to_string()))
    }
}

/// A per-file backend command the executor can run as a batch.
///
/// Each command is gated by one eligibility column (see
/// [`CommandKind::operation`]). Rename takes file pairs and is not listed
/// here.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CommandKind {
    /// Open for edit (checkout).
    Edit,
    Add,
    Delete,
    Revert,
    RevertIfUnchanged,
    Lock,
    /// Get latest revision.
    Sync,
    History,
    Diff,
    TimeLapse,
}

impl CommandKind {
    /// Every command, in declaration order.
    pub const ALL: [CommandKind; 10] = [
        Self::Edit,
        Self::Add,
        Self::Delete,
        Self::Revert,
        Self::RevertIfUnchanged,
        Self::Lock,
        Self::Sync,
        Self::History,
        Self::Diff,
        Self::TimeLapse,
    ];

    /// The eligibility column that gates this command.
    pub fn operation(self) -> Operation {
        match self {
            Self::Edit => Operation::CheckOut,
            Self::Add => Operation::Add,
            Self::Delete => Operation::Delete,
            Self::Revert => Operation::Revert,
            Self::RevertIfUnchanged => Operation::RevertIfUnchanged,
            Self::Lock => Operation::Lock,
            Self::Sync => Operation::GetLatest,
            Self::History | Self::TimeLapse => Operation::History,
            Self::Diff => Operation::Diff,
        }
    }

    /// Whether the command only opens a report and changes no file state.
    pub fn is_report(self) -> bool {
        matches!(self, Self::History | Self::Diff | Self::TimeLapse)
    }

    /// Kebab-case name used on the command line and in logs.
    pub fn name(self) -> &'static str {
        match self {
            Self::Edit => "edit",
            Self::Add => "add",
            Self::Delete => "delete",
            Self::Revert => "revert",
            Self::RevertIfUnchanged => "revert-if-unchanged",
            Self::Lock => "lock",
            Self::Sync => "sync",
            Self::History => "history",
            Self::Diff => "diff",
            Self::TimeLapse => "time-lapse",
        }
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for CommandKind {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        if wanted == "checkout" || wanted == "check-out" {
            return Ok(Self::Edit);
        }
        Self::ALL
            .into_iter()
            .find(|cmd| cmd.name() == wanted)
            .ok_or_else(|| TypeError::UnknownCommand(s.to_string()))
    }
}
