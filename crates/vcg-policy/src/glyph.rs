//! Status indicator selection. Drawing the indicator is the host's job.

use std::fmt;

use serde::{Deserialize, Serialize};
use vcg_types::FileStatus;

use crate::eligibility::permitted;

/// Symbolic status indicator shown next to a file.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Glyph {
    Blank,
    Uncontrolled,
    CheckedIn,
    Stale,
    CheckedOut,
    CheckedOutOther,
    Locked,
    LockedOther,
    Add,
    Delete,
    Conflict,
}

impl Glyph {
    /// One-character marker for plain-text listings.
    pub fn marker(self) -> char {
        match self {
            Self::Blank => ' ',
            Self::Uncontrolled => '?',
            Self::CheckedIn => '=',
            Self::Stale => '<',
            Self::CheckedOut => 'E',
            Self::CheckedOutOther => 'O',
            Self::Locked => 'L',
            Self::LockedOther => 'K',
            Self::Add => 'A',
            Self::Delete => 'D',
            Self::Conflict => '!',
        }
    }
}

impl fmt::Display for Glyph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.marker())
    }
}

/// Pick the indicator for a status.
pub fn glyph_for(status: FileStatus) -> Glyph {
    match status {
        FileStatus::Unknown => Glyph::Blank,
        FileStatus::NotControlled => Glyph::Uncontrolled,
        FileStatus::CheckedInHead => Glyph::CheckedIn,
        FileStatus::CheckedInPrevious => Glyph::Stale,
        FileStatus::CheckedOut
        | FileStatus::CheckedOutDiffers
        | FileStatus::CheckedOutStale
        | FileStatus::OpenForIntegrate => Glyph::CheckedOut,
        FileStatus::CheckedOutOther | FileStatus::OpenForDeleteOther => Glyph::CheckedOutOther,
        FileStatus::OpenForAdd | FileStatus::OpenForBranch | FileStatus::OpenForRenameTarget => {
            Glyph::Add
        }
        FileStatus::OpenForDelete | FileStatus::OpenForRenameSource | FileStatus::DeletedAtHead => {
            Glyph::Delete
        }
        FileStatus::Locked => Glyph::Locked,
        FileStatus::LockedOther => Glyph::LockedOther,
        FileStatus::NeedsResolve => Glyph::Conflict,
    }
}

/// Tooltip text: the status description followed by the permitted operations.
pub fn tooltip(status: FileStatus) -> String {
    let ops: Vec<&str> = permitted(status)
        .operations()
        .into_iter()
        .map(|op| op.name())
        .collect();
    if ops.is_empty() {
        status.description().to_string()
    } else {
        format!("{} ({})", status.description(), ops.join(", "))
    }
}
