//! The closed set of per-file version-control states.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Symbolic version-control status of one file.
///
/// Exactly one variant holds per file at any instant. [`FileStatus::Unknown`]
/// is the only legal value before the state cache has resolved a file, and
/// it is also what an ambiguous backend answer maps to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileStatus {
    /// Not yet determined.
    Unknown,
    /// Not under version control.
    NotControlled,
    /// Checked in; the local revision is the head revision.
    CheckedInHead,
    /// Checked in at an older revision than head.
    CheckedInPrevious,
    /// Open for edit by me.
    CheckedOut,
    /// Open for edit by me, with local differences.
    CheckedOutDiffers,
    /// Open for edit by me at an older revision than head.
    CheckedOutStale,
    /// Open for edit by another user.
    CheckedOutOther,
    /// Open for add.
    OpenForAdd,
    /// Open for delete by me.
    OpenForDelete,
    /// Open for delete by another user.
    OpenForDeleteOther,
    /// Deleted at the head revision.
    DeletedAtHead,
    /// Locked by me.
    Locked,
    /// Locked by another user.
    LockedOther,
    /// Needs merge resolution.
    NeedsResolve,
    /// Open for integrate.
    OpenForIntegrate,
    /// Open for branch.
    OpenForBranch,
    /// Source side of a pending rename.
    OpenForRenameSource,
    /// Target side of a pending rename.
    OpenForRenameTarget,
}

impl FileStatus {
    /// Every variant, in declaration order. `ALL[s.index()] == s`.
    pub const ALL: [FileStatus; 19] = [
        Self::Unknown,
        Self::NotControlled,
        Self::CheckedInHead,
        Self::CheckedInPrevious,
        Self::CheckedOut,
        Self::CheckedOutDiffers,
        Self::CheckedOutStale,
        Self::CheckedOutOther,
        Self::OpenForAdd,
        Self::OpenForDelete,
        Self::OpenForDeleteOther,
        Self::DeletedAtHead,
        Self::Locked,
        Self::LockedOther,
        Self::NeedsResolve,
        Self::OpenForIntegrate,
        Self::OpenForBranch,
        Self::OpenForRenameSource,
        Self::OpenForRenameTarget,
    ];

    /// Number of variants.
    pub const COUNT: usize = Self::ALL.len();

    /// Dense index of this variant, usable to index per-status tables.
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Whether the backend knows this file at all.
    pub fn is_controlled(self) -> bool {
        !matches!(self, Self::Unknown | Self::NotControlled)
    }

    /// Whether the file is opened by me in any way.
    pub fn is_open_by_me(self) -> bool {
        matches!(
            self,
            Self::CheckedOut
                | Self::CheckedOutDiffers
                | Self::CheckedOutStale
                | Self::OpenForAdd
                | Self::OpenForDelete
                | Self::Locked
                | Self::NeedsResolve
                | Self::OpenForIntegrate
                | Self::OpenForBranch
                | Self::OpenForRenameSource
                | Self::OpenForRenameTarget
        )
    }

    /// Stable snake_case label (matches the serde representation).
    pub fn label(self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::NotControlled => "not_controlled",
            Self::CheckedInHead => "checked_in_head",
            Self::CheckedInPrevious => "checked_in_previous",
            Self::CheckedOut => "checked_out",
            Self::CheckedOutDiffers => "checked_out_differs",
            Self::CheckedOutStale => "checked_out_stale",
            Self::CheckedOutOther => "checked_out_other",
            Self::OpenForAdd => "open_for_add",
            Self::OpenForDelete => "open_for_delete",
            Self::OpenForDeleteOther => "open_for_delete_other",
            Self::DeletedAtHead => "deleted_at_head",
            Self::Locked => "locked",
            Self::LockedOther => "locked_other",
            Self::NeedsResolve => "needs_resolve",
            Self::OpenForIntegrate => "open_for_integrate",
            Self::OpenForBranch => "open_for_branch",
            Self::OpenForRenameSource => "open_for_rename_source",
            Self::OpenForRenameTarget => "open_for_rename_target",
        }
    }

    /// Human-readable description for status listings.
    pub fn description(self) -> &'static str {
        match self {
            Self::Unknown => "status not yet known",
            Self::NotControlled => "not under version control",
            Self::CheckedInHead => "checked in",
            Self::CheckedInPrevious => "checked in, newer revision available",
            Self::CheckedOut => "checked out",
            Self::CheckedOutDiffers => "checked out, modified",
            Self::CheckedOutStale => "checked out, newer revision available",
            Self::CheckedOutOther => "checked out by another user",
            Self::OpenForAdd => "marked for add",
            Self::OpenForDelete => "marked for delete",
            Self::OpenForDeleteOther => "marked for delete by another user",
            Self::DeletedAtHead => "deleted at head revision",
            Self::Locked => "locked",
            Self::LockedOther => "locked by another user",
            Self::NeedsResolve => "needs resolve",
            Self::OpenForIntegrate => "open for integrate",
            Self::OpenForBranch => "open for branch",
            Self::OpenForRenameSource => "renamed (source)",
            Self::OpenForRenameTarget => "renamed (target)",
        }
    }
}

impl Default for FileStatus {
    fn default() -> Self {
        Self::Unknown
    }
}

impl fmt::Display for FileStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
