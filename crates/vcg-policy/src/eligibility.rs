//! The eligibility table: which operations each status permits.
//!
//! Each row is produced by one exhaustive `match` inside a `const fn`, so a
//! new [`FileStatus`] variant fails to compile until it has a row. The rows
//! are then laid out into a constant array indexed by
//! [`FileStatus::index`]; lookups never branch on the status.
//!
//! Policy, not mechanism:
//!
//! - locked by another user → may check out (to contend), never delete or
//!   rename;
//! - rename target → may be edited further, not renamed again;
//! - only a file I have open for edit may be locked;
//! - a file only I have open may be reverted; a file someone else has open
//!   may not be reverted by me.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use vcg_types::{FileStatus, Operation};

bitflags! {
    /// A set of [`Operation`]s.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct OperationSet: u16 {
        const CHECK_OUT = 1 << 0;
        const LOCK = 1 << 1;
        const DELETE = 1 << 2;
        const RENAME = 1 << 3;
        const ADD = 1 << 4;
        const REVERT = 1 << 5;
        const REVERT_IF_UNCHANGED = 1 << 6;
        const DIFF = 1 << 7;
        const HISTORY = 1 << 8;
        const GET_LATEST = 1 << 9;
    }
}

impl OperationSet {
    /// The single-bit set for `op`.
    pub const fn of(op: Operation) -> Self {
        match op {
            Operation::CheckOut => Self::CHECK_OUT,
            Operation::Lock => Self::LOCK,
            Operation::Delete => Self::DELETE,
            Operation::Rename => Self::RENAME,
            Operation::Add => Self::ADD,
            Operation::Revert => Self::REVERT,
            Operation::RevertIfUnchanged => Self::REVERT_IF_UNCHANGED,
            Operation::Diff => Self::DIFF,
            Operation::History => Self::HISTORY,
            Operation::GetLatest => Self::GET_LATEST,
        }
    }

    /// Whether `op` is in the set.
    pub const fn allows(self, op: Operation) -> bool {
        self.contains(Self::of(op))
    }

    /// The operations in the set, in [`Operation::ALL`] order.
    pub fn operations(self) -> Vec<Operation> {
        Operation::ALL
            .into_iter()
            .filter(|op| self.allows(*op))
            .collect()
    }
}

const INSPECT: OperationSet = OperationSet::DIFF
    .union(OperationSet::HISTORY)
    .union(OperationSet::GET_LATEST);

const REVERTIBLE: OperationSet = OperationSet::REVERT.union(OperationSet::REVERT_IF_UNCHANGED);

const fn row(status: FileStatus) -> OperationSet {
    match status {
        FileStatus::Unknown => OperationSet::empty(),
        FileStatus::NotControlled => OperationSet::ADD,
        FileStatus::CheckedInHead | FileStatus::CheckedInPrevious => OperationSet::CHECK_OUT
            .union(OperationSet::DELETE)
            .union(OperationSet::RENAME)
            .union(INSPECT),
        FileStatus::CheckedOut | FileStatus::CheckedOutDiffers => REVERTIBLE
            .union(OperationSet::LOCK)
            .union(OperationSet::RENAME)
            .union(INSPECT),
        FileStatus::CheckedOutStale => REVERTIBLE.union(OperationSet::LOCK).union(INSPECT),
        FileStatus::CheckedOutOther
        | FileStatus::OpenForDeleteOther
        | FileStatus::LockedOther => OperationSet::CHECK_OUT.union(INSPECT),
        FileStatus::OpenForAdd => OperationSet::REVERT.union(OperationSet::RENAME),
        FileStatus::OpenForDelete
        | FileStatus::OpenForBranch
        | FileStatus::OpenForRenameSource => OperationSet::REVERT.union(OperationSet::HISTORY),
        FileStatus::DeletedAtHead => OperationSet::ADD
            .union(OperationSet::HISTORY)
            .union(OperationSet::GET_LATEST),
        FileStatus::Locked => REVERTIBLE.union(OperationSet::RENAME).union(INSPECT),
        FileStatus::NeedsResolve => OperationSet::REVERT
            .union(OperationSet::DIFF)
            .union(OperationSet::HISTORY),
        FileStatus::OpenForIntegrate => REVERTIBLE
            .union(OperationSet::DIFF)
            .union(OperationSet::HISTORY),
        FileStatus::OpenForRenameTarget => OperationSet::CHECK_OUT
            .union(OperationSet::REVERT)
            .union(OperationSet::DIFF)
            .union(OperationSet::HISTORY),
    }
}

const fn build_table() -> [OperationSet; FileStatus::COUNT] {
    let mut table = [OperationSet::empty(); FileStatus::COUNT];
    let mut i = 0;
    while i < FileStatus::COUNT {
        table[i] = row(FileStatus::ALL[i]);
        i += 1;
    }
    table
}

static TABLE: [OperationSet; FileStatus::COUNT] = build_table();

/// Every operation `status` permits.
pub fn permitted(status: FileStatus) -> OperationSet {
    TABLE[status.index()]
}

/// Whether `status` permits `op`.
pub fn is_eligible(status: FileStatus, op: Operation) -> bool {
    permitted(status).allows(op)
}

pub fn is_eligible_for_check_out(status: FileStatus) -> bool {
    is_eligible(status, Operation::CheckOut)
}

pub fn is_eligible_for_lock(status: FileStatus) -> bool {
    is_eligible(status, Operation::Lock)
}

pub fn is_eligible_for_delete(status: FileStatus) -> bool {
    is_eligible(status, Operation::Delete)
}

pub fn is_eligible_for_rename(status: FileStatus) -> bool {
    is_eligible(status, Operation::Rename)
}

pub fn is_eligible_for_add(status: FileStatus) -> bool {
    is_eligible(status, Operation::Add)
}

pub fn is_eligible_for_revert(status: FileStatus) -> bool {
    is_eligible(status, Operation::Revert)
}

pub fn is_eligible_for_revert_if_unchanged(status: FileStatus) -> bool {
    is_eligible(status, Operation::RevertIfUnchanged)
}

pub fn is_eligible_for_diff(status: FileStatus) -> bool {
    is_eligible(status, Operation::Diff)
}

pub fn is_eligible_for_history(status: FileStatus) -> bool {
    is_eligible(status, Operation::History)
}

pub fn is_eligible_for_get_latest(status: FileStatus) -> bool {
    is_eligible(status, Operation::GetLatest)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_has_a_row_per_status() {
        assert_eq!(TABLE.len(), FileStatus::COUNT);
        for status in FileStatus::ALL {
            assert_eq!(permitted(status), row(status));
        }
    }

    #[test]
    fn every_status_answers_every_operation() {
        for status in FileStatus::ALL {
            for op in Operation::ALL {
                let by_name = match op {
                    Operation::CheckOut => is_eligible_for_check_out(status),
                    Operation::Lock => is_eligible_for_lock(status),
                    Operation::Delete => is_eligible_for_delete(status),
                    Operation::Rename => is_eligible_for_rename(status),
                    Operation::Add => is_eligible_for_add(status),
                    Operation::Revert => is_eligible_for_revert(status),
                    Operation::RevertIfUnchanged => is_eligible_for_revert_if_unchanged(status),
                    Operation::Diff => is_eligible_for_diff(status),
                    Operation::History => is_eligible_for_history(status),
                    Operation::GetLatest => is_eligible_for_get_latest(status),
                };
                assert_eq!(by_name, is_eligible(status, op), "{status} / {op}");
            }
        }
    }

    #[test]
    fn locked_by_other_may_contend_but_not_delete_or_rename() {
        let status = FileStatus::LockedOther;
        assert!(is_eligible_for_check_out(status));
        assert!(!is_eligible_for_delete(status));
        assert!(!is_eligible_for_rename(status));
    }

    #[test]
    fn rename_target_may_be_edited_but_not_renamed_again() {
        let status = FileStatus::OpenForRenameTarget;
        assert!(is_eligible_for_check_out(status));
        assert!(!is_eligible_for_rename(status));
    }

    #[test]
    fn unknown_permits_nothing() {
        assert!(permitted(FileStatus::Unknown).is_empty());
    }

    #[test]
    fn only_uncontrolled_and_deleted_may_be_added() {
        let addable: Vec<FileStatus> = FileStatus::ALL
            .into_iter()
            .filter(|s| is_eligible_for_add(*s))
            .collect();
        assert_eq!(addable, vec![FileStatus::NotControlled, FileStatus::DeletedAtHead]);
    }

    #[test]
    fn revert_requires_my_open_state() {
        for status in FileStatus::ALL {
            if is_eligible_for_revert(status) {
                assert!(status.is_open_by_me(), "{status} revertible but not open by me");
            }
        }
    }

    #[test]
    fn lock_requires_my_open_edit() {
        for status in FileStatus::ALL {
            if is_eligible_for_lock(status) {
                assert!(status.is_open_by_me(), "{status} lockable but not open by me");
            }
        }
        assert!(!is_eligible_for_lock(FileStatus::CheckedInHead));
        assert!(!is_eligible_for_lock(FileStatus::CheckedInPrevious));
        assert!(is_eligible_for_lock(FileStatus::CheckedOut));
    }

    #[test]
    fn scenario_three_files() {
        let statuses = [
            FileStatus::CheckedInHead,
            FileStatus::CheckedOut,
            FileStatus::NotControlled,
        ];
        let checkout: Vec<bool> = statuses.iter().map(|s| is_eligible_for_check_out(*s)).collect();
        let add: Vec<bool> = statuses.iter().map(|s| is_eligible_for_add(*s)).collect();
        assert_eq!(checkout, vec![true, false, false]);
        assert_eq!(add, vec![false, false, true]);
    }

    #[test]
    fn operation_set_lists_members_in_order() {
        let set = OperationSet::HISTORY | OperationSet::CHECK_OUT;
        assert_eq!(set.operations(), vec![Operation::CheckOut, Operation::History]);
        assert!(set.allows(Operation::History));
        assert!(!set.allows(Operation::Diff));
    }
}
