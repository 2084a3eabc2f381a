//! Raw backend reply to symbolic status.
//!
//! The precedence below is a policy table, reproduced exactly; the first
//! matching rule wins:
//!
//! | # | condition                                   | status                 |
//! |---|---------------------------------------------|------------------------|
//! | 1 | unresolved                                  | `NeedsResolve`         |
//! | 2 | our lock                                    | `Locked`               |
//! | 3 | my action is move-add / move-delete         | rename target / source |
//! | 3 | my action is add / delete / branch / integrate | matching open state |
//! | 3 | my action is edit                           | stale, differs, or checked out |
//! | 4 | other lock                                  | `LockedOther`          |
//! | 5 | other user has it open (delete wins)        | `OpenForDeleteOther` / `CheckedOutOther` |
//! | 6 | head action is a delete                     | `DeletedAtHead`        |
//! | 7 | no head revision                            | `Unknown`              |
//! | 8 | have missing or older than head             | `CheckedInPrevious`    |
//! | 9 | otherwise                                   | `CheckedInHead`        |

use vcg_types::{FileAction, FileStatus, RawStatus, StatusReply};

/// Classify one backend reply.
///
/// Total and side-effect free. An error or ambiguous reply maps to
/// [`FileStatus::Unknown`], never to [`FileStatus::NotControlled`]: callers
/// treat the absence of a definitive answer as "not yet determined".
pub fn classify(reply: &StatusReply) -> FileStatus {
    match reply {
        StatusReply::NotInDepot => FileStatus::NotControlled,
        StatusReply::Error(_) => FileStatus::Unknown,
        StatusReply::Found(raw) => classify_raw(raw),
    }
}

fn classify_raw(raw: &RawStatus) -> FileStatus {
    if raw.unresolved {
        return FileStatus::NeedsResolve;
    }
    if raw.our_lock {
        return FileStatus::Locked;
    }
    if let Some(action) = raw.action {
        return classify_open_by_me(action, raw);
    }
    if raw.other_lock {
        return FileStatus::LockedOther;
    }
    if !raw.other_actions.is_empty() {
        return if raw.other_actions.iter().any(|a| a.is_delete()) {
            FileStatus::OpenForDeleteOther
        } else {
            FileStatus::CheckedOutOther
        };
    }
    if raw.head_action.is_some_and(FileAction::is_delete) {
        return FileStatus::DeletedAtHead;
    }
    let Some(head) = raw.head_rev else {
        return FileStatus::Unknown;
    };
    match raw.have_rev {
        Some(have) if have >= head => FileStatus::CheckedInHead,
        _ => FileStatus::CheckedInPrevious,
    }
}

fn classify_open_by_me(action: FileAction, raw: &RawStatus) -> FileStatus {
    match action {
        FileAction::MoveAdd => FileStatus::OpenForRenameTarget,
        FileAction::MoveDelete => FileStatus::OpenForRenameSource,
        FileAction::Add => FileStatus::OpenForAdd,
        FileAction::Delete => FileStatus::OpenForDelete,
        FileAction::Branch => FileStatus::OpenForBranch,
        FileAction::Integrate => FileStatus::OpenForIntegrate,
        FileAction::Edit => {
            let stale = matches!((raw.have_rev, raw.head_rev), (Some(have), Some(head)) if have < head);
            if stale {
                FileStatus::CheckedOutStale
            } else if raw.differs == Some(true) {
                FileStatus::CheckedOutDiffers
            } else {
                FileStatus::CheckedOut
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn found(raw: RawStatus) -> FileStatus {
        classify(&StatusReply::Found(raw))
    }

    // ---- Single-flag replies ----

    #[test]
    fn not_in_depot_is_not_controlled() {
        assert_eq!(classify(&StatusReply::NotInDepot), FileStatus::NotControlled);
    }

    #[test]
    fn error_is_unknown_not_uncontrolled() {
        assert_eq!(
            classify(&StatusReply::Error("connection reset".into())),
            FileStatus::Unknown
        );
    }

    #[test]
    fn synced_head_is_checked_in_head() {
        assert_eq!(found(RawStatus::at_head(5)), FileStatus::CheckedInHead);
    }

    #[test]
    fn older_have_is_checked_in_previous() {
        let mut raw = RawStatus::at_head(5);
        raw.have_rev = Some(3);
        assert_eq!(found(raw), FileStatus::CheckedInPrevious);
    }

    #[test]
    fn never_synced_is_checked_in_previous() {
        let mut raw = RawStatus::at_head(5);
        raw.have_rev = None;
        assert_eq!(found(raw), FileStatus::CheckedInPrevious);
    }

    #[test]
    fn missing_head_is_unknown() {
        assert_eq!(found(RawStatus::default()), FileStatus::Unknown);
    }

    #[test]
    fn my_actions_map_to_open_states() {
        let cases = [
            (FileAction::Add, FileStatus::OpenForAdd),
            (FileAction::Delete, FileStatus::OpenForDelete),
            (FileAction::Branch, FileStatus::OpenForBranch),
            (FileAction::Integrate, FileStatus::OpenForIntegrate),
            (FileAction::MoveAdd, FileStatus::OpenForRenameTarget),
            (FileAction::MoveDelete, FileStatus::OpenForRenameSource),
            (FileAction::Edit, FileStatus::CheckedOut),
        ];
        for (action, expected) in cases {
            assert_eq!(found(RawStatus::at_head(2).opened(action)), expected, "{action:?}");
        }
    }

    #[test]
    fn head_delete_is_deleted_at_head() {
        let mut raw = RawStatus::at_head(4);
        raw.head_action = Some(FileAction::MoveDelete);
        assert_eq!(found(raw), FileStatus::DeletedAtHead);
    }

    // ---- Multi-flag fixtures (precedence) ----

    #[test]
    fn unresolved_beats_everything() {
        let mut raw = RawStatus::at_head(2).opened(FileAction::Edit);
        raw.unresolved = true;
        raw.our_lock = true;
        raw.other_lock = true;
        assert_eq!(found(raw), FileStatus::NeedsResolve);
    }

    #[test]
    fn our_lock_beats_local_differences() {
        let mut raw = RawStatus::at_head(2).opened(FileAction::Edit);
        raw.our_lock = true;
        raw.differs = Some(true);
        assert_eq!(found(raw), FileStatus::Locked);
    }

    #[test]
    fn my_open_beats_other_lock() {
        let mut raw = RawStatus::at_head(2).opened(FileAction::Edit);
        raw.other_lock = true;
        assert_eq!(found(raw), FileStatus::CheckedOut);
    }

    #[test]
    fn other_lock_beats_other_open() {
        let mut raw = RawStatus::at_head(2).opened_by_other(FileAction::Edit);
        raw.other_lock = true;
        assert_eq!(found(raw), FileStatus::LockedOther);
    }

    #[test]
    fn other_delete_wins_over_other_edit() {
        let raw = RawStatus::at_head(2)
            .opened_by_other(FileAction::Edit)
            .opened_by_other(FileAction::Delete);
        assert_eq!(found(raw), FileStatus::OpenForDeleteOther);
    }

    #[test]
    fn other_edit_is_checked_out_other() {
        let raw = RawStatus::at_head(2).opened_by_other(FileAction::Integrate);
        assert_eq!(found(raw), FileStatus::CheckedOutOther);
    }

    #[test]
    fn stale_beats_differs_for_my_edit() {
        let mut raw = RawStatus::at_head(6).opened(FileAction::Edit);
        raw.have_rev = Some(5);
        raw.differs = Some(true);
        assert_eq!(found(raw), FileStatus::CheckedOutStale);
    }

    #[test]
    fn differs_on_head_edit() {
        let mut raw = RawStatus::at_head(6).opened(FileAction::Edit);
        raw.differs = Some(true);
        assert_eq!(found(raw), FileStatus::CheckedOutDiffers);
        let mut raw = RawStatus::at_head(6).opened(FileAction::Edit);
        raw.differs = Some(false);
        assert_eq!(found(raw), FileStatus::CheckedOut);
    }

    #[test]
    fn other_open_beats_head_delete() {
        let mut raw = RawStatus::at_head(3).opened_by_other(FileAction::Edit);
        raw.head_action = Some(FileAction::Delete);
        assert_eq!(found(raw), FileStatus::CheckedOutOther);
    }

    // ---- Totality ----

    fn any_action() -> impl Strategy<Value = FileAction> {
        prop_oneof![
            Just(FileAction::Add),
            Just(FileAction::Edit),
            Just(FileAction::Delete),
            Just(FileAction::Branch),
            Just(FileAction::Integrate),
            Just(FileAction::MoveAdd),
            Just(FileAction::MoveDelete),
        ]
    }

    prop_compose! {
        fn any_raw()(
            head_action in proptest::option::of(any_action()),
            head_rev in proptest::option::of(0u32..10),
            have_rev in proptest::option::of(0u32..10),
            action in proptest::option::of(any_action()),
            other_actions in proptest::collection::vec(any_action(), 0..3),
            our_lock in any::<bool>(),
            other_lock in any::<bool>(),
            unresolved in any::<bool>(),
            differs in proptest::option::of(any::<bool>()),
        ) -> RawStatus {
            RawStatus { head_action, head_rev, have_rev, action, other_actions, our_lock, other_lock, unresolved, differs }
        }
    }

    proptest! {
        #[test]
        fn found_reply_is_never_uncontrolled(raw in any_raw()) {
            prop_assert_ne!(found(raw), FileStatus::NotControlled);
        }

        #[test]
        fn classification_is_deterministic(raw in any_raw()) {
            prop_assert_eq!(found(raw.clone()), found(raw));
        }

        #[test]
        fn any_error_message_is_unknown(message in ".*") {
            prop_assert_eq!(classify(&StatusReply::Error(message)), FileStatus::Unknown);
        }
    }
}
