//! Status classification and eligibility policy for vcgate.
//!
//! Two pure layers sit between the backend and every interactive flow:
//!
//! 1. [`classify`] turns a backend [`StatusReply`](vcg_types::StatusReply)
//!    into exactly one [`FileStatus`](vcg_types::FileStatus).
//! 2. The eligibility table maps a status to the set of
//!    [`Operation`](vcg_types::Operation)s it permits.
//!
//! The table is the single source of truth for glyph selection, the
//! query-edit/query-save protocol and bulk command validation. Nothing else
//! in the workspace re-derives permission from a status.
//!
//! # Quick Start
//!
//! ```rust
//! use vcg_policy::{classify, is_eligible, is_eligible_for_check_out};
//! use vcg_types::{FileStatus, Operation, RawStatus, StatusReply};
//!
//! let status = classify(&StatusReply::Found(RawStatus::at_head(3)));
//! assert_eq!(status, FileStatus::CheckedInHead);
//! assert!(is_eligible_for_check_out(status));
//! assert!(!is_eligible(status, Operation::Add));
//! ```

pub mod classify;
pub mod eligibility;
pub mod glyph;

pub use classify::classify;
pub use eligibility::{
    is_eligible, is_eligible_for_add, is_eligible_for_check_out, is_eligible_for_delete,
    is_eligible_for_diff, is_eligible_for_get_latest, is_eligible_for_history,
    is_eligible_for_lock, is_eligible_for_rename, is_eligible_for_revert,
    is_eligible_for_revert_if_unchanged, permitted, OperationSet,
};
pub use glyph::{glyph_for, tooltip, Glyph};
