//! Interactive query-edit / query-save protocol for vcgate.
//!
//! Before the host lets the user modify or save a file it asks the
//! [`QueryProtocol`]. Each file is classified from the on-disk read-only bit,
//! the cached status and the session's in-memory-edit approvals, then a
//! terminal action is chosen: allow silently, deny silently, ask the
//! [`Decider`], or queue a checkout. Queued checkouts run as one executor
//! batch after every file has been classified.
//!
//! # Modules
//!
//! - [`flags`] — Request flags and per-file info flags
//! - [`decider`] — The [`Decider`] capability and its stock implementations
//! - [`outcome`] — Per-file and aggregate results
//! - [`protocol`] — [`QueryProtocol`] itself
//! - [`error`] — [`QueryError`]

pub mod decider;
pub mod error;
pub mod flags;
pub mod outcome;
pub mod protocol;

pub use decider::{
    Answer, AskCaller, AutoAllow, AutoDeny, Decider, EditAnswer, Prompt, SaveAnswer,
    UncontrolledSaveAnswer, WritableAnswer,
};
pub use error::QueryError;
pub use flags::{EditInfo, QueryEditFlags, QuerySaveFlags};
pub use outcome::{EditClass, EditOutcome, FileEdit, FileSave, SaveOutcome, SaveResult, SaveVerdict, Verdict};
pub use protocol::{QueryPolicy, QueryProtocol};
