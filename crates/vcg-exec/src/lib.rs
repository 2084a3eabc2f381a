//! Command executor for vcgate.
//!
//! The [`CommandExecutor`] runs one backend command over a selection of
//! files: a single connect..disconnect bracket for the whole batch, an
//! eligibility check per file against the cached status, independent
//! per-file success or failure, and a background cache refresh of the
//! selection once the connection has closed.

pub mod error;
pub mod executor;
pub mod report;

pub use error::{ExecError, ExecResult};
pub use executor::CommandExecutor;
pub use report::{BatchReport, FileOutcome, OutcomeKind};
