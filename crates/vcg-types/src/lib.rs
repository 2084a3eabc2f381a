//! Foundation types for vcgate.
//!
//! This crate provides the identity and status types shared by every other
//! vcgate crate: what a file is, which UI nodes reference it, what the
//! backend said about it, and which symbolic status it resolves to.
//!
//! # Key Types
//!
//! - [`FileId`] — Normalized identity of a workspace file
//! - [`NodeId`] — Opaque identifier of a host hierarchy node
//! - [`Selection`] — Ordered, duplicate-free set of files plus their nodes
//! - [`FileStatus`] — The closed set of per-file version-control states
//! - [`StatusReply`] / [`RawStatus`] — What the backend returns for one file
//! - [`Operation`] — Eligibility table columns
//! - [`CommandKind`] — Backend commands the executor can batch
//! - [`SessionId`] — UUID v7 identifier of an open workspace session

pub mod error;
pub mod file;
pub mod operation;
pub mod raw;
pub mod selection;
pub mod session;
pub mod status;

pub use error::TypeError;
pub use file::{FileId, NodeId};
pub use operation::{CommandKind, Operation};
pub use raw::{FileAction, RawStatus, StatusReply};
pub use selection::Selection;
pub use session::SessionId;
pub use status::FileStatus;
