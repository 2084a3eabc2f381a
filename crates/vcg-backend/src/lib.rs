//! Collaborator interfaces for vcgate.
//!
//! The core never talks to a version-control server or to the disk
//! directly. It goes through two seams defined here:
//!
//! - [`VcsBackend`] — a stateful, synchronous backend connection that must be
//!   explicitly connected and disconnected around each unit of work. The
//!   [`BackendLink`] owns the single shared backend of a workspace and hands
//!   out [`Connection`] guards; a guard holds exclusive access for exactly
//!   one connect..disconnect bracket and disconnects on drop.
//! - [`WorkspaceFs`] — the host's view of on-disk files (existence,
//!   read-only bit, rename).
//!
//! # Modules
//!
//! - [`error`] — [`BackendError`] and the [`BackendResult`] alias
//! - [`traits`] — The [`VcsBackend`] trait
//! - [`link`] — [`BackendLink`] and the RAII [`Connection`] bracket
//! - [`memory`] — [`InMemoryBackend`], a functional fixture depot for tests
//!   and the CLI
//! - [`fixture`] — TOML load/save of depot contents
//! - [`workspace`] — [`WorkspaceFs`] with local and in-memory implementations

pub mod error;
pub mod fixture;
pub mod link;
pub mod memory;
pub mod traits;
pub mod workspace;

pub use error::{BackendError, BackendResult};
pub use fixture::{DepotFixture, DepotRecord};
pub use link::{BackendLink, Connection};
pub use memory::{BackendCall, ConnectFailure, InMemoryBackend, StatusHold};
pub use traits::VcsBackend;
pub use workspace::{InMemoryFs, LocalFs, WorkspaceFs};
