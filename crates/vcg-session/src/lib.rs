//! Workspace session for vcgate.
//!
//! A [`WorkspaceSession`] owns everything that lives only while a workspace
//! is open: the backend link, the [`StateCache`](vcg_cache::StateCache), the
//! command executor and the query protocol with its approval set. Opening a
//! session builds fresh instances; [`WorkspaceSession::close`] stops the
//! refresh worker and drops them together.
//!
//! # Modules
//!
//! - [`config`] — [`SessionConfig`], loaded from TOML
//! - [`session`] — [`WorkspaceSession`] and the host-event entry points
//! - [`listener`] — `#[async_trait]` refresh-completed callbacks
//! - [`scan`] — Workspace file discovery honoring ignore files
//! - [`error`] — [`SessionError`] and the [`SessionResult`] alias

pub mod config;
pub mod error;
pub mod listener;
pub mod scan;
pub mod session;

pub use config::{BackendSettings, SessionConfig};
pub use error::{SessionError, SessionResult};
pub use listener::{NoOpListener, RefreshListener};
pub use scan::scan_workspace;
pub use session::WorkspaceSession;
