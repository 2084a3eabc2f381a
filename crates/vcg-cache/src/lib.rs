//! File-state cache for vcgate.
//!
//! The [`StateCache`] maps each workspace file to its last-known
//! [`FileStatus`](vcg_types::FileStatus). A tokio task, the refresh worker,
//! queries the backend on tokio's blocking pool and applies each batch
//! atomically; UI queries read the map and never wait on the backend.
//!
//! Every completed batch raises a [`RefreshCompleted`] notification on a
//! broadcast channel and resolves the [`RefreshTicket`]s of the requests it
//! served.
//!
//! # Modules
//!
//! - [`cache`] — [`StateCache`] and [`CacheConfig`]
//! - [`entry`] — [`CacheEntry`], [`RefreshMode`], [`RefreshCompleted`], [`RefreshTicket`]
//! - [`error`] — [`CacheError`] and the [`CacheResult`] alias

pub mod cache;
pub mod entry;
pub mod error;
mod worker;

pub use cache::{CacheConfig, RefreshStream, StateCache};
pub use entry::{CacheEntry, RefreshCompleted, RefreshMode, RefreshTicket};
pub use error::{CacheError, CacheResult};
