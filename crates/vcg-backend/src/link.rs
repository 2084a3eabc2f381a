//! The shared backend of one workspace and its connect/disconnect bracket.

use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::debug;

use crate::error::BackendResult;
use crate::traits::VcsBackend;

/// Shared handle to the single backend of a workspace.
///
/// Cloning the link shares the same backend. [`BackendLink::connect`] blocks
/// until no other bracket is open, so two units of work never interleave on
/// the connection.
#[derive(Clone)]
pub struct BackendLink {
    backend: Arc<Mutex<Box<dyn VcsBackend>>>,
}

impl BackendLink {
    /// Wrap a backend.
    pub fn new(backend: impl VcsBackend + 'static) -> Self {
        Self {
            backend: Arc::new(Mutex::new(Box::new(backend))),
        }
    }

    /// Take exclusive access and connect.
    ///
    /// On connect failure the exclusive access is released immediately and no
    /// disconnect is issued.
    pub fn connect(&self) -> BackendResult<Connection<'_>> {
        // A panic inside an earlier bracket poisons the mutex; the guard's
        // drop already disconnected, so the backend is in a clean state.
        let mut guard = self.backend.lock().unwrap_or_else(PoisonError::into_inner);
        guard.connect()?;
        debug!("backend connected");
        Ok(Connection { guard })
    }
}

impl fmt::Debug for BackendLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendLink")
            .field("shared", &Arc::strong_count(&self.backend))
            .finish()
    }
}

/// One open connect..disconnect bracket.
///
/// Dereferences to the backend. Dropping the guard disconnects, on every
/// exit path including unwinding.
pub struct Connection<'a> {
    guard: MutexGuard<'a, Box<dyn VcsBackend>>,
}

impl Deref for Connection<'_> {
    type Target = dyn VcsBackend + 'static;

    fn deref(&self) -> &Self::Target {
        self.guard.as_ref()
    }
}

impl DerefMut for Connection<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.guard.as_mut()
    }
}

impl Drop for Connection<'_> {
    fn drop(&mut self) {
        self.guard.disconnect();
        debug!("backend disconnected");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{ConnectFailure, InMemoryBackend};
    use vcg_types::FileId;

    #[test]
    fn connection_disconnects_on_drop() {
        let backend = InMemoryBackend::new();
        let link = BackendLink::new(backend.clone());
        {
            let _conn = link.connect().unwrap();
            assert!(backend.is_connected());
        }
        assert!(!backend.is_connected());
        assert_eq!(backend.connect_count(), 1);
        assert_eq!(backend.disconnect_count(), 1);
    }

    #[test]
    fn failed_connect_does_not_disconnect() {
        let backend = InMemoryBackend::new();
        backend.set_connect_failure(Some(ConnectFailure::Config("P4PORT unset".into())));
        let link = BackendLink::new(backend.clone());
        assert!(link.connect().is_err());
        assert_eq!(backend.disconnect_count(), 0);

        // The link is usable again once the failure clears.
        backend.set_connect_failure(None);
        assert!(link.connect().is_ok());
    }

    #[test]
    fn disconnects_when_unwinding() {
        let backend = InMemoryBackend::new();
        let link = BackendLink::new(backend.clone());
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let mut conn = link.connect().unwrap();
            let _ = conn.status(&FileId::new("a"));
            panic!("action blew up");
        }));
        assert!(result.is_err());
        assert_eq!(backend.disconnect_count(), 1);
        // The poisoned mutex is recovered.
        assert!(link.connect().is_ok());
    }

    #[test]
    fn brackets_are_serialized_across_threads() {
        let backend = InMemoryBackend::new();
        let link = BackendLink::new(backend.clone());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let link = link.clone();
                std::thread::spawn(move || {
                    for _ in 0..25 {
                        let mut conn = link.connect().unwrap();
                        let _ = conn.status(&FileId::new("x"));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        // A second connect while connected would have failed.
        assert_eq!(backend.connect_count(), 100);
        assert_eq!(backend.disconnect_count(), 100);
    }
}
