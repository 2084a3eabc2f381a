//! The host's view of on-disk workspace files.

use std::collections::{HashMap, HashSet};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use vcg_types::FileId;

/// File-system operations the core needs from the host.
pub trait WorkspaceFs: Send + Sync {
    /// Whether the file exists on disk.
    fn exists(&self, file: &FileId) -> bool;

    /// Whether the file's read-only attribute is set.
    fn is_read_only(&self, file: &FileId) -> io::Result<bool>;

    /// Set or clear the read-only attribute.
    fn set_read_only(&self, file: &FileId, read_only: bool) -> io::Result<()>;

    /// Clear the read-only attribute.
    fn make_writable(&self, file: &FileId) -> io::Result<()> {
        self.set_read_only(file, false)
    }

    /// Rename a file on disk.
    fn rename(&self, from: &FileId, to: &FileId) -> io::Result<()>;
}

/// [`WorkspaceFs`] over the real file system, resolving relative file ids
/// against a root directory.
#[derive(Clone, Debug)]
pub struct LocalFs {
    root: PathBuf,
}

impl LocalFs {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute path of a file id.
    pub fn resolve(&self, file: &FileId) -> PathBuf {
        let path = file.as_path();
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }
}

impl WorkspaceFs for LocalFs {
    fn exists(&self, file: &FileId) -> bool {
        self.resolve(file).is_file()
    }

    fn is_read_only(&self, file: &FileId) -> io::Result<bool> {
        Ok(std::fs::metadata(self.resolve(file))?.permissions().readonly())
    }

    fn set_read_only(&self, file: &FileId, read_only: bool) -> io::Result<()> {
        let path = self.resolve(file);
        let mut permissions = std::fs::metadata(&path)?.permissions();
        permissions.set_readonly(read_only);
        std::fs::set_permissions(&path, permissions)
    }

    fn rename(&self, from: &FileId, to: &FileId) -> io::Result<()> {
        let target = self.resolve(to);
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::rename(self.resolve(from), target)
    }
}

#[derive(Default)]
struct MemFsState {
    files: HashMap<FileId, bool>,
    failing: HashSet<FileId>,
}

/// In-memory [`WorkspaceFs`] for tests. Clones share state.
#[derive(Clone, Default)]
pub struct InMemoryFs {
    state: Arc<Mutex<MemFsState>>,
}

impl InMemoryFs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create or replace a file with the given read-only bit.
    pub fn insert(&self, file: impl Into<FileId>, read_only: bool) {
        self.state().files.insert(file.into(), read_only);
    }

    /// Make every mutation touching `file` fail.
    pub fn fail_on(&self, file: impl Into<FileId>) {
        self.state().failing.insert(file.into());
    }

    fn state(&self) -> MutexGuard<'_, MemFsState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn not_found(file: &FileId) -> io::Error {
    io::Error::new(io::ErrorKind::NotFound, format!("{file}: no such file"))
}

fn injected(file: &FileId) -> io::Error {
    io::Error::new(io::ErrorKind::PermissionDenied, format!("{file}: injected failure"))
}

impl WorkspaceFs for InMemoryFs {
    fn exists(&self, file: &FileId) -> bool {
        self.state().files.contains_key(file)
    }

    fn is_read_only(&self, file: &FileId) -> io::Result<bool> {
        self.state().files.get(file).copied().ok_or_else(|| not_found(file))
    }

    fn set_read_only(&self, file: &FileId, read_only: bool) -> io::Result<()> {
        let mut state = self.state();
        if state.failing.contains(file) {
            return Err(injected(file));
        }
        let bit = state.files.get_mut(file).ok_or_else(|| not_found(file))?;
        *bit = read_only;
        Ok(())
    }

    fn rename(&self, from: &FileId, to: &FileId) -> io::Result<()> {
        let mut state = self.state();
        if state.failing.contains(from) || state.failing.contains(to) {
            return Err(injected(from));
        }
        let read_only = state.files.remove(from).ok_or_else(|| not_found(from))?;
        state.files.insert(to.clone(), read_only);
        Ok(())
    }
}
