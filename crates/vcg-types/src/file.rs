use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Identity of a file in the workspace.
///
/// A `FileId` is a normalized path: backslashes become `/`, runs of
/// separators collapse to one, and trailing separators are dropped. Two paths
/// that differ only in those respects are the same file. Equality, hashing
/// and ordering all operate on the normalized form, so a `FileId` can key the
/// state cache and the approval set directly.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct FileId(String);

impl FileId {
    /// Build an identity from any path-like string.
    pub fn new(path: impl AsRef<str>) -> Self {
        Self(normalize(path.as_ref()))
    }

    /// Build an identity, rejecting empty or blank paths.
    pub fn parse(path: &str) -> Result<Self, TypeError> {
        if path.trim().is_empty() {
            return Err(TypeError::EmptyPath);
        }
        Ok(Self::new(path))
    }

    /// Build an identity from a filesystem path (lossy on non-UTF-8 input).
    pub fn from_path(path: &Path) -> Self {
        Self::new(path.to_string_lossy())
    }

    /// The normalized path string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The normalized path as a [`Path`].
    pub fn as_path(&self) -> &Path {
        Path::new(&self.0)
    }

    /// The final path component, if any.
    pub fn file_name(&self) -> Option<&str> {
        self.0.rsplit('/').next().filter(|name| !name.is_empty())
    }
}

fn normalize(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut previous_was_separator = false;
    for ch in raw.chars() {
        let ch = if ch == '\\' { '/' } else { ch };
        if ch == '/' {
            if previous_was_separator {
                continue;
            }
            previous_was_separator = true;
        } else {
            previous_was_separator = false;
        }
        out.push(ch);
    }
    while out.len() > 1 && out.ends_with('/') {
        out.pop();
    }
    out
}

impl From<String> for FileId {
    fn from(path: String) -> Self {
        Self::new(path)
    }
}

impl From<&str> for FileId {
    fn from(path: &str) -> Self {
        Self::new(path)
    }
}

impl From<&Path> for FileId {
    fn from(path: &Path) -> Self {
        Self::from_path(path)
    }
}

impl From<FileId> for String {
    fn from(id: FileId) -> Self {
        id.0
    }
}

impl AsRef<Path> for FileId {
    fn as_ref(&self) -> &Path {
        self.as_path()
    }
}

impl fmt::Debug for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FileId({})", self.0)
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque identifier of a host hierarchy node that references a file.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub u32);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node#{}", self.0)
    }
}
