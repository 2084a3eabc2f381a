use std::collections::HashSet;

use crate::file::{FileId, NodeId};

/// The files (and the UI nodes referencing them) targeted by one operation.
///
/// Files keep insertion order; adding a file twice is a no-op. A selection is
/// a transient request object: it is built by a caller, consumed by value by
/// the executor or the cache, and discarded.
#[derive(Clone, Debug, Default)]
pub struct Selection {
    files: Vec<FileId>,
    seen: HashSet<FileId>,
    nodes: Vec<NodeId>,
}

impl Selection {
    /// Create an empty selection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a selection from a list of files.
    pub fn from_files<I, F>(files: I) -> Self
    where
        I: IntoIterator<Item = F>,
        F: Into<FileId>,
    {
        let mut selection = Self::new();
        for file in files {
            selection.push_file(file);
        }
        selection
    }

    /// Attach UI nodes to this selection.
    pub fn with_nodes(mut self, nodes: impl IntoIterator<Item = NodeId>) -> Self {
        for node in nodes {
            self.push_node(node);
        }
        self
    }

    /// Add a file. Returns `false` if it was already selected.
    pub fn push_file(&mut self, file: impl Into<FileId>) -> bool {
        let file = file.into();
        if !self.seen.insert(file.clone()) {
            return false;
        }
        self.files.push(file);
        true
    }

    /// Add a UI node; duplicates are ignored.
    pub fn push_node(&mut self, node: NodeId) {
        if !self.nodes.contains(&node) {
            self.nodes.push(node);
        }
    }

    /// Merge another selection into this one, keeping this one's order first.
    pub fn merge(&mut self, other: Selection) {
        for file in other.files {
            self.push_file(file);
        }
        for node in other.nodes {
            self.push_node(node);
        }
    }

    /// Selected files in insertion order.
    pub fn files(&self) -> &[FileId] {
        &self.files
    }

    /// Referencing UI nodes.
    pub fn nodes(&self) -> &[NodeId] {
        &self.nodes
    }

    /// Whether `file` is selected.
    pub fn contains(&self, file: &FileId) -> bool {
        self.seen.contains(file)
    }

    /// Number of selected files.
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Returns `true` if no file is selected.
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Iterate over the selected files.
    pub fn iter(&self) -> std::slice::Iter<'_, FileId> {
        self.files.iter()
    }

    /// Split into files and nodes.
    pub fn into_parts(self) -> (Vec<FileId>, Vec<NodeId>) {
        (self.files, self.nodes)
    }
}

impl PartialEq for Selection {
    fn eq(&self, other: &Self) -> bool {
        self.files == other.files && self.nodes == other.nodes
    }
}

impl Eq for Selection {}

impl<F: Into<FileId>> FromIterator<F> for Selection {
    fn from_iter<I: IntoIterator<Item = F>>(iter: I) -> Self {
        Self::from_files(iter)
    }
}

impl<'a> IntoIterator for &'a Selection {
    type Item = &'a FileId;
    type IntoIter = std::slice::Iter<'a, FileId>;

    fn into_iter(self) -> Self::IntoIter {
        self.files.iter()
    }
}
