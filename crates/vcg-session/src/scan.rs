use std::path::Path;

use ignore::WalkBuilder;
use tracing::{debug, warn};
use vcg_types::{FileId, Selection};

use crate::error::{SessionError, SessionResult};

/// Every file under `root`, relative to it and sorted.
///
/// Hidden entries are skipped and `.gitignore`, `.ignore` and `.p4ignore`
/// files are honored whether or not the root is a git checkout. Unreadable
/// entries are logged and skipped.
pub fn scan_workspace(root: &Path) -> SessionResult<Selection> {
    if !root.is_dir() {
        return Err(SessionError::Scan(format!("{} is not a directory", root.display())));
    }

    let mut builder = WalkBuilder::new(root);
    builder
        .hidden(true)
        .git_ignore(true)
        .git_exclude(true)
        .git_global(false)
        .ignore(true)
        .parents(false)
        .require_git(false)
        .add_custom_ignore_filename(".p4ignore");

    let mut files = Vec::new();
    for entry in builder.build() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(root = %root.display(), error = %e, "skipping unreadable entry");
                continue;
            }
        };
        if !entry.file_type().is_some_and(|t| t.is_file()) {
            continue;
        }
        let relative = entry.path().strip_prefix(root).unwrap_or(entry.path());
        files.push(FileId::from(relative));
    }
    files.sort();
    debug!(root = %root.display(), files = files.len(), "workspace scanned");
    Ok(Selection::from_files(files))
}
