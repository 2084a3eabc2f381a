//! TOML load/save of depot contents for [`InMemoryBackend`](crate::InMemoryBackend).
//!
//! ```toml
//! [files."src/main.rs"]
//! head_rev = 3
//! have_rev = 3
//!
//! [files."src/lib.rs"]
//! head_rev = 2
//! have_rev = 2
//! action = "edit"
//! our_lock = true
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use vcg_types::{FileAction, FileId, RawStatus};

use crate::error::{BackendError, BackendResult};

/// Depot and workspace state of one file.
///
/// `head_rev == 0` means the file has no submitted revision yet (only
/// opened for add or move-add).
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DepotRecord {
    pub head_rev: u32,
    pub head_action: Option<FileAction>,
    pub have_rev: Option<u32>,
    pub action: Option<FileAction>,
    pub other_actions: Vec<FileAction>,
    pub our_lock: bool,
    pub other_lock: bool,
    pub unresolved: bool,
    pub differs: bool,
    /// Source of a pending move, recorded on the move-add side.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub moved_from: Option<FileId>,
}

impl DepotRecord {
    /// A submitted file synced to its head revision.
    pub fn at_head(rev: u32) -> Self {
        Self {
            head_rev: rev,
            head_action: Some(FileAction::Edit),
            have_rev: Some(rev),
            ..Self::default()
        }
    }

    /// A new file opened for add.
    pub fn new_add() -> Self {
        Self {
            action: Some(FileAction::Add),
            ..Self::default()
        }
    }

    /// Builder: set my open action.
    pub fn with_action(mut self, action: FileAction) -> Self {
        self.action = Some(action);
        self
    }

    /// Builder: set the synced revision.
    pub fn with_have(mut self, rev: u32) -> Self {
        self.have_rev = Some(rev);
        self
    }

    /// Builder: record another client's open action.
    pub fn opened_by_other(mut self, action: FileAction) -> Self {
        self.other_actions.push(action);
        self
    }

    /// Whether the head revision exists and is not a delete.
    pub fn is_live_at_head(&self) -> bool {
        self.head_rev > 0 && !self.head_action.is_some_and(FileAction::is_delete)
    }

    /// The status the backend reports for this record.
    pub fn to_raw(&self) -> RawStatus {
        RawStatus {
            head_action: if self.head_rev > 0 { self.head_action } else { None },
            head_rev: (self.head_rev > 0).then_some(self.head_rev),
            have_rev: self.have_rev,
            action: self.action,
            other_actions: self.other_actions.clone(),
            our_lock: self.our_lock,
            other_lock: self.other_lock,
            unresolved: self.unresolved,
            differs: self.action.map(|_| self.differs),
        }
    }
}

/// Serializable depot contents.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepotFixture {
    #[serde(default)]
    pub files: BTreeMap<FileId, DepotRecord>,
}

impl DepotFixture {
    /// Parse a fixture from TOML text.
    pub fn from_toml_str(text: &str) -> BackendResult<Self> {
        toml::from_str(text).map_err(|e| BackendError::Fixture(e.to_string()))
    }

    /// Render the fixture as TOML text.
    pub fn to_toml_string(&self) -> BackendResult<String> {
        toml::to_string_pretty(self).map_err(|e| BackendError::Fixture(e.to_string()))
    }

    /// Read a fixture file.
    pub fn load(path: impl AsRef<Path>) -> BackendResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Write a fixture file, replacing any previous content.
    pub fn save(&self, path: impl AsRef<Path>) -> BackendResult<()> {
        std::fs::write(path, self.to_toml_string()?)?;
        Ok(())
    }

    /// Builder: add one file.
    pub fn with_file(mut self, file: impl Into<FileId>, record: DepotRecord) -> Self {
        self.files.insert(file.into(), record);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
[files."src/main.rs"]
head_rev = 3
have_rev = 3

[files."src/lib.rs"]
head_rev = 2
have_rev = 1
action = "edit"
our_lock = true

[files."docs/new.md"]
action = "add"
"#;

    #[test]
    fn parses_sample() {
        let fixture = DepotFixture::from_toml_str(SAMPLE).unwrap();
        assert_eq!(fixture.files.len(), 3);
        let lib = &fixture.files[&FileId::new("src/lib.rs")];
        assert_eq!(lib.action, Some(FileAction::Edit));
        assert!(lib.our_lock);
        assert_eq!(lib.have_rev, Some(1));
        let new = &fixture.files[&FileId::new("docs/new.md")];
        assert_eq!(new.head_rev, 0);
        assert!(!new.is_live_at_head());
    }

    #[test]
    fn rejects_bad_toml() {
        let err = DepotFixture::from_toml_str("[files.\"a\"]\nhead_rev = \"three\"").unwrap_err();
        assert!(matches!(err, BackendError::Fixture(_)));
    }

    #[test]
    fn save_then_load_preserves_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("depot.toml");
        let fixture = DepotFixture::default()
            .with_file("a.txt", DepotRecord::at_head(4))
            .with_file("b.txt", DepotRecord::at_head(1).with_action(FileAction::Delete));
        fixture.save(&path).unwrap();
        assert_eq!(DepotFixture::load(&path).unwrap(), fixture);
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = DepotFixture::load(dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, BackendError::Io(_)));
    }

    #[test]
    fn raw_status_hides_unsubmitted_head() {
        let raw = DepotRecord::new_add().to_raw();
        assert_eq!(raw.head_rev, None);
        assert_eq!(raw.action, Some(FileAction::Add));
        assert_eq!(raw.differs, Some(false));
        assert_eq!(DepotRecord::at_head(2).to_raw().differs, None);
    }
}
