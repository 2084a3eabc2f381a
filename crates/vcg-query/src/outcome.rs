//! Per-file and aggregate results of query-edit and query-save.

use serde::{Deserialize, Serialize};
use vcg_exec::BatchReport;
use vcg_types::{FileId, FileStatus};

use crate::flags::EditInfo;

/// How a file stands with respect to being modified.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EditClass {
    /// The user already chose to edit this file in memory.
    AlreadyApproved,
    /// Writable on disk, or not on disk at all.
    NotBlocked,
    /// Read-only, and the cached status can be checked out.
    BlockedReadOnlyUnderControl,
    /// Read-only, and the cached status cannot be checked out.
    BlockedReadOnlyNotUnderControl,
}

/// Allow or deny.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Allow,
    Deny,
}

/// Query-edit answer for one file.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEdit {
    pub file: FileId,
    /// `None` when classification itself failed.
    pub class: Option<EditClass>,
    pub status: FileStatus,
    pub verdict: Verdict,
    pub info: EditInfo,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Aggregate query-edit answer.
#[derive(Debug)]
pub struct EditOutcome {
    /// `Allow` unless some file was denied.
    pub verdict: Verdict,
    /// Union of the per-file info flags.
    pub info: EditInfo,
    pub files: Vec<FileEdit>,
    /// Files whose queued checkout did not succeed. The verdict is not
    /// changed by a failed checkout.
    pub failed_checkouts: Vec<FileId>,
    /// The checkout batch, if any checkout was queued and the batch ran.
    pub checkout: Option<BatchReport>,
}

impl EditOutcome {
    pub fn is_allowed(&self) -> bool {
        self.verdict == Verdict::Allow
    }

    pub fn file(&self, file: &FileId) -> Option<&FileEdit> {
        self.files.iter().find(|f| &f.file == file)
    }
}

/// Query-save answer for one file.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SaveResult {
    Save,
    SaveAs,
    Skip,
    Cancel,
}

/// Aggregate query-save answer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SaveVerdict {
    SaveOk,
    SaveOkPartial,
    ForceSaveAs,
    Cancel,
}

impl SaveVerdict {
    /// Cancel if any file cancelled, else save-as if any file asked for it,
    /// else partial if any file was skipped, else OK.
    pub fn aggregate<'a>(results: impl IntoIterator<Item = &'a SaveResult>) -> Self {
        let mut verdict = Self::SaveOk;
        for result in results {
            verdict = match (verdict, result) {
                (_, SaveResult::Cancel) | (Self::Cancel, _) => Self::Cancel,
                (_, SaveResult::SaveAs) | (Self::ForceSaveAs, _) => Self::ForceSaveAs,
                (_, SaveResult::Skip) | (Self::SaveOkPartial, _) => Self::SaveOkPartial,
                (Self::SaveOk, SaveResult::Save) => Self::SaveOk,
            };
        }
        verdict
    }
}

/// Query-save answer for one file.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileSave {
    pub file: FileId,
    pub class: Option<EditClass>,
    pub status: FileStatus,
    pub result: SaveResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Aggregate query-save answer.
#[derive(Debug)]
pub struct SaveOutcome {
    pub verdict: SaveVerdict,
    pub files: Vec<FileSave>,
    /// Files whose queued checkout did not succeed; they were skipped.
    pub failed_checkouts: Vec<FileId>,
    pub checkout: Option<BatchReport>,
}

impl SaveOutcome {
    pub fn file(&self, file: &FileId) -> Option<&FileSave> {
        self.files.iter().find(|f| &f.file == file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::SaveResult::*;

    #[test]
    fn save_verdict_precedence() {
        assert_eq!(SaveVerdict::aggregate(&[Save, Save]), SaveVerdict::SaveOk);
        assert_eq!(SaveVerdict::aggregate(&[Save, Skip]), SaveVerdict::SaveOkPartial);
        assert_eq!(SaveVerdict::aggregate(&[Skip, SaveAs, Save]), SaveVerdict::ForceSaveAs);
        assert_eq!(SaveVerdict::aggregate(&[SaveAs, Cancel, Skip]), SaveVerdict::Cancel);
        assert_eq!(SaveVerdict::aggregate(&[Cancel, Save]), SaveVerdict::Cancel);
        assert_eq!(SaveVerdict::aggregate(&[] as &[SaveResult]), SaveVerdict::SaveOk);
    }
}
