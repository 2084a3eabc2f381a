//! The decision capability consulted when a query needs the user.

use std::fmt;

use serde::{Deserialize, Serialize};
use vcg_types::{FileId, FileStatus};

/// Answer to "check out this read-only file before editing?".
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EditAnswer {
    CheckOut,
    EditInMemory,
    Cancel,
}

/// Answer to "make this uncontrolled read-only file writable?".
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WritableAnswer {
    MakeWritable,
    Cancel,
}

/// Answer to "check out this read-only file before saving?".
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SaveAnswer {
    CheckOut,
    SaveAs,
    Skip,
    Cancel,
}

/// Answer to "save over this uncontrolled read-only file?".
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UncontrolledSaveAnswer {
    MakeWritable,
    Skip,
}

/// Decides the interactive questions of the query protocol.
pub trait Decider: Send + Sync {
    fn on_checkout_edit(&self, file: &FileId, status: FileStatus) -> EditAnswer;
    fn on_make_writable(&self, file: &FileId) -> WritableAnswer;
    fn on_checkout_save(&self, file: &FileId, status: FileStatus) -> SaveAnswer;
    fn on_save_uncontrolled(&self, file: &FileId) -> UncontrolledSaveAnswer;
}

/// Always checks out or makes writable.
#[derive(Clone, Copy, Debug, Default)]
pub struct AutoAllow;

impl Decider for AutoAllow {
    fn on_checkout_edit(&self, _file: &FileId, _status: FileStatus) -> EditAnswer {
        EditAnswer::CheckOut
    }

    fn on_make_writable(&self, _file: &FileId) -> WritableAnswer {
        WritableAnswer::MakeWritable
    }

    fn on_checkout_save(&self, _file: &FileId, _status: FileStatus) -> SaveAnswer {
        SaveAnswer::CheckOut
    }

    fn on_save_uncontrolled(&self, _file: &FileId) -> UncontrolledSaveAnswer {
        UncontrolledSaveAnswer::MakeWritable
    }
}

/// Always cancels, or skips where cancel is not an option.
#[derive(Clone, Copy, Debug, Default)]
pub struct AutoDeny;

impl Decider for AutoDeny {
    fn on_checkout_edit(&self, _file: &FileId, _status: FileStatus) -> EditAnswer {
        EditAnswer::Cancel
    }

    fn on_make_writable(&self, _file: &FileId) -> WritableAnswer {
        WritableAnswer::Cancel
    }

    fn on_checkout_save(&self, _file: &FileId, _status: FileStatus) -> SaveAnswer {
        SaveAnswer::Cancel
    }

    fn on_save_uncontrolled(&self, _file: &FileId) -> UncontrolledSaveAnswer {
        UncontrolledSaveAnswer::Skip
    }
}

/// A question put to the caller by [`AskCaller`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "question", rename_all = "snake_case")]
pub enum Prompt {
    CheckOutForEdit { file: FileId, status: FileStatus },
    MakeWritable { file: FileId },
    CheckOutForSave { file: FileId, status: FileStatus },
    SaveUncontrolled { file: FileId },
}

impl Prompt {
    pub fn file(&self) -> &FileId {
        match self {
            Self::CheckOutForEdit { file, .. }
            | Self::MakeWritable { file }
            | Self::CheckOutForSave { file, .. }
            | Self::SaveUncontrolled { file } => file,
        }
    }
}

impl fmt::Display for Prompt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CheckOutForEdit { file, status } => {
                write!(f, "{file} is read-only ({status}). Check it out to edit?")
            }
            Self::MakeWritable { file } => {
                write!(f, "{file} is read-only and not under version control. Make it writable?")
            }
            Self::CheckOutForSave { file, status } => {
                write!(f, "{file} is read-only ({status}). Check it out before saving?")
            }
            Self::SaveUncontrolled { file } => {
                write!(f, "{file} is read-only and not under version control. Overwrite it?")
            }
        }
    }
}

/// Any answer the caller of [`AskCaller`] may give.
///
/// An answer that does not fit the question is treated as the question's
/// most conservative choice (cancel, or skip for uncontrolled saves).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Answer {
    CheckOut,
    EditInMemory,
    MakeWritable,
    SaveAs,
    Skip,
    Cancel,
}

type AskFn = dyn Fn(&Prompt) -> Answer + Send + Sync;

/// Delegates every question to a caller-supplied closure.
pub struct AskCaller {
    ask: Box<AskFn>,
}

impl AskCaller {
    pub fn new(ask: impl Fn(&Prompt) -> Answer + Send + Sync + 'static) -> Self {
        Self { ask: Box::new(ask) }
    }
}

impl fmt::Debug for AskCaller {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AskCaller").finish_non_exhaustive()
    }
}

impl Decider for AskCaller {
    fn on_checkout_edit(&self, file: &FileId, status: FileStatus) -> EditAnswer {
        let prompt = Prompt::CheckOutForEdit {
            file: file.clone(),
            status,
        };
        match (self.ask)(&prompt) {
            Answer::CheckOut => EditAnswer::CheckOut,
            Answer::EditInMemory => EditAnswer::EditInMemory,
            _ => EditAnswer::Cancel,
        }
    }

    fn on_make_writable(&self, file: &FileId) -> WritableAnswer {
        match (self.ask)(&Prompt::MakeWritable { file: file.clone() }) {
            Answer::MakeWritable => WritableAnswer::MakeWritable,
            _ => WritableAnswer::Cancel,
        }
    }

    fn on_checkout_save(&self, file: &FileId, status: FileStatus) -> SaveAnswer {
        let prompt = Prompt::CheckOutForSave {
            file: file.clone(),
            status,
        };
        match (self.ask)(&prompt) {
            Answer::CheckOut => SaveAnswer::CheckOut,
            Answer::SaveAs => SaveAnswer::SaveAs,
            Answer::Skip => SaveAnswer::Skip,
            _ => SaveAnswer::Cancel,
        }
    }

    fn on_save_uncontrolled(&self, file: &FileId) -> UncontrolledSaveAnswer {
        match (self.ask)(&Prompt::SaveUncontrolled { file: file.clone() }) {
            Answer::MakeWritable => UncontrolledSaveAnswer::MakeWritable,
            _ => UncontrolledSaveAnswer::Skip,
        }
    }
}
