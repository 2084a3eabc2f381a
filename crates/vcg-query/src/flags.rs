//! Request flags and per-file info flags.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    /// How a query-edit request may interact with the user.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct QueryEditFlags: u8 {
        /// Only report what would happen; never prompt or change anything.
        const REPORT_ONLY = 1 << 0;
        /// Never prompt; take the quiet default.
        const SILENT = 1 << 1;
    }
}

bitflags! {
    /// How a query-save request may interact with the user.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct QuerySaveFlags: u8 {
        /// Never prompt; take the quiet default.
        const SILENT = 1 << 0;
    }
}

bitflags! {
    /// Why a query-edit answer came out the way it did.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct EditInfo: u8 {
        /// Edit allowed in memory only; the file stays read-only on disk.
        const IN_MEMORY_EDIT = 1 << 0;
        const READ_ONLY_UNDER_CONTROL = 1 << 1;
        const READ_ONLY_NOT_UNDER_CONTROL = 1 << 2;
        /// A prompt was needed but the request was silent.
        const NOISY_PROMPT_REQUIRED = 1 << 3;
        const CANCELED = 1 << 4;
        /// The read-only bit was cleared without a checkout.
        const MADE_WRITABLE = 1 << 5;
    }
}
