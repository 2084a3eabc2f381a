/// Errors produced when constructing or parsing foundation types.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TypeError {
    /// A file identity was built from an empty or blank path.
    #[error("empty file path")]
    EmptyPath,

    /// The operation name is not an eligibility column.
    #[error("unknown operation: {0}")]
    UnknownOperation(String),

    /// The command name is not a known backend command.
    #[error("unknown command: {0}")]
    UnknownCommand(String),
}
