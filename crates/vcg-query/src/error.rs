use thiserror::Error;
use vcg_types::FileId;

/// Errors raised while evaluating a query.
///
/// A per-file error never aborts a query; it turns that file's answer into a
/// deny (edit) or cancel (save) and is kept on the file's result.
#[derive(Debug, Error)]
pub enum QueryError {
    /// The workspace file system failed for one file.
    #[error("{file}: {source}")]
    Fs {
        file: FileId,
        #[source]
        source: std::io::Error,
    },
}

impl QueryError {
    pub(crate) fn fs(file: &FileId, source: std::io::Error) -> Self {
        Self::Fs {
            file: file.clone(),
            source,
        }
    }
}
