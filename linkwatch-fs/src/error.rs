//! Error types for linkwatch-fs.

use std::path::PathBuf;

use thiserror::Error;

/// All errors that can arise while reading the local tree.
#[derive(Debug, Error)]
pub enum FsError {
    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The directory walker failed (permission denied mid-walk, loop, ...).
    #[error("walk error: {0}")]
    Walk(#[from] ignore::Error),

    /// An ignore pattern could not be compiled.
    #[error("invalid ignore pattern `{pattern}`: {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: ignore::Error,
    },

    /// The enumeration root exists but is not a directory.
    #[error("not a directory: {path}")]
    NotADirectory { path: PathBuf },
}

/// Convenience constructor for [`FsError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> FsError {
    FsError::Io {
        path: path.into(),
        source,
    }
}
