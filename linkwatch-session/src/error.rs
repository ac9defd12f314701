use std::path::PathBuf;

use linkwatch_builder::BuildError;
use thiserror::Error;

/// Error surface for a link session: setup, watcher and remote failures.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("watcher error: {0}")]
    Notify(#[from] notify::Error),

    #[error("configuration error: {0}")]
    Config(#[from] linkwatch_core::ConfigError),

    #[error("file error: {0}")]
    Fs(#[from] linkwatch_fs::FsError),

    #[error(transparent)]
    Build(#[from] BuildError),

    #[error("channel closed: {0}")]
    ChannelClosed(&'static str),

    #[error("session error: {0}")]
    Protocol(String),

    #[error("lost connection to the build event stream: {0}")]
    ListenerDisconnected(#[source] BuildError),
}

impl SessionError {
    /// Errors after which the session must stop instead of logging and
    /// carrying on.
    pub fn is_fatal(&self) -> bool {
        match self {
            SessionError::Build(err) => {
                matches!(err, BuildError::Rejected { .. }) || err.setup_hint().is_some()
            }
            SessionError::ListenerDisconnected(_) | SessionError::ChannelClosed(_) => true,
            _ => false,
        }
    }
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> SessionError {
    SessionError::Io {
        path: path.into(),
        source,
    }
}
