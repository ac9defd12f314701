//! Error types for linkwatch-core.

use std::path::PathBuf;

use thiserror::Error;

/// All errors that can arise while loading configuration or the app manifest.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Underlying I/O failure (permission denied, unreadable file, etc.).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization error (save path).
    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// YAML parse error on load; includes file path and line context from serde_yaml.
    #[error("failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// `manifest.json` is missing from the project root.
    #[error("manifest not found at {path}; is this an app directory?")]
    ManifestNotFound { path: PathBuf },

    /// `manifest.json` exists but is not valid.
    #[error("failed to parse manifest at {path}: {source}")]
    ManifestParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// The manifest parsed but lacks a field the app identity needs.
    #[error("manifest field `{field}` must not be empty")]
    InvalidManifest { field: &'static str },

    /// A required setting is absent from both the config file and the environment.
    #[error("missing required setting `{field}` (set it in {path} or via {env})")]
    Missing {
        field: &'static str,
        env: &'static str,
        path: PathBuf,
    },

    /// `dirs::home_dir()` returned `None`; cannot locate `~/.linkwatch/`.
    #[error("cannot determine home directory; set $HOME or equivalent")]
    HomeNotFound,
}
