//! Linkwatch core library — domain types, configuration, manifest and errors.
//!
//! Public API surface:
//! - [`types`]: newtypes and the change / snapshot / link-config structs
//! - [`error`]: [`ConfigError`]
//! - [`config`]: global and per-project configuration (load / save)
//! - [`manifest`]: `manifest.json` loading and app identity

pub mod config;
pub mod error;
pub mod manifest;
pub mod types;

pub use config::{GlobalConfig, LinkDeclaration, ProjectConfig};
pub use error::ConfigError;
pub use manifest::Manifest;
pub use types::{AppId, Change, FileEntry, LinkConfig, LINKED_DEPS_DIR};
