//! Domain types shared by every linkwatch crate.
//!
//! Remote paths (`Change::path`, `FileEntry::path`) are always `String`s in
//! forward-slash form; local filesystem paths are always `PathBuf`.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Reserved top-level directory under which linked dependencies are
/// presented to the build service.
pub const LINKED_DEPS_DIR: &str = ".linked_deps";

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// App locator in `vendor.name@version` form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AppId(pub String);

impl AppId {
    /// The part before `@`; the key the build event stream is scoped to.
    pub fn subject(&self) -> &str {
        self.0.split('@').next().unwrap_or(&self.0)
    }
}

impl fmt::Display for AppId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for AppId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for AppId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

// ---------------------------------------------------------------------------
// Wire structs
// ---------------------------------------------------------------------------

/// One incremental file mutation sent on relink.
///
/// `content` is the base64 file body; `None` (serialized as `null`) deletes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Change {
    pub path: String,
    pub content: Option<String>,
}

impl Change {
    pub fn update(path: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            content: Some(content.into()),
        }
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            content: None,
        }
    }

    pub fn is_delete(&self) -> bool {
        self.content.is_none()
    }
}

/// One file of the full snapshot sent on initial link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    pub path: String,
    pub content: String,
    /// Whether the file was pulled in from a linked dependency.
    #[serde(skip)]
    pub linked: bool,
}

// ---------------------------------------------------------------------------
// Link config
// ---------------------------------------------------------------------------

/// Resolved local dependency links for one initial-link cycle.
///
/// Immutable once built; a re-link builds a fresh one and replaces it whole.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkConfig {
    /// Dependency name → canonical absolute root.
    pub metadata: BTreeMap<String, PathBuf>,
    /// Dependency name → extra ignore patterns for that dependency's tree.
    pub ignores: BTreeMap<String, Vec<String>>,
}

impl LinkConfig {
    pub fn is_empty(&self) -> bool {
        self.metadata.is_empty()
    }

    pub fn len(&self) -> usize {
        self.metadata.len()
    }

    pub fn ignores_for(&self, name: &str) -> &[String] {
        self.ignores.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// The dependency whose root contains `path`, preferring the deepest root
    /// when links are nested.
    pub fn owner_of(&self, path: &Path) -> Option<(&str, &Path)> {
        self.metadata
            .iter()
            .filter(|(_, root)| path.starts_with(root))
            .max_by_key(|(_, root)| root.components().count())
            .map(|(name, root)| (name.as_str(), root.as_path()))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
