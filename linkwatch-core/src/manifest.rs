//! `manifest.json` — the app's identity and declared builders.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::types::AppId;

pub const MANIFEST_FILE: &str = "manifest.json";

/// Builders that only the legacy link flow knows how to handle.
const LEGACY_BUILDERS: &[&str] = &["render", "functions-ts"];

/// The subset of the app manifest linkwatch reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub vendor: String,
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub builders: BTreeMap<String, String>,
    #[serde(default)]
    pub dependencies: BTreeMap<String, String>,
}

impl Manifest {
    /// `vendor.name@version`.
    pub fn app_id(&self) -> AppId {
        AppId(format!("{}.{}@{}", self.vendor, self.name, self.version))
    }

    /// Whether this app must go through the legacy link flow instead.
    pub fn requires_legacy_link(&self) -> bool {
        self.name == "builder-hub"
            || LEGACY_BUILDERS
                .iter()
                .any(|builder| self.builders.contains_key(*builder))
    }

    fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("vendor", &self.vendor),
            ("name", &self.name),
            ("version", &self.version),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::InvalidManifest { field });
            }
        }
        Ok(())
    }
}

/// `<root>/manifest.json`: pure, no I/O.
pub fn manifest_path(root: &Path) -> PathBuf {
    root.join(MANIFEST_FILE)
}

/// Load and validate `<root>/manifest.json`.
pub fn load_at(root: &Path) -> Result<Manifest, ConfigError> {
    let path = manifest_path(root);
    if !path.exists() {
        return Err(ConfigError::ManifestNotFound { path });
    }
    let contents = std::fs::read_to_string(&path)?;
    let manifest: Manifest = serde_json::from_str(&contents)
        .map_err(|e| ConfigError::ManifestParse { path, source: e })?;
    manifest.validate()?;
    Ok(manifest)
}
