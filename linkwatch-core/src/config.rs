//! Global and per-project configuration.
//!
//! # Storage layout
//!
//! ```text
//! ~/.linkwatch/
//!   config.yaml        (account, workspace, token, service URLs, mode 0600)
//! <app root>/
//!   .linkwatch.yaml    (linked dependencies, extra ignores, debounce)
//! ```
//!
//! # API pattern
//!
//! As with every path-rooted function in this workspace:
//! - `fn_at(home: &Path, …)`: explicit home; used in tests with `TempDir`
//! - `fn(…)`: derives home from `dirs::home_dir()`, delegates to `_at`
//!
//! Tests must NEVER call the no-arg wrappers; always use `_at`.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub const PROJECT_CONFIG_FILE: &str = ".linkwatch.yaml";

const DEFAULT_TIMEOUT_MS: u64 = 60_000;

// ---------------------------------------------------------------------------
// 1. Global config
// ---------------------------------------------------------------------------

/// Account-wide settings: who we are and where the build service lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspace: Option<String>,
    /// Bearer token; obtaining it is someone else's job.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub builder_url: Option<String>,
    /// Push-event endpoint; falls back to `builder_url` when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub events_url: Option<String>,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            account: None,
            workspace: None,
            token: None,
            builder_url: None,
            events_url: None,
            timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }
}

/// Fully-resolved endpoint settings, produced by [`GlobalConfig::endpoint_at`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub account: String,
    pub workspace: String,
    pub token: Option<String>,
    pub builder_url: String,
    pub events_url: String,
    pub timeout_ms: u64,
}

impl GlobalConfig {
    /// Overlay `LINKWATCH_*` variables from `lookup` on top of file values.
    pub fn apply_env(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let overlay = |slot: &mut Option<String>, key: &str| {
            if let Some(value) = lookup(key).filter(|v| !v.is_empty()) {
                *slot = Some(value);
            }
        };
        overlay(&mut self.account, "LINKWATCH_ACCOUNT");
        overlay(&mut self.workspace, "LINKWATCH_WORKSPACE");
        overlay(&mut self.token, "LINKWATCH_TOKEN");
        overlay(&mut self.builder_url, "LINKWATCH_BUILDER_URL");
        overlay(&mut self.events_url, "LINKWATCH_EVENTS_URL");
        self
    }

    /// Check that everything a network session needs is present.
    ///
    /// `home` is only used to point the error message at the right file.
    pub fn endpoint_at(&self, home: &Path) -> Result<Endpoint, ConfigError> {
        let path = global_config_path_at(home);
        let require = |value: &Option<String>, field, env| {
            value.clone().ok_or_else(|| ConfigError::Missing {
                field,
                env,
                path: path.clone(),
            })
        };
        let account = require(&self.account, "account", "LINKWATCH_ACCOUNT")?;
        let workspace = require(&self.workspace, "workspace", "LINKWATCH_WORKSPACE")?;
        let builder_url = require(&self.builder_url, "builder_url", "LINKWATCH_BUILDER_URL")?;
        let events_url = self
            .events_url
            .clone()
            .unwrap_or_else(|| builder_url.clone());

        Ok(Endpoint {
            account,
            workspace,
            token: self.token.clone(),
            builder_url: builder_url.trim_end_matches('/').to_string(),
            events_url: events_url.trim_end_matches('/').to_string(),
            timeout_ms: self.timeout_ms,
        })
    }
}

/// `<home>/.linkwatch/config.yaml`: pure, no I/O.
pub fn global_config_path_at(home: &Path) -> PathBuf {
    home.join(".linkwatch").join("config.yaml")
}

/// Load `<home>/.linkwatch/config.yaml`. A missing file yields defaults.
pub fn load_global_at(home: &Path) -> Result<GlobalConfig, ConfigError> {
    let path = global_config_path_at(home);
    if !path.exists() {
        return Ok(GlobalConfig::default());
    }
    let contents = std::fs::read_to_string(&path)?;
    serde_yaml::from_str(&contents).map_err(|e| ConfigError::Parse { path, source: e })
}

/// `load_global_at` convenience wrapper, with the process environment applied.
pub fn load_global() -> Result<GlobalConfig, ConfigError> {
    Ok(load_global_at(&home()?)?.apply_env(|key| std::env::var(key).ok()))
}

/// Save `<home>/.linkwatch/config.yaml` atomically (mode `0600`, it may hold a token).
pub fn save_global_at(home: &Path, config: &GlobalConfig) -> Result<(), ConfigError> {
    let path = global_config_path_at(home);
    let yaml = serde_yaml::to_string(config)?;
    atomic_write(&path, &yaml)?;
    set_file_permissions(&path)?;
    Ok(())
}

// ---------------------------------------------------------------------------
// 2. Project config
// ---------------------------------------------------------------------------

/// A local package that should replace its fetched counterpart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkDeclaration {
    pub name: String,
    pub path: PathBuf,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ignore: Vec<String>,
}

/// Per-app settings read from `<root>/.linkwatch.yaml`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ProjectConfig {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub links: Vec<LinkDeclaration>,
    /// Extra gitignore-style patterns applied on top of the built-in defaults.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ignore: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub debounce_ms: Option<u64>,
    /// Keep the build event stream alive across drops instead of failing the session.
    #[serde(default)]
    pub reconnect: bool,
}

impl ProjectConfig {
    /// Insert `link`, replacing any declaration with the same name.
    pub fn add_link(&mut self, link: LinkDeclaration) {
        match self.links.iter_mut().find(|l| l.name == link.name) {
            Some(existing) => *existing = link,
            None => self.links.push(link),
        }
        self.links.sort_by(|a, b| a.name.cmp(&b.name));
    }

    /// Remove the declaration named `name`; returns whether one existed.
    pub fn remove_link(&mut self, name: &str) -> bool {
        let before = self.links.len();
        self.links.retain(|l| l.name != name);
        self.links.len() != before
    }
}

/// `<root>/.linkwatch.yaml`: pure, no I/O.
pub fn project_config_path(root: &Path) -> PathBuf {
    root.join(PROJECT_CONFIG_FILE)
}

/// Load the project config. A missing file yields an empty config.
pub fn load_project_at(root: &Path) -> Result<ProjectConfig, ConfigError> {
    let path = project_config_path(root);
    if !path.exists() {
        return Ok(ProjectConfig::default());
    }
    let contents = std::fs::read_to_string(&path)?;
    serde_yaml::from_str(&contents).map_err(|e| ConfigError::Parse { path, source: e })
}

/// Save the project config atomically.
pub fn save_project_at(root: &Path, config: &ProjectConfig) -> Result<(), ConfigError> {
    let yaml = serde_yaml::to_string(config)?;
    atomic_write(&project_config_path(root), &yaml)
}

// ---------------------------------------------------------------------------
// 3. Helpers
// ---------------------------------------------------------------------------

fn atomic_write(path: &Path, contents: &str) -> Result<(), ConfigError> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    let tmp = path.with_extension("yaml.tmp");
    std::fs::write(&tmp, contents)?;
    if let Err(e) = std::fs::rename(&tmp, path) {
        let _ = std::fs::remove_file(&tmp);
        return Err(e.into());
    }
    Ok(())
}

fn home() -> Result<PathBuf, ConfigError> {
    dirs::home_dir().ok_or(ConfigError::HomeNotFound)
}

#[cfg(unix)]
fn set_file_permissions(path: &Path) -> Result<(), ConfigError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    Ok(())
}

#[cfg(not(unix))]
fn set_file_permissions(_path: &Path) -> Result<(), ConfigError> {
    Ok(())
}
