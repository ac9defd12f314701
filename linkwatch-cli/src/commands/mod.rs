pub mod clean;
pub mod files;
pub mod link;
pub mod links;

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Args;

use linkwatch_core::config::{self, Endpoint};
use linkwatch_core::{manifest, Manifest};

/// `--root`, shared by every command that works on an app directory.
#[derive(Args, Debug, Clone)]
pub struct RootArg {
    /// App directory (defaults to the current directory).
    #[arg(long, value_name = "DIR", default_value = ".")]
    pub root: PathBuf,
}

impl RootArg {
    /// Canonical root, so watcher paths and link roots compare cleanly.
    pub fn resolve(&self) -> Result<PathBuf> {
        std::fs::canonicalize(&self.root)
            .with_context(|| format!("app directory {} not found", self.root.display()))
    }
}

/// Load the manifest and refuse apps that need the legacy link flow.
pub fn load_manifest(root: &std::path::Path) -> Result<Manifest> {
    let manifest = manifest::load_at(root).context("failed to load app manifest")?;
    if manifest.requires_legacy_link() {
        bail!(
            "{} uses legacy builders, which linkwatch does not support",
            manifest.app_id()
        );
    }
    Ok(manifest)
}

/// Global config plus `LINKWATCH_*` overrides, checked for completeness.
pub fn endpoint() -> Result<Endpoint> {
    let home = dirs::home_dir().context("could not determine home directory")?;
    let global = config::load_global().context("failed to load global config")?;
    Ok(global.endpoint_at(&home)?)
}
