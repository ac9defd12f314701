//! `linkwatch clean` — drop the remote build cache.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use linkwatch_builder::protocol::format_nanos;
use linkwatch_builder::{BuildService, HttpBuildService};
use linkwatch_core::AppId;

use super::{endpoint, load_manifest, RootArg};

#[derive(Args, Debug)]
pub struct CleanArgs {
    #[command(flatten)]
    pub root: RootArg,
}

impl CleanArgs {
    pub fn run(self) -> Result<()> {
        let root = self.root.resolve()?;
        let app = load_manifest(&root)?.app_id();
        let service = HttpBuildService::new(endpoint()?);
        clean_app(&service, &app)
    }
}

/// Shared with `link --clean`.
pub fn clean_app(service: &dyn BuildService, app: &AppId) -> Result<()> {
    println!("Cleaning cache for {}", app.to_string().cyan());
    let response = service
        .clean(app)
        .with_context(|| format!("failed to clean cache for {app}"))?;
    println!(
        "{} cache cleaned in {}",
        "✓".green(),
        format_nanos(response.time_nano)
    );
    Ok(())
}
