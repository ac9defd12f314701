//! `linkwatch files` — dry run of what an initial link would upload.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use linkwatch_core::config;
use linkwatch_fs::{build_snapshot, create_link_config, IgnoreRules};

use super::RootArg;

#[derive(Args, Debug)]
pub struct FilesArgs {
    #[command(flatten)]
    pub root: RootArg,

    /// Emit the path list as a JSON array.
    #[arg(long)]
    pub json: bool,
}

impl FilesArgs {
    pub fn run(self) -> Result<()> {
        let root = self.root.resolve()?;
        let project = config::load_project_at(&root).context("failed to load project config")?;
        let rules = IgnoreRules::for_project(&root, &project.ignore)
            .context("invalid ignore patterns")?;
        let link_config = create_link_config(&project.links, &root);
        let snapshot = build_snapshot(&root, &rules, &link_config)
            .with_context(|| format!("failed to read {}", root.display()))?;

        if self.json {
            let paths: Vec<&str> = snapshot.paths().collect();
            println!(
                "{}",
                serde_json::to_string(&paths).context("failed to render file list")?
            );
            return Ok(());
        }

        for file in &snapshot.files {
            if file.linked {
                println!("{}", file.path.dimmed());
            } else {
                println!("{}", file.path);
            }
        }
        println!(
            "\n{} files ({} from linked dependencies)",
            snapshot.len().to_string().bold(),
            snapshot.linked
        );
        Ok(())
    }
}
