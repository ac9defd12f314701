//! `linkwatch links list|add|remove` — linked dependencies in `.linkwatch.yaml`.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Args, Subcommand};
use colored::Colorize;
use tabled::{settings::Style, Table, Tabled};

use linkwatch_core::config::{self, LinkDeclaration};
use linkwatch_fs::create_link_config;

use super::RootArg;

#[derive(Subcommand, Debug)]
pub enum LinksCommand {
    /// Show declared links and whether each resolves to a package.
    List(ListArgs),

    /// Declare (or replace) a linked dependency.
    Add(AddArgs),

    /// Remove a linked dependency.
    Remove(RemoveArgs),
}

#[derive(Args, Debug)]
pub struct ListArgs {
    #[command(flatten)]
    pub root: RootArg,
}

#[derive(Args, Debug)]
pub struct AddArgs {
    /// Dependency name as the build service knows it (e.g. "vtex.store-components").
    pub name: String,

    /// Package directory; relative paths are resolved against the app root.
    pub path: PathBuf,

    /// Extra ignore pattern for this dependency; repeatable.
    #[arg(long = "ignore", value_name = "PATTERN")]
    pub ignore: Vec<String>,

    #[command(flatten)]
    pub root: RootArg,
}

#[derive(Args, Debug)]
pub struct RemoveArgs {
    pub name: String,

    #[command(flatten)]
    pub root: RootArg,
}

pub fn run(command: LinksCommand) -> Result<()> {
    match command {
        LinksCommand::List(args) => list(args),
        LinksCommand::Add(args) => add(args),
        LinksCommand::Remove(args) => remove(args),
    }
}

#[derive(Tabled)]
struct LinkRow {
    #[tabled(rename = "name")]
    name: String,
    #[tabled(rename = "path")]
    path: String,
    #[tabled(rename = "ignore")]
    ignore: String,
    #[tabled(rename = "status")]
    status: String,
}

fn list(args: ListArgs) -> Result<()> {
    let root = args.root.resolve()?;
    let project = config::load_project_at(&root).context("failed to load project config")?;

    if project.links.is_empty() {
        println!("No linked dependencies.");
        println!("Run: linkwatch links add <name> <path>");
        return Ok(());
    }

    let resolved = create_link_config(&project.links, &root);
    let rows: Vec<LinkRow> = project
        .links
        .iter()
        .map(|link| LinkRow {
            name: link.name.clone(),
            path: link.path.display().to_string(),
            ignore: link.ignore.join(", "),
            status: match resolved.metadata.get(&link.name) {
                Some(_) => "ok".green().to_string(),
                None => "invalid".red().to_string(),
            },
        })
        .collect();

    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");
    Ok(())
}

fn add(args: AddArgs) -> Result<()> {
    let root = args.root.resolve()?;
    let link = LinkDeclaration {
        name: args.name,
        path: args.path,
        ignore: args.ignore,
    };

    if create_link_config(std::slice::from_ref(&link), &root).is_empty() {
        bail!(
            "{} is not a package directory (needs package.json or manifest.json)",
            link.path.display()
        );
    }

    let mut project = config::load_project_at(&root).context("failed to load project config")?;
    let name = link.name.clone();
    project.add_link(link);
    config::save_project_at(&root, &project).context("failed to save project config")?;

    println!("{} Linked '{}'", "✓".green(), name);
    Ok(())
}

fn remove(args: RemoveArgs) -> Result<()> {
    let root = args.root.resolve()?;
    let mut project = config::load_project_at(&root).context("failed to load project config")?;
    if !project.remove_link(&args.name) {
        bail!("no linked dependency named '{}'", args.name);
    }
    config::save_project_at(&root, &project).context("failed to save project config")?;

    println!("{} Removed '{}'", "✓".green(), args.name);
    Ok(())
}
