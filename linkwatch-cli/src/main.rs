//! linkwatch — live-link a local app to a remote build service.
//!
//! # Usage
//!
//! ```text
//! linkwatch link [--root DIR] [--clean] [--debounce-ms N] [--reconnect]
//! linkwatch clean [--root DIR]
//! linkwatch files [--root DIR] [--json]
//! linkwatch links list|add|remove
//! ```

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{clean::CleanArgs, files::FilesArgs, link::LinkArgs, links::LinksCommand};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "linkwatch",
    version,
    about = "Stream local app changes to a remote build service",
    long_about = None,
)]
struct Cli {
    /// Show debug logs (RUST_LOG overrides).
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Upload the app, then keep the build service in sync until Ctrl-C.
    Link(LinkArgs),

    /// Drop the build service's cache for this app.
    Clean(CleanArgs),

    /// List the files a link would send, without touching the network.
    Files(FilesArgs),

    /// Manage local dependencies linked into this app.
    Links {
        #[command(subcommand)]
        command: LinksCommand,
    },
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let cli = Cli::parse();
    linkwatch_session::init_tracing(cli.verbose);
    match cli.command {
        Commands::Link(args) => args.run(),
        Commands::Clean(args) => args.run(),
        Commands::Files(args) => args.run(),
        Commands::Links { command } => commands::links::run(command),
    }
}
