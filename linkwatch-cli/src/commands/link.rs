//! `linkwatch link` — initial upload, then live sync until Ctrl-C.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use clap::Args;
use colored::Colorize;

use linkwatch_builder::{HttpBuildService, SseSubscriber};
use linkwatch_core::{config, AppId};
use linkwatch_session::{start_blocking, SessionError, SessionOptions, WatchSession};

use super::clean::clean_app;
use super::{endpoint, load_manifest, RootArg};

#[derive(Args, Debug)]
pub struct LinkArgs {
    #[command(flatten)]
    pub root: RootArg,

    /// Clean the remote build cache before linking.
    #[arg(long)]
    pub clean: bool,

    /// Quiet period before a batch of changes is sent, in milliseconds.
    #[arg(long, value_name = "MS")]
    pub debounce_ms: Option<u64>,

    /// Reconnect to the build event stream instead of stopping when it drops.
    #[arg(long)]
    pub reconnect: bool,
}

impl LinkArgs {
    pub fn run(self) -> Result<()> {
        let root = self.root.resolve()?;
        let manifest = load_manifest(&root)?;
        let app = manifest.app_id();
        let endpoint = endpoint()?;
        let project = config::load_project_at(&root).context("failed to load project config")?;

        println!(
            "Linking {} in {}/{}",
            app.to_string().cyan(),
            endpoint.account,
            endpoint.workspace
        );

        let service = Arc::new(HttpBuildService::new(endpoint.clone()));
        if self.clean {
            clean_app(service.as_ref(), &app)?;
        }
        let subscriber = Arc::new(
            SseSubscriber::new(endpoint.clone()).context("failed to set up build event client")?,
        );

        let mut options = SessionOptions::new(root, app.clone());
        if let Some(ms) = self.debounce_ms.or(project.debounce_ms) {
            options.quiet_period = Duration::from_millis(ms);
        }
        options.reconnect = self.reconnect || project.reconnect;

        let result = start_blocking(WatchSession::new(options, service, subscriber));
        println!("\n{}", dev_mode_notice(&app, &endpoint.workspace));
        result.map_err(explain)
    }
}

/// Printed on every exit: the app stays linked until explicitly unlinked.
fn dev_mode_notice(app: &AppId, workspace: &str) -> String {
    format!(
        "{} is still in development mode in workspace {}.\nYou can unlink it with: 'vtex unlink {}'",
        app.to_string().cyan(),
        workspace.yellow(),
        app
    )
}

/// Attach the known remedy, if any, to a session failure.
fn explain(err: SessionError) -> anyhow::Error {
    let hint = match &err {
        SessionError::Build(build) | SessionError::ListenerDisconnected(build) => {
            build.setup_hint()
        }
        _ => None,
    };
    match hint {
        Some(hint) => anyhow!("{err}\nhint: {hint}"),
        None => anyhow::Error::new(err).context("link session failed"),
    }
}
