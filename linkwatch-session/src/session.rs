use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use linkwatch_builder::host::{AVAILABILITY_TIMEOUT, SAMPLED_HOSTS};
use linkwatch_builder::{
    most_available_host, BuildError, BuildEvent, BuildEventKind, BuildService, EventHandlers,
    EventSubscriber, LinkOptions, ListenOptions, Subscription,
};
use linkwatch_core::config::load_project_at;
use linkwatch_core::{AppId, LinkConfig};
use linkwatch_fs::{build_snapshot, create_link_config, linked_rules, to_builder_path, IgnoreRules};
use tokio::sync::{broadcast, mpsc};
use tokio::time::Instant;

use crate::debounce::{default_quiet_period, Debounce};
use crate::error::{io_err, SessionError};
use crate::queue::{materialize, ChangeKind, ChangeQueue};
use crate::report::print_change;
use crate::watcher::{self, WatchEvent, WatchEventKind, WatcherHandle};

/// Event kinds the session reacts to; anything else hits the no-op default.
const HANDLED_EVENTS: [BuildEventKind; 5] = [
    BuildEventKind::BuildAccepted,
    BuildEventKind::BuildStarted,
    BuildEventKind::BuildSucceeded,
    BuildEventKind::BuildFailed,
    BuildEventKind::InitialLinkRequired,
];

#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Canonical app root.
    pub root: PathBuf,
    pub app: AppId,
    pub quiet_period: Duration,
    /// Keep the event stream alive across disconnects.
    pub reconnect: bool,
}

impl SessionOptions {
    pub fn new(root: PathBuf, app: AppId) -> Self {
        Self {
            root,
            app,
            quiet_period: default_quiet_period(),
            reconnect: false,
        }
    }
}

/// What a completed initial link leaves behind for the session.
#[derive(Debug)]
pub struct LinkOutcome {
    pub link_config: LinkConfig,
    /// Project rules first, then one per linked dependency.
    pub scopes: Vec<IgnoreRules>,
    pub files: usize,
    pub linked: usize,
}

/// Everything that reaches the coordinating loop from other tasks.
#[derive(Debug)]
pub(crate) enum SessionMessage {
    Build(BuildEvent),
    ListenerClosed(BuildError),
    LinkFinished(Result<LinkOutcome, SessionError>),
    RelinkFinished {
        changes: usize,
        result: Result<(), BuildError>,
    },
}

/// Enumerate, resolve links and upload the full file set.
///
/// Blocking; re-reads the project config and the disk on every call. An
/// answer other than acceptance is [`BuildError::Rejected`]; a build already
/// in progress is only a warning.
pub fn perform_initial_link(
    service: &dyn BuildService,
    root: &Path,
    app: &AppId,
) -> Result<LinkOutcome, SessionError> {
    let project = load_project_at(root)?;
    let rules = IgnoreRules::for_project(root, &project.ignore)?;
    let link_config = create_link_config(&project.links, root);
    let mut scopes = vec![rules.clone()];
    scopes.extend(linked_rules(&link_config)?);

    let sticky_hint = most_available_host(service, app, SAMPLED_HOSTS, AVAILABILITY_TIMEOUT);
    let snapshot = build_snapshot(root, &rules, &link_config)?;
    tracing::info!(
        files = snapshot.len(),
        linked = snapshot.linked,
        host = sticky_hint.as_deref().unwrap_or("any"),
        "sending files",
    );

    let options = LinkOptions {
        sticky: true,
        sticky_hint,
        timeout: None,
    };
    match service.link_app(app, &snapshot.files, &options) {
        Ok(response) if response.is_accepted() => {}
        Ok(response) => {
            return Err(BuildError::Rejected {
                code: response.code,
            }
            .into())
        }
        Err(err) if err.is_build_in_progress() => {
            tracing::warn!(%app, "build already in progress, a new one will follow");
        }
        Err(err) => return Err(err.into()),
    }

    Ok(LinkOutcome {
        link_config,
        scopes,
        files: snapshot.len(),
        linked: snapshot.linked,
    })
}

/// One live link session: watcher, queue, debounce and event subscription,
/// all owned by a single coordinating loop.
pub struct WatchSession {
    options: SessionOptions,
    service: Arc<dyn BuildService>,
    subscriber: Arc<dyn EventSubscriber>,
    queue: ChangeQueue,
    debounce: Debounce,
    link_config: Arc<LinkConfig>,
    debugger_started: bool,
    linking: bool,
    flush_after_link: bool,
    watcher: Option<WatcherHandle>,
    subscription: Option<Subscription>,
    tx: mpsc::UnboundedSender<SessionMessage>,
    messages: Option<mpsc::UnboundedReceiver<SessionMessage>>,
}

impl WatchSession {
    pub fn new(
        options: SessionOptions,
        service: Arc<dyn BuildService>,
        subscriber: Arc<dyn EventSubscriber>,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            options,
            service,
            subscriber,
            queue: ChangeQueue::new(),
            debounce: Debounce::default(),
            link_config: Arc::new(LinkConfig::default()),
            debugger_started: false,
            linking: false,
            flush_after_link: false,
            watcher: None,
            subscription: None,
            tx,
            messages: Some(rx),
        }
    }

    /// Subscribe, link, watch, then serve until `shutdown_rx` fires or a
    /// fatal error occurs. The subscription and watcher are released on
    /// every exit path.
    pub async fn run(mut self, mut shutdown_rx: broadcast::Receiver<()>) -> Result<(), SessionError> {
        let mut messages = self
            .messages
            .take()
            .ok_or(SessionError::ChannelClosed("session messages"))?;
        let result = self.start_and_serve(&mut messages, &mut shutdown_rx).await;
        self.teardown();
        result
    }

    async fn start_and_serve(
        &mut self,
        messages: &mut mpsc::UnboundedReceiver<SessionMessage>,
        shutdown_rx: &mut broadcast::Receiver<()>,
    ) -> Result<(), SessionError> {
        self.subscribe()?;

        self.linking = true;
        let link = link_blocking(
            self.service.clone(),
            self.options.root.clone(),
            self.options.app.clone(),
        );
        let outcome = tokio::select! {
            _ = shutdown_rx.recv() => return Ok(()),
            outcome = link => outcome,
        };
        self.linking = false;
        let outcome = outcome?;
        tracing::info!(files = outcome.files, linked = outcome.linked, "initial link accepted");

        let scopes = self.apply_link(outcome);
        let (watcher, events) = watcher::start(scopes)?;
        self.watcher = Some(watcher);
        tracing::info!(root = %self.options.root.display(), "watching for changes");

        self.run_loop(events, messages, shutdown_rx).await
    }

    async fn run_loop(
        &mut self,
        mut events: mpsc::UnboundedReceiver<WatchEvent>,
        messages: &mut mpsc::UnboundedReceiver<SessionMessage>,
        shutdown_rx: &mut broadcast::Receiver<()>,
    ) -> Result<(), SessionError> {
        loop {
            let deadline = self.debounce.deadline();
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    tracing::info!("stopping link session");
                    return Ok(());
                }
                event = events.recv() => {
                    let Some(event) = event else {
                        return Err(SessionError::ChannelClosed("watcher events"));
                    };
                    self.on_watch_event(event);
                }
                message = messages.recv() => {
                    let Some(message) = message else {
                        return Err(SessionError::ChannelClosed("session messages"));
                    };
                    self.on_message(message)?;
                }
                _ = wait_until(deadline) => self.on_quiet_period_elapsed(),
            }
        }
    }

    fn subscribe(&mut self) -> Result<(), SessionError> {
        let mut handlers = EventHandlers::new();
        for kind in HANDLED_EVENTS {
            let tx = self.tx.clone();
            handlers = handlers.on(kind, move |event| {
                let _ = tx.send(SessionMessage::Build(event.clone()));
            });
        }
        let tx = self.tx.clone();
        handlers = handlers.on_disconnect(move |err| {
            let _ = tx.send(SessionMessage::ListenerClosed(err));
        });

        let options = ListenOptions {
            reconnect: self.options.reconnect,
        };
        let subscription = self
            .subscriber
            .subscribe(self.options.app.subject(), handlers, options)?;
        self.subscription = Some(subscription);
        Ok(())
    }

    fn apply_link(&mut self, outcome: LinkOutcome) -> Vec<IgnoreRules> {
        self.link_config = Arc::new(outcome.link_config);
        outcome.scopes
    }

    fn on_watch_event(&mut self, event: WatchEvent) {
        let Some(kind) = change_kind(&event) else {
            return;
        };
        let Some(remote) = to_builder_path(&event.path, &self.options.root, &self.link_config)
        else {
            return;
        };
        print_change(kind, &remote);
        self.queue.enqueue(event.path, kind);
        self.debounce.arm(Instant::now(), self.options.quiet_period);
    }

    fn on_quiet_period_elapsed(&mut self) {
        if !self.debounce.fire(Instant::now()) {
            return;
        }
        if self.linking {
            tracing::debug!(pending = self.queue.len(), "initial link in flight, holding changes");
            self.flush_after_link = true;
            return;
        }
        self.flush();
    }

    /// Drain the queue and send it on a blocking task; the outcome comes
    /// back as [`SessionMessage::RelinkFinished`].
    fn flush(&mut self) {
        let pending = self.queue.drain();
        if pending.is_empty() {
            return;
        }
        let service = self.service.clone();
        let app = self.options.app.clone();
        let root = self.options.root.clone();
        let link_config = self.link_config.clone();
        let tx = self.tx.clone();
        tokio::task::spawn_blocking(move || {
            let changes = materialize(&pending, &root, &link_config);
            if changes.is_empty() {
                return;
            }
            tracing::info!(changes = changes.len(), "sending changes");
            let result = service.relink_app(&app, &changes);
            let _ = tx.send(SessionMessage::RelinkFinished {
                changes: changes.len(),
                result,
            });
        });
    }

    fn on_message(&mut self, message: SessionMessage) -> Result<(), SessionError> {
        match message {
            SessionMessage::Build(event) => self.on_build_event(event),
            SessionMessage::ListenerClosed(err) => {
                return Err(SessionError::ListenerDisconnected(err));
            }
            SessionMessage::LinkFinished(result) => self.on_link_finished(result)?,
            SessionMessage::RelinkFinished { changes, result } => {
                self.on_relink_finished(changes, result)
            }
        }
        Ok(())
    }

    fn on_build_event(&mut self, event: BuildEvent) {
        match &event.kind {
            BuildEventKind::InitialLinkRequired => {
                tracing::warn!("initial link requested by builder");
                self.start_initial_link();
            }
            BuildEventKind::BuildSucceeded => {
                tracing::info!(app = %self.options.app, "build finished");
                if !self.debugger_started {
                    self.debugger_started = true;
                    tracing::debug!("debugger session marked as started");
                }
            }
            BuildEventKind::BuildFailed => {
                tracing::error!(
                    app = %self.options.app,
                    reason = event.message().unwrap_or("no details"),
                    "build failed",
                );
            }
            BuildEventKind::BuildAccepted | BuildEventKind::BuildStarted => {
                tracing::debug!(kind = %event.kind, "build event");
            }
            BuildEventKind::Unknown(_) => {}
        }
    }

    fn on_link_finished(
        &mut self,
        result: Result<LinkOutcome, SessionError>,
    ) -> Result<(), SessionError> {
        self.linking = false;
        match result {
            Ok(outcome) => {
                tracing::info!(files = outcome.files, linked = outcome.linked, "initial link accepted");
                let scopes = self.apply_link(outcome);
                if let Some(watcher) = self.watcher.as_mut() {
                    if let Err(err) = watcher.set_scopes(scopes) {
                        tracing::error!(error = %err, "could not update watched roots");
                    }
                }
            }
            Err(err) if err.is_fatal() => return Err(err),
            Err(err) => tracing::error!(error = %err, "initial link failed"),
        }
        if std::mem::take(&mut self.flush_after_link) {
            self.flush();
        }
        Ok(())
    }

    fn on_relink_finished(&mut self, changes: usize, result: Result<(), BuildError>) {
        match result {
            Ok(()) => tracing::debug!(changes, "changes sent"),
            Err(err) if err.is_initial_link_required() => {
                tracing::warn!("initial link requested by builder");
                self.start_initial_link();
            }
            Err(err) if err.is_build_in_progress() => {
                tracing::warn!(changes, "build already in progress");
            }
            Err(err) => tracing::error!(error = %err, changes, "failed to send changes"),
        }
    }

    /// Re-run the initial link in the background; a no-op while one is
    /// already running.
    fn start_initial_link(&mut self) {
        if self.linking {
            tracing::debug!("initial link already in progress");
            return;
        }
        self.linking = true;
        let link = link_blocking(
            self.service.clone(),
            self.options.root.clone(),
            self.options.app.clone(),
        );
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let _ = tx.send(SessionMessage::LinkFinished(link.await));
        });
    }

    fn teardown(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            subscription.unsubscribe();
        }
        if self.watcher.take().is_some() {
            tracing::debug!("watcher stopped");
        }
    }
}

/// How a watcher event maps onto the queue; `None` means ignore it.
///
/// A new empty file is not worth sending; an existing file truncated to
/// zero bytes is treated as deleted.
fn change_kind(event: &WatchEvent) -> Option<ChangeKind> {
    match event.kind {
        WatchEventKind::Add if event.size == 0 => None,
        WatchEventKind::Change if event.size == 0 => Some(ChangeKind::Delete),
        WatchEventKind::Add | WatchEventKind::Change => Some(ChangeKind::Update),
        WatchEventKind::Unlink => Some(ChangeKind::Delete),
    }
}

async fn link_blocking(
    service: Arc<dyn BuildService>,
    root: PathBuf,
    app: AppId,
) -> Result<LinkOutcome, SessionError> {
    tokio::task::spawn_blocking(move || perform_initial_link(service.as_ref(), &root, &app))
        .await
        .map_err(|err| SessionError::Protocol(format!("initial link join error: {err}")))?
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

/// Run `session` until it fails or the user presses Ctrl-C.
pub async fn run_until_interrupted(session: WatchSession) -> Result<(), SessionError> {
    let (shutdown_tx, _) = broadcast::channel::<()>(4);

    let session_handle = {
        let shutdown = shutdown_tx.clone();
        let shutdown_rx = shutdown.subscribe();
        tokio::spawn(async move {
            let result = session.run(shutdown_rx).await;
            let _ = shutdown.send(());
            result
        })
    };

    let signal_handle = {
        let shutdown = shutdown_tx.clone();
        let mut shutdown_rx = shutdown.subscribe();
        tokio::spawn(async move {
            tokio::select! {
                _ = shutdown_rx.recv() => Ok(()),
                signal = tokio::signal::ctrl_c() => {
                    let _ = shutdown.send(());
                    match signal {
                        Ok(()) => {
                            tracing::info!("received ctrl-c, unlinking");
                            Ok(())
                        }
                        Err(err) => Err(SessionError::Protocol(format!("ctrl-c handler failed: {err}"))),
                    }
                }
            }
        })
    };

    let (session_result, signal_result) = tokio::join!(session_handle, signal_handle);
    handle_join("session", session_result)?;
    handle_join("signal_handler", signal_result)?;
    Ok(())
}

/// How long in-flight link and relink calls get once the session has ended.
const SHUTDOWN_GRACE: Duration = Duration::from_millis(500);

/// Build a runtime and block the current thread on [`run_until_interrupted`].
pub fn start_blocking(session: WatchSession) -> Result<(), SessionError> {
    block_on_session(run_until_interrupted(session))
}

/// Drive `session` to completion, then shut the runtime down without waiting
/// on blocking network calls past [`SHUTDOWN_GRACE`].
fn block_on_session(
    session: impl std::future::Future<Output = Result<(), SessionError>>,
) -> Result<(), SessionError> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| io_err("tokio-runtime", e))?;
    let result = runtime.block_on(session);
    runtime.shutdown_timeout(SHUTDOWN_GRACE);
    result
}

fn handle_join(
    task: &str,
    result: Result<Result<(), SessionError>, tokio::task::JoinError>,
) -> Result<(), SessionError> {
    match result {
        Ok(inner) => inner,
        Err(err) => Err(SessionError::Protocol(format!(
            "{task} task join failure: {err}"
        ))),
    }
}

/// Install the global `tracing` subscriber on stderr. `RUST_LOG` wins over `verbose`.
pub fn init_tracing(verbose: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
