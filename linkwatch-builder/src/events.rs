//! Build event listener.
//!
//! The build service pushes lifecycle events for an app over a long-lived
//! server-sent-events connection. Each message is dispatched to a handler
//! table keyed by [`BuildEventKind`]; kinds without a handler fall through to
//! a no-op.
//!
//! Failure policy:
//! - a message that fails to parse is logged and skipped;
//! - a dropped connection ends the subscription and is reported through
//!   [`EventHandlers::on_disconnect`], unless [`ListenOptions::reconnect`] is set.

use std::collections::HashMap;
use std::fmt;

use futures::StreamExt;
use linkwatch_core::config::Endpoint;
use reqwest_eventsource::{retry::Never, Event, EventSource};
use serde_json::Value;
use tokio::task::JoinHandle;

use crate::error::BuildError;
use crate::protocol::{events_url, remote_error, INITIAL_LINK_REQUIRED};

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum BuildEventKind {
    BuildAccepted,
    BuildStarted,
    BuildSucceeded,
    BuildFailed,
    InitialLinkRequired,
    Unknown(String),
}

impl BuildEventKind {
    /// Accepts both `build.accepted` and `build_accepted` spellings.
    pub fn parse(raw: &str) -> Self {
        match raw.replace('.', "_").as_str() {
            "build_accepted" => Self::BuildAccepted,
            "build_started" | "build_start" => Self::BuildStarted,
            "build_succeeded" | "build_success" => Self::BuildSucceeded,
            "build_failed" | "build_fail" => Self::BuildFailed,
            INITIAL_LINK_REQUIRED => Self::InitialLinkRequired,
            _ => Self::Unknown(raw.to_string()),
        }
    }
}

impl fmt::Display for BuildEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BuildAccepted => write!(f, "build_accepted"),
            Self::BuildStarted => write!(f, "build_started"),
            Self::BuildSucceeded => write!(f, "build_succeeded"),
            Self::BuildFailed => write!(f, "build_failed"),
            Self::InitialLinkRequired => write!(f, "initial_link_required"),
            Self::Unknown(raw) => write!(f, "unknown({raw})"),
        }
    }
}

/// One notification from the stream; the payload is opaque to the listener.
#[derive(Debug, Clone, PartialEq)]
pub struct BuildEvent {
    pub kind: BuildEventKind,
    pub payload: Value,
}

impl BuildEvent {
    pub fn new(kind: BuildEventKind, payload: Value) -> Self {
        Self { kind, payload }
    }

    /// Decode one SSE message.
    ///
    /// A named SSE event (`event: build_failed`) gives the kind; for unnamed
    /// (`message`) events the JSON body's `code` field does.
    pub fn from_sse(event_name: &str, data: &str) -> Result<Self, serde_json::Error> {
        let payload: Value = serde_json::from_str(data)?;
        let kind = if !event_name.is_empty() && event_name != "message" {
            BuildEventKind::parse(event_name)
        } else {
            payload
                .get("code")
                .and_then(Value::as_str)
                .map(BuildEventKind::parse)
                .unwrap_or_else(|| BuildEventKind::Unknown(String::new()))
        };
        Ok(Self { kind, payload })
    }

    /// Human message carried in the payload, if the service sent one.
    pub fn message(&self) -> Option<&str> {
        self.payload.get("message").and_then(Value::as_str)
    }
}

// ---------------------------------------------------------------------------
// Handler table
// ---------------------------------------------------------------------------

type Handler = Box<dyn Fn(&BuildEvent) + Send + Sync>;
type DisconnectHandler = Box<dyn FnOnce(BuildError) + Send>;

/// Caller-supplied reactions, keyed by event kind.
#[derive(Default)]
pub struct EventHandlers {
    handlers: HashMap<BuildEventKind, Handler>,
    on_disconnect: Option<DisconnectHandler>,
}

impl EventHandlers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the reaction to `kind`, replacing any earlier one.
    pub fn on(
        mut self,
        kind: BuildEventKind,
        handler: impl Fn(&BuildEvent) + Send + Sync + 'static,
    ) -> Self {
        self.handlers.insert(kind, Box::new(handler));
        self
    }

    /// Called once if the stream ends for good.
    pub fn on_disconnect(mut self, handler: impl FnOnce(BuildError) + Send + 'static) -> Self {
        self.on_disconnect = Some(Box::new(handler));
        self
    }

    /// Run the handler for `event.kind`; `false` if none was registered.
    pub fn dispatch(&self, event: &BuildEvent) -> bool {
        match self.handlers.get(&event.kind) {
            Some(handler) => {
                handler(event);
                true
            }
            None => false,
        }
    }

    fn disconnected(&mut self, err: BuildError) {
        match self.on_disconnect.take() {
            Some(handler) => handler(err),
            None => tracing::error!(error = %err, "build event stream disconnected"),
        }
    }
}

/// Decode and dispatch one raw SSE message. Never fails: bad input is logged.
pub fn handle_message(handlers: &EventHandlers, event_name: &str, data: &str) {
    if data.trim().is_empty() {
        tracing::trace!("build event keepalive");
        return;
    }
    match BuildEvent::from_sse(event_name, data) {
        Ok(event) => {
            if !handlers.dispatch(&event) {
                tracing::debug!(kind = %event.kind, "ignoring build event");
            }
        }
        Err(err) => {
            tracing::warn!(error = %err, data, "skipping unparseable build event");
        }
    }
}

// ---------------------------------------------------------------------------
// Subscription
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListenOptions {
    /// Retry dropped connections instead of reporting a disconnect.
    pub reconnect: bool,
}

/// A live event subscription. Call [`Subscription::unsubscribe`] on teardown;
/// dropping it releases the connection as well.
#[derive(Debug)]
pub struct Subscription {
    task: Option<JoinHandle<()>>,
}

impl Subscription {
    /// Wrap the task that pumps the connection.
    pub fn from_task(task: JoinHandle<()>) -> Self {
        Self { task: Some(task) }
    }

    pub fn is_active(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Close the connection and stop dispatching.
    pub fn unsubscribe(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Opens build event subscriptions. Must be called from within a tokio runtime.
pub trait EventSubscriber: Send + Sync {
    fn subscribe(
        &self,
        subject: &str,
        handlers: EventHandlers,
        options: ListenOptions,
    ) -> Result<Subscription, BuildError>;
}

/// [`EventSubscriber`] over server-sent events.
pub struct SseSubscriber {
    client: reqwest::Client,
    endpoint: Endpoint,
}

impl SseSubscriber {
    pub fn new(endpoint: Endpoint) -> Result<Self, BuildError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("linkwatch/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| BuildError::Stream(e.to_string()))?;
        Ok(Self { client, endpoint })
    }
}

impl EventSubscriber for SseSubscriber {
    fn subscribe(
        &self,
        subject: &str,
        handlers: EventHandlers,
        options: ListenOptions,
    ) -> Result<Subscription, BuildError> {
        let url = events_url(&self.endpoint, subject);
        let mut request = self.client.get(&url);
        if let Some(token) = &self.endpoint.token {
            request = request.bearer_auth(token);
        }

        let mut source =
            EventSource::new(request).map_err(|e| BuildError::Stream(e.to_string()))?;
        if !options.reconnect {
            source.set_retry_policy(Box::new(Never));
        }

        tracing::debug!(%url, reconnect = options.reconnect, "subscribing to build events");
        let task = tokio::spawn(pump(source, handlers, options, url));
        Ok(Subscription::from_task(task))
    }
}

async fn pump(
    mut source: EventSource,
    mut handlers: EventHandlers,
    options: ListenOptions,
    url: String,
) {
    while let Some(event) = source.next().await {
        match event {
            Ok(Event::Open) => tracing::debug!(%url, "build event stream open"),
            Ok(Event::Message(message)) => handle_message(&handlers, &message.event, &message.data),
            Err(err) if options.reconnect => {
                tracing::warn!(error = %err, "build event stream interrupted, reconnecting");
            }
            Err(err) => {
                source.close();
                handlers.disconnected(stream_error(&url, err).await);
                return;
            }
        }
    }
    handlers.disconnected(BuildError::Stream("event stream ended".to_string()));
}

async fn stream_error(url: &str, err: reqwest_eventsource::Error) -> BuildError {
    match err {
        reqwest_eventsource::Error::InvalidStatusCode(status, response) => {
            let body = response.text().await.unwrap_or_default();
            remote_error(status.as_u16(), &body)
        }
        reqwest_eventsource::Error::Transport(err) => BuildError::Transport {
            url: url.to_string(),
            message: err.to_string(),
        },
        other => BuildError::Stream(other.to_string()),
    }
}
