//! Request/response client for the build service.
//!
//! Calls are blocking; async callers run them under `spawn_blocking`.

use std::sync::Mutex;
use std::time::Duration;

use linkwatch_core::config::Endpoint;
use linkwatch_core::{AppId, Change, FileEntry};
use serde::de::DeserializeOwned;

use crate::error::BuildError;
use crate::protocol::{
    builder_url, remote_error, Availability, AvailabilityResponse, CleanResponse, LinkRequest,
    LinkResponse, RelinkRequest, STICKY_HOST_HEADER,
};

/// Options for a full link.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkOptions {
    /// Pin this and every later request to one build worker.
    pub sticky: bool,
    /// Worker to ask for; `None` lets the load balancer choose.
    pub sticky_hint: Option<String>,
    /// Overrides the client-wide timeout for this upload.
    pub timeout: Option<Duration>,
}

/// The build service operations the link session depends on.
pub trait BuildService: Send + Sync {
    /// Upload the full file set. Must precede any [`BuildService::relink_app`].
    fn link_app(
        &self,
        app: &AppId,
        files: &[FileEntry],
        options: &LinkOptions,
    ) -> Result<LinkResponse, BuildError>;

    /// Upload a batch of incremental changes.
    fn relink_app(&self, app: &AppId, changes: &[Change]) -> Result<(), BuildError>;

    /// Drop the service's build cache for `app`.
    fn clean(&self, app: &AppId) -> Result<CleanResponse, BuildError>;

    /// Ask one worker how busy it is.
    fn availability(&self, app: &AppId, timeout: Duration) -> Result<Availability, BuildError>;
}

/// [`BuildService`] over HTTP/JSON.
pub struct HttpBuildService {
    agent: ureq::Agent,
    endpoint: Endpoint,
    sticky_host: Mutex<Option<String>>,
}

impl HttpBuildService {
    pub fn new(endpoint: Endpoint) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_millis(endpoint.timeout_ms))
            .user_agent(concat!("linkwatch/", env!("CARGO_PKG_VERSION")))
            .build();
        Self {
            agent,
            endpoint,
            sticky_host: Mutex::new(None),
        }
    }

    /// The worker later requests are pinned to, if a sticky link happened.
    pub fn sticky_host(&self) -> Option<String> {
        self.sticky_host.lock().ok().and_then(|guard| guard.clone())
    }

    /// A request carrying the bearer token only.
    fn authorized(&self, method: &str, url: &str) -> ureq::Request {
        let request = self.agent.request(method, url);
        match &self.endpoint.token {
            Some(token) => request.set("Authorization", &format!("Bearer {token}")),
            None => request,
        }
    }

    /// An authorized request pinned to the remembered worker, if any.
    fn request(&self, method: &str, url: &str) -> ureq::Request {
        let mut request = self.authorized(method, url);
        if let Some(host) = self.sticky_host() {
            request = request.set(STICKY_HOST_HEADER, &host);
        }
        request
    }

    fn remember_sticky_host(&self, host: Option<&str>) {
        if let (Some(host), Ok(mut guard)) = (host, self.sticky_host.lock()) {
            tracing::debug!(host, "pinning session to build worker");
            *guard = Some(host.to_string());
        }
    }
}

impl BuildService for HttpBuildService {
    fn link_app(
        &self,
        app: &AppId,
        files: &[FileEntry],
        options: &LinkOptions,
    ) -> Result<LinkResponse, BuildError> {
        let url = builder_url(&self.endpoint, "link", app);
        let mut request = self.request("POST", &url);
        if options.sticky {
            if let Some(hint) = &options.sticky_hint {
                request = request.set(STICKY_HOST_HEADER, hint);
            }
        }
        if let Some(timeout) = options.timeout {
            request = request.timeout(timeout);
        }

        let response = request
            .send_json(LinkRequest { files })
            .map_err(|e| map_ureq_error(&url, e))?;
        if options.sticky {
            let host = response
                .header(STICKY_HOST_HEADER)
                .map(str::to_string)
                .or_else(|| options.sticky_hint.clone());
            self.remember_sticky_host(host.as_deref());
        }
        decode(response)
    }

    fn relink_app(&self, app: &AppId, changes: &[Change]) -> Result<(), BuildError> {
        let url = builder_url(&self.endpoint, "relink", app);
        self.request("POST", &url)
            .send_json(RelinkRequest { changes })
            .map_err(|e| map_ureq_error(&url, e))?;
        Ok(())
    }

    fn clean(&self, app: &AppId) -> Result<CleanResponse, BuildError> {
        let url = builder_url(&self.endpoint, "clean", app);
        let response = self
            .request("POST", &url)
            .call()
            .map_err(|e| map_ureq_error(&url, e))?;
        decode(response)
    }

    fn availability(&self, app: &AppId, timeout: Duration) -> Result<Availability, BuildError> {
        let url = builder_url(&self.endpoint, "availability", app);
        let response = self
            .authorized("GET", &url)
            .timeout(timeout)
            .call()
            .map_err(|e| map_ureq_error(&url, e))?;
        let hostname = response.header(STICKY_HOST_HEADER).map(str::to_string);
        let mut body: AvailabilityResponse = decode(response)?;
        if body.availability.hostname.is_none() {
            body.availability.hostname = hostname;
        }
        Ok(body.availability)
    }
}

fn decode<T: DeserializeOwned>(response: ureq::Response) -> Result<T, BuildError> {
    let body = response
        .into_string()
        .map_err(|e| BuildError::Decode(e.to_string()))?;
    Ok(serde_json::from_str(&body)?)
}

fn map_ureq_error(url: &str, err: ureq::Error) -> BuildError {
    match err {
        ureq::Error::Status(status, response) => {
            let body = response.into_string().unwrap_or_default();
            remote_error(status, &body)
        }
        ureq::Error::Transport(transport) => BuildError::Transport {
            url: url.to_string(),
            message: transport.to_string(),
        },
    }
}
