//! Error types for linkwatch-builder.

use thiserror::Error;

use crate::protocol::{
    BUILD_IN_PROGRESS, INITIAL_LINK_REQUIRED, LINK_ON_PRODUCTION, ROUTING_ERROR,
};

/// Everything that can go wrong talking to the build service.
///
/// The split that matters to callers: [`BuildError::Remote`] means the
/// service answered (and may be asking for a resync), [`BuildError::Transport`]
/// means it could not be reached at all.
#[derive(Debug, Error)]
pub enum BuildError {
    /// Connection refused, DNS failure, timeout, TLS...
    #[error("could not reach build service at {url}: {message}")]
    Transport { url: String, message: String },

    /// The service answered with a non-success status.
    #[error("build service returned HTTP {status} ({}): {message}", .code.as_deref().unwrap_or("no code"))]
    Remote {
        status: u16,
        code: Option<String>,
        message: String,
    },

    /// The initial link was answered with something other than acceptance.
    #[error("link rejected by build service (code `{code}`); update the builder to the latest version")]
    Rejected { code: String },

    /// A success response whose body could not be decoded.
    #[error("invalid response from build service: {0}")]
    Decode(String),

    /// The push-event stream failed or ended.
    #[error("build event stream error: {0}")]
    Stream(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl BuildError {
    /// The structured `code` the service attached to its error body, if any.
    pub fn remote_code(&self) -> Option<&str> {
        match self {
            BuildError::Remote { code, .. } => code.as_deref(),
            _ => None,
        }
    }

    /// The service holds no state for this app and wants a full link.
    pub fn is_initial_link_required(&self) -> bool {
        self.remote_code() == Some(INITIAL_LINK_REQUIRED)
    }

    pub fn is_build_in_progress(&self) -> bool {
        self.remote_code() == Some(BUILD_IN_PROGRESS)
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, BuildError::Transport { .. })
    }

    /// A user-facing remedy for the setup errors that have a known one.
    pub fn setup_hint(&self) -> Option<&'static str> {
        let BuildError::Remote { code, message, .. } = self else {
            return None;
        };
        match code.as_deref() {
            Some(ROUTING_ERROR)
                if message.contains("app_not_found") && message.contains("builder-hub") =>
            {
                Some("install the builder-hub app in your account to enable linking")
            }
            Some(LINK_ON_PRODUCTION) => {
                Some("take your workspace out of production mode to enable linking")
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn remote(code: Option<&str>, message: &str) -> BuildError {
        BuildError::Remote {
            status: 409,
            code: code.map(str::to_string),
            message: message.to_string(),
        }
    }

    #[test]
    fn resync_condition_is_distinct_from_transport_failure() {
        let resync = remote(Some("initial_link_required"), "no state");
        assert!(resync.is_initial_link_required());
        assert!(!resync.is_transport());

        let unreachable = BuildError::Transport {
            url: "http://localhost:1".into(),
            message: "connection refused".into(),
        };
        assert!(unreachable.is_transport());
        assert!(!unreachable.is_initial_link_required());
    }

    #[test]
    fn display_includes_code_when_present() {
        let msg = remote(Some("build_in_progress"), "busy").to_string();
        assert!(msg.contains("409"), "got: {msg}");
        assert!(msg.contains("build_in_progress"), "got: {msg}");
        let msg = remote(None, "boom").to_string();
        assert!(msg.contains("no code"), "got: {msg}");
    }

    #[test]
    fn setup_hints() {
        let not_installed = remote(
            Some("routing_error"),
            "app_not_found: vtex.builder-hub is not installed",
        );
        assert!(not_installed
            .setup_hint()
            .is_some_and(|h| h.contains("builder-hub")));
        assert!(remote(Some("link_on_production"), "nope")
            .setup_hint()
            .is_some_and(|h| h.contains("production")));
        assert!(remote(Some("routing_error"), "other").setup_hint().is_none());
    }
}
