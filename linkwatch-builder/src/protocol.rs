//! Wire shapes and URLs of the build service.

use linkwatch_core::config::Endpoint;
use linkwatch_core::{AppId, Change, FileEntry};
use serde::{Deserialize, Serialize};

use crate::error::BuildError;

/// The only acceptable answer to a full link.
pub const ACCEPTED_CODE: &str = "build.accepted";

pub const INITIAL_LINK_REQUIRED: &str = "initial_link_required";
pub const BUILD_IN_PROGRESS: &str = "build_in_progress";
pub const ROUTING_ERROR: &str = "routing_error";
pub const LINK_ON_PRODUCTION: &str = "link_on_production";

/// Request/response header pinning a session to one build worker.
pub const STICKY_HOST_HEADER: &str = "x-vtex-sticky-host";

#[derive(Debug, Serialize)]
pub struct LinkRequest<'a> {
    pub files: &'a [FileEntry],
}

#[derive(Debug, Serialize)]
pub struct RelinkRequest<'a> {
    pub changes: &'a [Change],
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LinkResponse {
    pub code: String,
}

impl LinkResponse {
    pub fn is_accepted(&self) -> bool {
        self.code == ACCEPTED_CODE
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanResponse {
    pub time_nano: u64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Availability {
    #[serde(default)]
    pub hostname: Option<String>,
    pub score: f64,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AvailabilityResponse {
    pub availability: Availability,
}

#[derive(Debug, Default, Deserialize)]
struct RemoteErrorBody {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// `{builder}/{account}/{workspace}/_v/builder/0/{action}/{app}`
pub fn builder_url(endpoint: &Endpoint, action: &str, app: &AppId) -> String {
    format!(
        "{}/{}/{}/_v/builder/0/{}/{}",
        endpoint.builder_url, endpoint.account, endpoint.workspace, action, app
    )
}

/// `{events}/{account}/{workspace}/events?subject={subject}`
pub fn events_url(endpoint: &Endpoint, subject: &str) -> String {
    format!(
        "{}/{}/{}/events?subject={}",
        endpoint.events_url, endpoint.account, endpoint.workspace, subject
    )
}

/// Build a [`BuildError::Remote`] from a status and whatever body came with it.
///
/// JSON bodies contribute `code` and `message`; anything else becomes the message.
pub(crate) fn remote_error(status: u16, body: &str) -> BuildError {
    let parsed: RemoteErrorBody = serde_json::from_str(body).unwrap_or_default();
    let message = parsed.message.unwrap_or_else(|| {
        let trimmed = body.trim();
        if trimmed.is_empty() {
            "no response body".to_string()
        } else {
            trimmed.to_string()
        }
    });
    BuildError::Remote {
        status,
        code: parsed.code,
        message,
    }
}

/// Human duration for a server-reported nanosecond count: `850µs`, `45ms`, `1.23s`.
pub fn format_nanos(nanos: u64) -> String {
    const MICRO: u64 = 1_000;
    const MILLI: u64 = 1_000_000;
    const SECOND: u64 = 1_000_000_000;
    match nanos {
        n if n >= SECOND => format!("{:.2}s", n as f64 / SECOND as f64),
        n if n >= MILLI => format!("{}ms", n / MILLI),
        n if n >= MICRO => format!("{}µs", n / MICRO),
        n => format!("{n}ns"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoint() -> Endpoint {
        Endpoint {
            account: "acme".into(),
            workspace: "dev".into(),
            token: None,
            builder_url: "http://builder.local".into(),
            events_url: "http://events.local".into(),
            timeout_ms: 1_000,
        }
    }

    #[test]
    fn urls() {
        let app = AppId::from("vtex.store@1.0.0");
        assert_eq!(
            builder_url(&endpoint(), "relink", &app),
            "http://builder.local/acme/dev/_v/builder/0/relink/vtex.store@1.0.0"
        );
        assert_eq!(
            events_url(&endpoint(), app.subject()),
            "http://events.local/acme/dev/events?subject=vtex.store"
        );
    }

    #[test]
    fn remote_error_reads_json_code_and_message() {
        let err = remote_error(
            409,
            r#"{"code":"initial_link_required","message":"link first"}"#,
        );
        assert!(err.is_initial_link_required());
        assert!(err.to_string().contains("link first"));
    }

    #[test]
    fn remote_error_falls_back_to_raw_body() {
        let err = remote_error(502, "<html>bad gateway</html>");
        assert_eq!(err.remote_code(), None);
        assert!(err.to_string().contains("bad gateway"));
        assert!(remote_error(500, "  ").to_string().contains("no response body"));
    }

    #[test]
    fn clean_response_is_camel_case() {
        let parsed: CleanResponse = serde_json::from_str(r#"{"timeNano":1500000}"#).expect("parse");
        assert_eq!(parsed.time_nano, 1_500_000);
    }

    #[test]
    fn nanos_formatting() {
        assert_eq!(format_nanos(999), "999ns");
        assert_eq!(format_nanos(850_000), "850µs");
        assert_eq!(format_nanos(45_000_000), "45ms");
        assert_eq!(format_nanos(1_234_000_000), "1.23s");
    }
}
