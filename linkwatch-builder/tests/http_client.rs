//! HttpBuildService and SseSubscriber against a scripted local HTTP server.

use std::io::{BufRead, BufReader, Read, Write};
use std::net::TcpListener;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::thread;
use std::time::Duration;

use linkwatch_builder::{
    BuildError, BuildEventKind, BuildService, EventHandlers, EventSubscriber, HttpBuildService,
    LinkOptions, ListenOptions, SseSubscriber,
};
use linkwatch_core::config::Endpoint;
use linkwatch_core::{AppId, Change, FileEntry};

struct Recorded {
    request_line: String,
    headers: Vec<(String, String)>,
    body: String,
}

impl Recorded {
    fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Serve one canned response per incoming connection, in order, and report
/// what each request looked like.
fn serve(responses: Vec<String>) -> (String, mpsc::Receiver<Recorded>) {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let addr = listener.local_addr().expect("addr");
    let (tx, rx) = mpsc::channel();

    thread::spawn(move || {
        for response in responses {
            let (mut stream, _) = listener.accept().expect("accept");
            let mut reader = BufReader::new(stream.try_clone().expect("clone"));

            let mut request_line = String::new();
            reader.read_line(&mut request_line).expect("request line");
            let mut headers = Vec::new();
            loop {
                let mut line = String::new();
                reader.read_line(&mut line).expect("header");
                let line = line.trim_end();
                if line.is_empty() {
                    break;
                }
                if let Some((k, v)) = line.split_once(':') {
                    headers.push((k.trim().to_string(), v.trim().to_string()));
                }
            }
            let length = headers
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case("content-length"))
                .and_then(|(_, v)| v.parse::<usize>().ok())
                .unwrap_or(0);
            let mut body = vec![0; length];
            reader.read_exact(&mut body).expect("body");

            stream.write_all(response.as_bytes()).expect("write");
            stream.flush().expect("flush");
            let _ = tx.send(Recorded {
                request_line: request_line.trim_end().to_string(),
                headers,
                body: String::from_utf8_lossy(&body).into_owned(),
            });
        }
    });

    (format!("http://{addr}"), rx)
}

fn response(status: &str, extra_headers: &[(&str, &str)], body: &str) -> String {
    let mut out = format!(
        "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n",
        body.len()
    );
    for (k, v) in extra_headers {
        out.push_str(&format!("{k}: {v}\r\n"));
    }
    out.push_str("\r\n");
    out.push_str(body);
    out
}

fn event_stream(body: &str) -> String {
    format!(
        "HTTP/1.1 200 OK\r\nContent-Type: text/event-stream\r\nCache-Control: no-cache\r\nConnection: close\r\n\r\n{body}"
    )
}

fn endpoint(url: &str) -> Endpoint {
    Endpoint {
        account: "acme".into(),
        workspace: "dev".into(),
        token: Some("secret".into()),
        builder_url: url.to_string(),
        events_url: url.to_string(),
        timeout_ms: 5_000,
    }
}

#[test]
fn relink_conflict_surfaces_initial_link_required() {
    let (url, requests) = serve(vec![response(
        "409 Conflict",
        &[],
        r#"{"code":"initial_link_required","message":"no build state"}"#,
    )]);
    let service = HttpBuildService::new(endpoint(&url));
    let app = AppId::from("vtex.store@1.0.0");

    let err = service
        .relink_app(&app, &[Change::delete("store/a.js")])
        .expect_err("409 must be an error");
    assert!(err.is_initial_link_required(), "got: {err}");
    assert!(!err.is_transport());

    let recorded = requests.recv().expect("request");
    assert_eq!(
        recorded.request_line,
        "POST /acme/dev/_v/builder/0/relink/vtex.store@1.0.0 HTTP/1.1"
    );
    assert_eq!(recorded.header("authorization"), Some("Bearer secret"));
    assert!(recorded.body.contains(r#""path":"store/a.js""#), "body: {}", recorded.body);
}

#[test]
fn sticky_link_pins_later_requests_to_the_same_worker() {
    let (url, requests) = serve(vec![
        response(
            "200 OK",
            &[("x-vtex-sticky-host", "worker-7")],
            r#"{"code":"build.accepted"}"#,
        ),
        response("200 OK", &[], "{}"),
    ]);
    let service = HttpBuildService::new(endpoint(&url));
    let app = AppId::from("vtex.store@1.0.0");
    let files = vec![FileEntry {
        path: "manifest.json".into(),
        content: "e30=".into(),
        linked: false,
    }];

    let answer = service
        .link_app(
            &app,
            &files,
            &LinkOptions {
                sticky: true,
                sticky_hint: Some("worker-3".into()),
                timeout: None,
            },
        )
        .expect("link");
    assert!(answer.is_accepted());
    assert_eq!(service.sticky_host().as_deref(), Some("worker-7"));

    let link = requests.recv().expect("link request");
    assert_eq!(link.header("x-vtex-sticky-host"), Some("worker-3"));
    assert!(link.body.contains("manifest.json"));

    service
        .relink_app(&app, &[Change::update("store/a.js", "YQ==")])
        .expect("relink");
    let relink = requests.recv().expect("relink request");
    assert_eq!(relink.header("x-vtex-sticky-host"), Some("worker-7"));
}

#[test]
fn unreachable_service_is_a_transport_error() {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let url = format!("http://{}", listener.local_addr().expect("addr"));
    drop(listener);

    let service = HttpBuildService::new(endpoint(&url));
    let err = service
        .clean(&AppId::from("vtex.store@1.0.0"))
        .expect_err("nothing is listening");
    assert!(err.is_transport(), "got: {err}");
}

#[test]
fn availability_request_is_authorized_but_not_pinned() {
    let (url, requests) = serve(vec![
        response(
            "200 OK",
            &[("x-vtex-sticky-host", "worker-7")],
            r#"{"code":"build.accepted"}"#,
        ),
        response(
            "200 OK",
            &[],
            r#"{"availability":{"hostname":"worker-2","score":0.8}}"#,
        ),
    ]);
    let service = HttpBuildService::new(endpoint(&url));
    let app = AppId::from("vtex.store@1.0.0");

    service
        .link_app(
            &app,
            &[],
            &LinkOptions {
                sticky: true,
                ..LinkOptions::default()
            },
        )
        .expect("link");
    requests.recv().expect("link request");
    assert_eq!(service.sticky_host().as_deref(), Some("worker-7"));

    let availability = service
        .availability(&app, Duration::from_secs(1))
        .expect("availability");
    assert_eq!(availability.hostname.as_deref(), Some("worker-2"));

    let asked = requests.recv().expect("availability request");
    assert_eq!(
        asked.request_line,
        "GET /acme/dev/_v/builder/0/availability/vtex.store@1.0.0 HTTP/1.1"
    );
    assert_eq!(asked.header("authorization"), Some("Bearer secret"));
    assert_eq!(asked.header("x-vtex-sticky-host"), None);
}

#[tokio::test]
async fn event_stream_dispatches_events_then_reports_the_close_once() {
    let (url, requests) = serve(vec![event_stream(concat!(
        "event: build_failed\ndata: {\"message\":\"boom\"}\n\n",
        "event: build_failed\ndata: {not json\n\n",
        "data: {\"code\":\"build.succeeded\"}\n\n",
    ))]);

    let failures = Arc::new(Mutex::new(Vec::new()));
    let successes = Arc::new(AtomicUsize::new(0));
    let disconnects = Arc::new(AtomicUsize::new(0));
    let (closed_tx, closed_rx) = tokio::sync::oneshot::channel();

    let handlers = EventHandlers::new()
        .on(BuildEventKind::BuildFailed, {
            let failures = failures.clone();
            move |event| {
                failures
                    .lock()
                    .expect("lock")
                    .push(event.message().map(str::to_string));
            }
        })
        .on(BuildEventKind::BuildSucceeded, {
            let successes = successes.clone();
            move |_| {
                successes.fetch_add(1, Ordering::SeqCst);
            }
        })
        .on_disconnect({
            let disconnects = disconnects.clone();
            move |err| {
                disconnects.fetch_add(1, Ordering::SeqCst);
                let _ = closed_tx.send(err);
            }
        });

    let subscriber = SseSubscriber::new(endpoint(&url)).expect("client");
    let subscription = subscriber
        .subscribe("vtex.store", handlers, ListenOptions::default())
        .expect("subscribe");

    let err = tokio::time::timeout(Duration::from_secs(5), closed_rx)
        .await
        .expect("disconnect within timeout")
        .expect("disconnect handler ran");
    assert!(
        matches!(err, BuildError::Stream(_) | BuildError::Transport { .. }),
        "got: {err}"
    );

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(disconnects.load(Ordering::SeqCst), 1);
    assert_eq!(*failures.lock().expect("lock"), vec![Some("boom".to_string())]);
    assert_eq!(successes.load(Ordering::SeqCst), 1);
    assert!(!subscription.is_active());

    let recorded = requests.recv().expect("subscribe request");
    assert_eq!(
        recorded.request_line,
        "GET /acme/dev/events?subject=vtex.store HTTP/1.1"
    );
    assert_eq!(recorded.header("authorization"), Some("Bearer secret"));
}

#[tokio::test]
async fn event_stream_error_status_carries_the_remote_code() {
    let (url, _requests) = serve(vec![response(
        "404 Not Found",
        &[],
        r#"{"code":"app_not_found","message":"no such app"}"#,
    )]);
    let (closed_tx, closed_rx) = tokio::sync::oneshot::channel();
    let handlers = EventHandlers::new().on_disconnect(move |err| {
        let _ = closed_tx.send(err);
    });

    let subscriber = SseSubscriber::new(endpoint(&url)).expect("client");
    let _subscription = subscriber
        .subscribe("vtex.store", handlers, ListenOptions::default())
        .expect("subscribe");

    let err = tokio::time::timeout(Duration::from_secs(5), closed_rx)
        .await
        .expect("disconnect within timeout")
        .expect("disconnect handler ran");
    match err {
        BuildError::Remote { status, code, message } => {
            assert_eq!(status, 404);
            assert_eq!(code.as_deref(), Some("app_not_found"));
            assert_eq!(message, "no such app");
        }
        other => panic!("expected a remote error, got {other:?}"),
    }
}
