use async_trait::async_trait;
use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::fmt::MakeWriter;

use super::{RequestPipeline, RequestSpec};
use crate::classify::ErrorKind;
use crate::credentials::{CredentialProvider, LoginRedirect};
use crate::failure::Failure;
use crate::present::Presenter;
use crate::retry::RetryPolicy;
use crate::session::Session;
use crate::transport::{Request, Response, Transport};

/// Transport that replays a fixed sequence of outcomes and records each call.
#[derive(Default)]
struct ScriptedTransport {
    script: Mutex<VecDeque<Result<Response, Failure>>>,
    calls: Mutex<Vec<(Request, Instant)>>,
}

impl ScriptedTransport {
    fn new(script: Vec<Result<Response, Failure>>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            calls: Mutex::new(Vec::new()),
        })
    }

    fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    fn request(&self, i: usize) -> Request {
        self.calls.lock().unwrap()[i].0.clone()
    }

    fn gaps(&self) -> Vec<Duration> {
        let calls = self.calls.lock().unwrap();
        calls.windows(2).map(|w| w[1].1 - w[0].1).collect()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn dispatch(&self, request: &Request) -> Result<Response, Failure> {
        self.calls
            .lock()
            .unwrap()
            .push((request.clone(), Instant::now()));
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(Failure::connection("script exhausted")))
    }
}

#[derive(Default)]
struct RecordingRedirect(Mutex<Vec<String>>);

impl LoginRedirect for RecordingRedirect {
    fn redirect_to_login(&self, route: &str) {
        self.0.lock().unwrap().push(route.to_string());
    }
}

impl RecordingRedirect {
    fn count(&self) -> usize {
        self.0.lock().unwrap().len()
    }
}

fn ok(body: &str) -> Result<Response, Failure> {
    Ok(Response {
        status: 200,
        status_text: "OK".to_string(),
        headers: vec![],
        body: body.as_bytes().to_vec(),
    })
}

fn status(code: u16) -> Result<Response, Failure> {
    Err(Failure::status(code, "", ""))
}

struct Harness {
    transport: Arc<ScriptedTransport>,
    session: Session,
    redirect: Arc<RecordingRedirect>,
    pipeline: Arc<RequestPipeline<Arc<ScriptedTransport>>>,
}

fn harness(script: Vec<Result<Response, Failure>>) -> Harness {
    harness_with_presenter(script, None)
}

fn harness_with_presenter(
    script: Vec<Result<Response, Failure>>,
    presenter: Option<Presenter>,
) -> Harness {
    let transport = ScriptedTransport::new(script);
    let session = Session::with_token("tok-123");
    let redirect = Arc::new(RecordingRedirect::default());
    let credentials = CredentialProvider::new(session.clone(), redirect.clone());
    let pipeline = RequestPipeline::new(transport.clone(), credentials, "http://localhost:8080/api")
        .unwrap()
        .with_presenter(presenter);
    Harness {
        transport,
        session,
        redirect,
        pipeline: Arc::new(pipeline),
    }
}

#[tokio::test(start_paused = true)]
async fn succeeds_after_two_503s_with_doubling_backoff() {
    let h = harness(vec![status(503), status(503), ok(r#"{"ok":true}"#)]);

    let resp = h.pipeline.get("/items").await.unwrap();

    assert_eq!(resp.text(), r#"{"ok":true}"#);
    assert_eq!(h.transport.call_count(), 3);
    let gaps = h.transport.gaps();
    assert_eq!(gaps.len(), 2);
    assert!(gaps[0] >= Duration::from_millis(1000) && gaps[0] < Duration::from_millis(1100));
    assert!(gaps[1] >= Duration::from_millis(2000) && gaps[1] < Duration::from_millis(2100));
}

#[tokio::test(start_paused = true)]
async fn unauthorized_invalidates_session_without_retry() {
    let h = harness(vec![status(401), ok("{}")]);

    let err = h.pipeline.get("/me").await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Authentication);
    assert_eq!(err.message(), "Authentication required. Please log in again.");
    assert_eq!(err.attempts(), 1);
    assert_eq!(h.transport.call_count(), 1);
    assert!(h.session.token().is_none());
    assert_eq!(*h.redirect.0.lock().unwrap(), vec!["/login".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn unauthorized_mid_sequence_still_short_circuits() {
    let h = harness(vec![status(502), status(401), ok("{}")]);

    let err = h.pipeline.get("/me").await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Authentication);
    assert_eq!(h.transport.call_count(), 2);
    assert_eq!(h.redirect.count(), 1);
}

#[tokio::test(start_paused = true)]
async fn not_found_is_terminal_after_one_attempt() {
    let h = harness(vec![status(404), ok("{}")]);

    let err = h.pipeline.get("/items/9").await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert_eq!(err.message(), "The requested resource was not found.");
    assert_eq!(err.status_code(), Some(404));
    assert_eq!(h.transport.call_count(), 1);
    assert!(h.session.is_authenticated());
}

#[tokio::test(start_paused = true)]
async fn transport_failures_exhaust_after_three_attempts() {
    let h = harness(vec![
        Err(Failure::connection("refused")),
        Err(Failure::timeout("timed out")),
        Err(Failure::connection("refused")),
        ok("{}"),
    ]);

    let err = h.pipeline.get("/items").await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Network);
    assert!(err.is_network_error());
    assert_eq!(err.attempts(), 3);
    assert_eq!(h.transport.call_count(), 3);
}

#[tokio::test(start_paused = true)]
async fn server_errors_exhaust_with_server_kind() {
    let h = harness(vec![status(500), status(503), status(504)]);

    let err = h.pipeline.get("/report").await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Server);
    assert_eq!(err.status_code(), Some(504));
    assert_eq!(err.message(), "Server error. Please try again later.");
    assert_eq!(h.transport.call_count(), 3);
}

#[tokio::test(start_paused = true)]
async fn validation_error_keeps_short_server_message() {
    let h = harness(vec![Err(Failure::status(
        400,
        "Bad Request",
        r#"{"message":"Email is invalid"}"#,
    ))]);

    let err = h
        .pipeline
        .post_json("/users", &serde_json::json!({"email": "nope"}))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(err.message(), "Email is invalid");
    assert_eq!(h.transport.call_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn attaches_bearer_and_default_headers() {
    let h = harness(vec![ok("{}")]);

    h.pipeline
        .execute(RequestSpec::get("items").with_header("X-Client", "tests"))
        .await
        .unwrap();

    let req = h.transport.request(0);
    assert_eq!(req.url, "http://localhost:8080/api/items");
    assert_eq!(req.header("authorization"), Some("Bearer tok-123"));
    assert_eq!(req.header("content-type"), Some("application/json"));
    assert_eq!(req.header("x-client"), Some("tests"));
    assert_eq!(req.timeout, Duration::from_secs(15));
}

#[tokio::test(start_paused = true)]
async fn no_token_means_no_authorization_header() {
    let h = harness(vec![ok("{}")]);
    h.session.logout();

    h.pipeline.get("/public").await.unwrap();

    assert!(h.transport.request(0).header("authorization").is_none());
}

#[tokio::test(start_paused = true)]
async fn per_call_retry_policy_overrides_default() {
    let h = harness(vec![status(500), status(500), status(500), status(500), ok("{}")]);
    let policy = RetryPolicy::default()
        .with_max_attempts(5)
        .with_base_delay(Duration::from_millis(10));

    h.pipeline
        .execute(RequestSpec::get("/slow").with_retry(policy))
        .await
        .unwrap();

    assert_eq!(h.transport.call_count(), 5);
    let gaps = h.transport.gaps();
    assert!(gaps[0] >= Duration::from_millis(10) && gaps[0] < Duration::from_millis(20));
    assert!(gaps[3] >= Duration::from_millis(80) && gaps[3] < Duration::from_millis(90));
}

#[tokio::test(start_paused = true)]
async fn cancel_during_backoff_stops_retrying() {
    let h = harness(vec![status(503), ok("{}")]);
    let cancel = CancellationToken::new();

    let pipeline = h.pipeline.clone();
    let task_cancel = cancel.clone();
    let task = tokio::spawn(async move {
        pipeline
            .execute_with_cancel(RequestSpec::get("/items"), &task_cancel)
            .await
    });

    tokio::time::sleep(Duration::from_millis(500)).await;
    cancel.cancel();
    let err = task.await.unwrap().unwrap_err();

    assert!(err.is_cancelled());
    assert_eq!(err.kind(), ErrorKind::Network);
    assert_eq!(h.transport.call_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn already_cancelled_never_dispatches() {
    let h = harness(vec![ok("{}")]);
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = h
        .pipeline
        .execute_with_cancel(RequestSpec::get("/items"), &cancel)
        .await
        .unwrap_err();

    assert!(err.is_cancelled());
    assert_eq!(h.transport.call_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn concurrent_unauthorized_redirects_once() {
    let h = harness(vec![status(401), status(401)]);

    let (a, b) = tokio::join!(h.pipeline.get("/a"), h.pipeline.get("/b"));

    assert_eq!(a.unwrap_err().kind(), ErrorKind::Authentication);
    assert_eq!(b.unwrap_err().kind(), ErrorKind::Authentication);
    assert_eq!(h.redirect.count(), 1);
    assert!(h.session.token().is_none());
}

#[tokio::test(start_paused = true)]
async fn execute_json_decodes_or_reports_unknown() {
    #[derive(serde::Deserialize)]
    struct Item {
        id: u32,
    }

    let h = harness(vec![ok(r#"{"id":5}"#), ok("not json")]);

    let item: Item = h.pipeline.execute_json(RequestSpec::get("/items/5")).await.unwrap();
    assert_eq!(item.id, 5);

    let err = h
        .pipeline
        .execute_json::<Item>(RequestSpec::get("/items/6"))
        .await
        .err()
        .unwrap();
    assert_eq!(err.kind(), ErrorKind::Unknown);
    assert_eq!(err.status_code(), Some(200));
    assert_eq!(err.message(), ErrorKind::Unknown.default_message());
}

#[tokio::test(start_paused = true)]
async fn malformed_url_fails_without_dispatch() {
    let h = harness(vec![ok("{}")]);

    let err = h.pipeline.get("http://").await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Network);
    assert_eq!(err.attempts(), 0);
    assert_eq!(h.transport.call_count(), 0);
}

/// Collects formatted log output so tests can assert on emitted records.
#[derive(Clone, Default)]
struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for CapturedLogs {
    type Writer = CapturedLogs;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

fn capture_logs() -> (CapturedLogs, tracing::subscriber::DefaultGuard) {
    let logs = CapturedLogs::default();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(logs.clone())
        .with_ansi(false)
        .finish();
    let guard = tracing::subscriber::set_default(subscriber);
    (logs, guard)
}

#[tokio::test(start_paused = true)]
async fn terminal_failure_is_reported_through_presenter() {
    let (logs, _guard) = capture_logs();
    let h = harness_with_presenter(vec![status(404)], Some(Presenter::new()));

    h.pipeline.get("/items/9").await.unwrap_err();

    let out = logs.contents();
    assert!(out.contains("The requested resource was not found."), "{}", out);
    assert!(out.contains("kind=not_found"), "{}", out);
    assert!(out.contains("url=http://localhost:8080/api/items/9"), "{}", out);
}

#[tokio::test(start_paused = true)]
async fn undecodable_body_is_reported_through_presenter() {
    #[derive(Debug, serde::Deserialize)]
    struct Item {
        #[allow(dead_code)]
        id: u32,
    }

    let (logs, _guard) = capture_logs();
    let h = harness_with_presenter(vec![ok("not json")], Some(Presenter::new()));

    let err = h
        .pipeline
        .execute_json::<Item>(RequestSpec::get("/items/6"))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Unknown);
    assert_eq!(err.attempts(), 1);
    let out = logs.contents();
    assert!(out.contains("kind=unknown"), "{}", out);
    assert!(out.contains("url=http://localhost:8080/api/items/6"), "{}", out);
}

#[tokio::test(start_paused = true)]
async fn unserializable_body_is_reported_with_resolved_url() {
    let (logs, _guard) = capture_logs();
    let h = harness_with_presenter(vec![ok("{}")], Some(Presenter::new()));
    let mut body = std::collections::HashMap::new();
    body.insert(vec![1u8], 1u8);

    let err = h.pipeline.post_json("/users", &body).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Network);
    assert_eq!(err.attempts(), 0);
    assert_eq!(err.endpoint().url, "http://localhost:8080/api/users");
    assert_eq!(h.transport.call_count(), 0);
    let out = logs.contents();
    assert!(out.contains("kind=network"), "{}", out);
    assert!(out.contains("url=http://localhost:8080/api/users"), "{}", out);
}

/// Transport whose in-flight request is overtaken by a fresh login before the
/// server's 401 arrives.
struct ReloginTransport {
    session: Session,
}

#[async_trait]
impl Transport for ReloginTransport {
    async fn dispatch(&self, _request: &Request) -> Result<Response, Failure> {
        self.session.login("tok-fresh", None);
        Err(Failure::status(401, "Unauthorized", ""))
    }
}

#[tokio::test(start_paused = true)]
async fn stale_unauthorized_keeps_fresh_login() {
    let session = Session::with_token("tok-old");
    let redirect = Arc::new(RecordingRedirect::default());
    let credentials = CredentialProvider::new(session.clone(), redirect.clone());
    let transport = ReloginTransport {
        session: session.clone(),
    };
    let pipeline = RequestPipeline::new(transport, credentials, "http://localhost:8080/api")
        .unwrap()
        .with_presenter(None);

    let err = pipeline.get("/me").await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Authentication);
    assert_eq!(session.token().as_deref(), Some("tok-fresh"));
    assert_eq!(redirect.count(), 0);
}

/// Transport that never answers.
struct HangingTransport;

#[async_trait]
impl Transport for HangingTransport {
    async fn dispatch(&self, _request: &Request) -> Result<Response, Failure> {
        std::future::pending().await
    }
}

#[tokio::test(start_paused = true)]
async fn cancel_interrupts_in_flight_dispatch() {
    let credentials = CredentialProvider::new(Session::new(), Arc::new(RecordingRedirect::default()));
    let pipeline = Arc::new(
        RequestPipeline::new(HangingTransport, credentials, "http://localhost:8080/api")
            .unwrap()
            .with_presenter(None),
    );
    let cancel = CancellationToken::new();

    let task_pipeline = pipeline.clone();
    let task_cancel = cancel.clone();
    let task = tokio::spawn(async move {
        task_pipeline
            .execute_with_cancel(RequestSpec::get("/slow"), &task_cancel)
            .await
    });

    tokio::time::sleep(Duration::from_secs(60)).await;
    cancel.cancel();
    let err = task.await.unwrap().unwrap_err();

    assert!(err.is_cancelled());
    assert_eq!(err.attempts(), 1);
}
