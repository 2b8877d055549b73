//! End-to-end tests: blocking runtime client against an in-process mock of
//! the control endpoint (axum on its own tokio runtime thread).

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::Router;
use axum::body::{Body, Bytes};
use axum::extract::{Path, State};
use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use serde_json::{Value, json};

use custom_runtime::bootstrap;
use custom_runtime::client::{ControlPlane, RuntimeClient};
use custom_runtime::config::{FunctionSettings, RuntimeConfig};
use custom_runtime::context::{ContextBuilder, now_ms};
use custom_runtime::demos;
use custom_runtime::error::{HandlerError, RuntimeError};
use custom_runtime::handler::{EntryPoints, HandlerModule, ModuleRegistry, resolve};
use custom_runtime::reporter::ErrorPayload;
use custom_runtime::runtime::{Outcome, Runtime};

// ── mock control endpoint ─────────────────────────────────────────────────────

struct Queued {
    headers: Vec<(&'static str, String)>,
    body: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq)]
struct Posted {
    path: String,
    body: Value,
}

#[derive(Default)]
struct Mock {
    queue: Mutex<VecDeque<Queued>>,
    posts: Mutex<Vec<Posted>>,
}

impl Mock {
    fn enqueue(&self, id: &str, content_type: &str, body: &str) {
        self.queue.lock().unwrap().push_back(Queued {
            headers: vec![
                ("lambda-runtime-aws-request-id", id.to_string()),
                ("lambda-runtime-deadline-ms", (now_ms() + 5_000).to_string()),
                ("lambda-runtime-invoked-function-arn", "arn:aws:lambda:us-east-1:1:function:f".to_string()),
                ("lambda-runtime-trace-id", format!("Root=1-{id}")),
                ("content-type", content_type.to_string()),
            ],
            body: body.as_bytes().to_vec(),
        });
    }

    fn enqueue_raw(&self, headers: Vec<(&'static str, String)>, body: &str) {
        self.queue.lock().unwrap().push_back(Queued { headers, body: body.as_bytes().to_vec() });
    }

    fn posts(&self) -> Vec<Posted> {
        self.posts.lock().unwrap().clone()
    }

    fn record(&self, path: String, body: Bytes) {
        let body = serde_json::from_slice(&body).unwrap_or(Value::Null);
        self.posts.lock().unwrap().push(Posted { path, body });
    }
}

async fn next(State(mock): State<Arc<Mock>>) -> Response {
    let item = mock.queue.lock().unwrap().pop_front();
    let Some(item) = item else {
        // An empty script ends the run through a protocol error.
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    };
    let mut response = Response::new(Body::from(item.body));
    for (name, value) in item.headers {
        response.headers_mut().insert(
            HeaderName::from_static(name),
            HeaderValue::from_str(&value).unwrap(),
        );
    }
    response
}

async fn invocation_response(State(mock): State<Arc<Mock>>, Path(id): Path<String>, body: Bytes) -> StatusCode {
    mock.record(format!("invocation/{id}/response"), body);
    StatusCode::ACCEPTED
}

async fn invocation_error(State(mock): State<Arc<Mock>>, Path(id): Path<String>, body: Bytes) -> StatusCode {
    mock.record(format!("invocation/{id}/error"), body);
    StatusCode::ACCEPTED
}

async fn init_error(State(mock): State<Arc<Mock>>, body: Bytes) -> StatusCode {
    mock.record("init/error".to_string(), body);
    StatusCode::ACCEPTED
}

fn start(mock: Arc<Mock>) -> SocketAddr {
    let app = Router::new()
        .route("/2018-06-01/runtime/invocation/next", get(next))
        .route("/2018-06-01/runtime/invocation/{id}/response", post(invocation_response))
        .route("/2018-06-01/runtime/invocation/{id}/error", post(invocation_error))
        .route("/2018-06-01/runtime/init/error", post(init_error))
        .with_state(mock);

    let (tx, rx) = std::sync::mpsc::channel();
    std::thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async move {
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            tx.send(listener.local_addr().unwrap()).unwrap();
            axum::serve(listener, app).await.unwrap();
        });
    });
    rx.recv().unwrap()
}

// ── fixtures ──────────────────────────────────────────────────────────────────

#[derive(Default)]
struct Faulty;

impl HandlerModule for Faulty {
    fn entry_points(self: Arc<Self>, entries: &mut EntryPoints) {
        entries.with_input("handle", |input: String| {
            if input == "explode" {
                Err(HandlerError::new("IllegalArgumentException", "cannot handle explode"))
            } else {
                Ok(input.len())
            }
        });
    }
}

#[derive(Default)]
struct Adder;

impl HandlerModule for Adder {
    fn entry_points(self: Arc<Self>, entries: &mut EntryPoints) {
        entries.with_input("inc", |n: i32| Ok(n + 1));
    }
}

fn registry() -> ModuleRegistry {
    let mut registry = ModuleRegistry::new();
    demos::register(&mut registry);
    registry.register::<Faulty>("test.Faulty").register::<Adder>("test.Adder");
    registry
}

fn client(addr: SocketAddr) -> RuntimeClient {
    RuntimeClient::new(format!("http://{addr}/2018-06-01/runtime/"), Duration::from_secs(1)).unwrap()
}

fn settings() -> FunctionSettings {
    FunctionSettings {
        function_name: "f".into(),
        function_version: "1".into(),
        log_group: "/aws/lambda/f".into(),
        log_stream: "s".into(),
        memory_limit_mb: 128,
    }
}

fn runtime(addr: SocketAddr, handler: &str) -> Runtime<RuntimeClient> {
    let descriptor = resolve(&registry(), handler).unwrap();
    Runtime::new(client(addr), descriptor, ContextBuilder::new(settings()))
}

fn config(addr: SocketAddr, handler: &str, log_level: &str) -> RuntimeConfig {
    RuntimeConfig {
        runtime_api: addr.to_string(),
        handler: handler.into(),
        function: settings(),
        log_level: log_level.into(),
        api_version: "2018-06-01".into(),
        connect_timeout: Duration::from_secs(1),
    }
}

fn s3_put() -> Value {
    json!({
        "Records": [{
            "eventVersion": "2.0",
            "eventSource": "aws:s3",
            "awsRegion": "us-east-1",
            "eventTime": "1970-01-01T00:00:00.000Z",
            "eventName": "ObjectCreated:Put",
            "userIdentity": {"principalId": "EXAMPLE"},
            "s3": {
                "s3SchemaVersion": "1.0",
                "bucket": {"name": "sourcebucket", "arn": "arn:aws:s3:::sourcebucket"},
                "object": {"key": "HappyFace.jpg", "size": 1024}
            }
        }]
    })
}

// ── scenarios ─────────────────────────────────────────────────────────────────

#[test]
fn text_payload_is_echoed_verbatim() {
    let mock = Arc::new(Mock::default());
    let addr = start(mock.clone());
    mock.enqueue("req-a", "text/plain", "hello");

    let rt = runtime(addr, "demos.Echo.handle");
    assert_eq!(rt.step().unwrap(), Outcome::Succeeded { request_id: "req-a".into() });
    assert_eq!(
        mock.posts(),
        vec![Posted { path: "invocation/req-a/response".into(), body: json!("hello") }]
    );
}

#[test]
fn storage_notification_decoded_to_event_name() {
    let mock = Arc::new(Mock::default());
    let addr = start(mock.clone());
    mock.enqueue("req-b", "application/json", &s3_put().to_string());

    let rt = runtime(addr, "demos.S3EventName.handleRequest");
    rt.step().unwrap();
    assert_eq!(
        mock.posts(),
        vec![Posted { path: "invocation/req-b/response".into(), body: json!("ObjectCreated:Put") }]
    );
}

#[test]
fn missing_deadline_terminates_without_posting() {
    let mock = Arc::new(Mock::default());
    let addr = start(mock.clone());
    mock.enqueue_raw(
        vec![
            ("lambda-runtime-aws-request-id", "req-c".to_string()),
            ("lambda-runtime-invoked-function-arn", "arn".to_string()),
            ("content-type", "text/plain".to_string()),
        ],
        "hello",
    );

    let rt = runtime(addr, "demos.Echo.handle");
    let fatal = rt.run();
    assert!(matches!(fatal, RuntimeError::Protocol(_)), "{fatal}");
    assert!(fatal.to_string().contains("Deadline-Ms"));
    assert!(mock.posts().is_empty());
}

#[test]
fn handler_failure_reported_then_loop_continues() {
    let mock = Arc::new(Mock::default());
    let addr = start(mock.clone());
    mock.enqueue("req-d1", "text/plain", "explode");
    mock.enqueue("req-d2", "text/plain", "fine");

    let rt = runtime(addr, "test.Faulty.handle");
    let fatal = rt.run();
    // The script runs dry after two invocations.
    assert!(matches!(fatal, RuntimeError::Protocol(_)));

    let posts = mock.posts();
    assert_eq!(posts.len(), 2);
    assert_eq!(posts[0].path, "invocation/req-d1/error");
    assert_eq!(
        posts[0].body,
        json!({"errorMessage": "cannot handle explode", "errorType": "IllegalArgumentException"})
    );
    assert_eq!(posts[1], Posted { path: "invocation/req-d2/response".into(), body: json!(4) });
}

#[test]
fn json_and_text_integers_coerce_alike() {
    let mock = Arc::new(Mock::default());
    let addr = start(mock.clone());
    mock.enqueue("json", "application/json", "\"42\"");
    mock.enqueue("text", "text/plain", "42");

    let rt = runtime(addr, "test.Adder.inc");
    rt.step().unwrap();
    rt.step().unwrap();
    let bodies: Vec<Value> = mock.posts().into_iter().map(|p| p.body).collect();
    assert_eq!(bodies, vec![json!(43), json!(43)]);
}

#[test]
fn malformed_structured_payload_is_coercion_error() {
    let mock = Arc::new(Mock::default());
    let addr = start(mock.clone());
    let mut event = s3_put();
    event["Records"][0]["s3"]["bucket"]["name"] = json!(17);
    mock.enqueue("req-e", "application/json", &event.to_string());

    let rt = runtime(addr, "demos.S3EventName.handleRequest");
    let outcome = rt.step().unwrap();
    assert_eq!(outcome, Outcome::Failed { request_id: "req-e".into(), error_type: "CoercionError".into() });
    let posts = mock.posts();
    assert_eq!(posts[0].path, "invocation/req-e/error");
    assert!(posts[0].body["errorMessage"].as_str().unwrap().contains("Records[0].s3.bucket.name"));
}

#[test]
fn json_tree_round_trips() {
    let mock = Arc::new(Mock::default());
    let addr = start(mock.clone());
    let doc = json!({"a": [1, 2.5, "three", null, true], "b": {"c": {"d": "e"}}});
    mock.enqueue("req-f", "application/json", &doc.to_string());

    let rt = runtime(addr, "demos.JsonNode.testNode");
    rt.step().unwrap();
    assert_eq!(mock.posts()[0].body, doc);
}

#[test]
fn startup_resolution_failure_posts_one_init_error() {
    let mock = Arc::new(Mock::default());
    let addr = start(mock.clone());

    let err = bootstrap::start(&config(addr, "demos.Echo.missing", "info"), &registry(), None).unwrap_err();
    assert!(matches!(err, RuntimeError::Resolution(_)));

    let posts = mock.posts();
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0].path, "init/error");
    assert_eq!(posts[0].body["errorType"], "ResolutionError");
    assert!(posts[0].body["errorMessage"].as_str().unwrap().contains("missing"));
}

#[test]
fn startup_bad_log_level_posts_one_init_error() {
    let mock = Arc::new(Mock::default());
    let addr = start(mock.clone());

    let err = bootstrap::start(&config(addr, "demos.Echo.handle", "verbose"), &registry(), None).unwrap_err();
    assert_eq!(err.kind(), "LoggerError");
    let posts = mock.posts();
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0].path, "init/error");
    assert_eq!(posts[0].body["errorType"], "LoggerError");
}

#[test]
fn startup_success_posts_nothing_and_serves() {
    let mock = Arc::new(Mock::default());
    let addr = start(mock.clone());
    mock.enqueue("req-s", "text/plain", "ping");

    let rt = bootstrap::start(&config(addr, "demos.Echo.handle", "debug"), &registry(), None).unwrap();
    assert!(mock.posts().is_empty());
    rt.step().unwrap();
    assert_eq!(mock.posts(), vec![Posted { path: "invocation/req-s/response".into(), body: json!("ping") }]);
}

#[test]
fn config_failure_reported_at_default_api_version() {
    let mock = Arc::new(Mock::default());
    let addr = start(mock.clone());

    let err = RuntimeError::Config("missing required environment variable _HANDLER".into());
    bootstrap::report_without_config(&err, Some(&addr.to_string()));
    bootstrap::report_without_config(&err, None);

    let posts = mock.posts();
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0].path, "init/error");
    assert_eq!(posts[0].body["errorType"], "ConfigError");
}

#[test]
fn request_id_with_reserved_characters_round_trips() {
    let mock = Arc::new(Mock::default());
    let addr = start(mock.clone());
    mock.enqueue("odd/id?x#y", "text/plain", "hi");

    let rt = runtime(addr, "demos.Echo.handle");
    assert_eq!(rt.step().unwrap(), Outcome::Succeeded { request_id: "odd/id?x#y".into() });
    assert_eq!(
        mock.posts(),
        vec![Posted { path: "invocation/odd/id?x#y/response".into(), body: json!("hi") }]
    );
}

#[test]
fn client_posts_error_payload_shape() {
    let mock = Arc::new(Mock::default());
    let addr = start(mock.clone());
    client(addr)
        .post_invocation_error("req-g", &ErrorPayload::new("boom", "Kind"))
        .unwrap();
    assert_eq!(
        mock.posts(),
        vec![Posted {
            path: "invocation/req-g/error".into(),
            body: json!({"errorMessage": "boom", "errorType": "Kind"}),
        }]
    );
}
