#![allow(clippy::unwrap_used)] // Integration tests use unwrap for brevity

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::{Body, Bytes};
use axum::http::{Request, StatusCode, header};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use tokio::sync::Notify;
use tokio_stream::StreamExt;
use tower::ServiceExt;

use chatter_core::frame;
use chatter_gateway::backend::{Backend, BackendConfig};
use chatter_gateway::routes::{AppState, build_router};

/// One scripted action of the fake backend's answer body.
#[derive(Clone)]
enum Step {
    Chunk(Vec<u8>),
    Delay(Duration),
    Stall,
    Fail,
}

fn chunk(text: &str) -> Step {
    Step::Chunk(text.as_bytes().to_vec())
}

/// Notifies when the fake backend's answer body is dropped.
struct ReleaseProbe(Arc<Notify>);

impl Drop for ReleaseProbe {
    fn drop(&mut self) {
        self.0.notify_one();
    }
}

fn scripted_body(steps: Vec<Step>, probe: Option<ReleaseProbe>) -> Body {
    Body::from_stream(async_stream::stream! {
        let _probe = probe;
        for step in steps {
            match step {
                Step::Chunk(bytes) => yield Ok::<_, std::io::Error>(Bytes::from(bytes)),
                Step::Delay(d) => tokio::time::sleep(d).await,
                Step::Stall => std::future::pending::<()>().await,
                Step::Fail => yield Err(std::io::Error::other("backend gave up")),
            }
        }
    })
}

/// Serve `app` on an ephemeral loopback port and return its base URL.
async fn serve(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

/// Fake backend whose `/get_answer` plays back the given steps.
async fn answer_backend(steps: Vec<Step>, probe: Option<Arc<Notify>>) -> String {
    let app = Router::new().route(
        "/get_answer",
        post(move || {
            let steps = steps.clone();
            let probe = probe.clone().map(ReleaseProbe);
            async move { scripted_body(steps, probe).into_response() }
        }),
    );
    serve(app).await
}

fn gateway(backend_url: &str, idle_timeout: Duration) -> Router {
    let backend = Backend::new(&BackendConfig {
        base_url: backend_url.to_string(),
        connect_timeout: Duration::from_secs(2),
    })
    .unwrap();
    build_router(AppState {
        backend,
        idle_timeout,
    })
}

fn generate_request(query: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/generate")
        .body(Body::from(serde_json::to_string(query).unwrap()))
        .unwrap()
}

async fn read_body(body: Body) -> Bytes {
    axum::body::to_bytes(body, usize::MAX).await.unwrap()
}

#[tokio::test]
async fn generate_streams_fragments_in_arrival_order() {
    let line1 = r#"{"model":"demo","query":"q","answer":" have","source":[],"done":false}"#;
    let line2 = r#"{"model":"demo","query":"q","answer":" no","source":[],"done":false}"#;
    let line3 = r#"{"model":"demo","query":"q","answer":" data","source":["kb/doc.txt"],"done":true}"#;
    // The final fragment carries no trailing newline.
    let wire = format!("{line1}\n{line2}\n{line3}");
    let steps = wire
        .as_bytes()
        .chunks(7)
        .map(|c| Step::Chunk(c.to_vec()))
        .collect();

    let backend_url = answer_backend(steps, None).await;
    let app = gateway(&backend_url, Duration::from_secs(5));

    let resp = app.oneshot(generate_request("q")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let headers = resp.headers();
    assert_eq!(headers[header::CONTENT_TYPE], "text/event-stream");
    assert_eq!(
        headers[header::CACHE_CONTROL],
        "no-store, no-cache, no-transform"
    );
    assert_eq!(headers[header::CONNECTION], "keep-alive");
    assert_eq!(headers[header::CONTENT_ENCODING], "none");

    let body = read_body(resp.into_body()).await;
    let expected = format!(
        "{}{}{}",
        frame::encode_event(line1),
        frame::encode_event(line2),
        frame::encode_event(line3)
    );
    assert_eq!(body, expected.as_bytes());
}

#[tokio::test]
async fn generate_reassembles_split_multibyte_text() {
    let line = r#"{"model":"demo","query":"q","answer":" café","source":[],"done":true}"#;
    // Split inside the two-byte 'é'.
    let split_at = line.find('é').unwrap() + 1;
    let bytes = line.as_bytes();
    let steps = vec![
        Step::Chunk(bytes[..split_at].to_vec()),
        Step::Chunk(bytes[split_at..].to_vec()),
    ];

    let backend_url = answer_backend(steps, None).await;
    let app = gateway(&backend_url, Duration::from_secs(5));

    let resp = app.oneshot(generate_request("q")).await.unwrap();
    let body = read_body(resp.into_body()).await;
    assert_eq!(body, frame::encode_event(line).as_bytes());
}

#[tokio::test]
async fn generate_drops_keepalives_and_empty_fragments() {
    let real = r#"{"model":"demo","query":"q","answer":"hi","source":[],"done":true}"#;
    let steps = vec![
        chunk("\n"),
        chunk("{\"answer\":\"\",\"done\":false}\n"),
        chunk("\n"),
        chunk(real),
    ];

    let backend_url = answer_backend(steps, None).await;
    let app = gateway(&backend_url, Duration::from_secs(5));

    let resp = app.oneshot(generate_request("q")).await.unwrap();
    let body = read_body(resp.into_body()).await;
    assert_eq!(body, frame::encode_event(real).as_bytes());
}

#[tokio::test]
async fn generate_forwards_unparseable_lines_verbatim() {
    let noise = "not json at all";
    let real = r#"{"model":"demo","query":"q","answer":"ok","source":[],"done":true}"#;
    let steps = vec![chunk(&format!("{noise}\n")), chunk(real)];

    let backend_url = answer_backend(steps, None).await;
    let app = gateway(&backend_url, Duration::from_secs(5));

    let resp = app.oneshot(generate_request("q")).await.unwrap();
    let body = read_body(resp.into_body()).await;
    let expected = format!("{}{}", frame::encode_event(noise), frame::encode_event(real));
    assert_eq!(body, expected.as_bytes());
}

#[tokio::test]
async fn generate_rejects_body_that_is_not_a_json_string() {
    let app = gateway("http://127.0.0.1:1", Duration::from_secs(1));
    let req = Request::builder()
        .method("POST")
        .uri("/api/generate")
        .body(Body::from(r#"{"query":"hi"}"#))
        .unwrap();
    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn generate_rejects_empty_query() {
    let app = gateway("http://127.0.0.1:1", Duration::from_secs(1));
    let resp = app.oneshot(generate_request("")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn generate_returns_502_when_backend_is_unreachable() {
    // Grab a port that nothing is listening on.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let app = gateway(&format!("http://{addr}"), Duration::from_secs(1));
    let resp = app.oneshot(generate_request("hi")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn generate_returns_502_when_backend_rejects_the_query() {
    let backend = Router::new().route(
        "/get_answer",
        post(|| async { StatusCode::INTERNAL_SERVER_ERROR }),
    );
    let backend_url = serve(backend).await;

    let app = gateway(&backend_url, Duration::from_secs(1));
    let resp = app.oneshot(generate_request("hi")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn generate_ends_stream_on_backend_transport_error() {
    let line = r#"{"model":"demo","query":"q","answer":"part","source":[],"done":false}"#;
    // The delay lets the first chunk flush before the backend fails, so the
    // failure lands mid-stream instead of aborting the response up front.
    let steps = vec![
        chunk(&format!("{line}\n")),
        Step::Delay(Duration::from_millis(50)),
        Step::Fail,
    ];

    let backend_url = answer_backend(steps, None).await;
    let app = gateway(&backend_url, Duration::from_secs(5));

    let resp = app.oneshot(generate_request("q")).await.unwrap();
    let body = read_body(resp.into_body()).await;
    // Whatever arrived before the failure is delivered, then the stream ends.
    assert_eq!(body, frame::encode_event(line).as_bytes());
}

#[tokio::test]
async fn generate_closes_stream_when_backend_stalls() {
    let line = r#"{"model":"demo","query":"q","answer":"part","source":[],"done":false}"#;
    let steps = vec![chunk(&format!("{line}\n")), Step::Stall];

    let backend_url = answer_backend(steps, None).await;
    let app = gateway(&backend_url, Duration::from_millis(200));

    let resp = app.oneshot(generate_request("q")).await.unwrap();
    let started = std::time::Instant::now();
    let body = read_body(resp.into_body()).await;
    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(body, frame::encode_event(line).as_bytes());
}

#[tokio::test]
async fn generate_tolerates_slow_backend_within_idle_window() {
    let line1 = r#"{"answer":"a","done":false}"#;
    let line2 = r#"{"answer":"b","done":true}"#;
    let steps = vec![
        chunk(&format!("{line1}\n")),
        Step::Delay(Duration::from_millis(100)),
        chunk(line2),
    ];

    let backend_url = answer_backend(steps, None).await;
    let app = gateway(&backend_url, Duration::from_secs(5));

    let resp = app.oneshot(generate_request("q")).await.unwrap();
    let body = read_body(resp.into_body()).await;
    let expected = format!("{}{}", frame::encode_event(line1), frame::encode_event(line2));
    assert_eq!(body, expected.as_bytes());
}

#[tokio::test]
async fn caller_disconnect_releases_backend_stream() {
    let line = r#"{"model":"demo","query":"q","answer":"part","source":[],"done":false}"#;
    let released = Arc::new(Notify::new());
    let steps = vec![chunk(&format!("{line}\n")), Step::Stall];

    let backend_url = answer_backend(steps, Some(Arc::clone(&released))).await;
    let app = gateway(&backend_url, Duration::from_secs(30));

    let resp = app.oneshot(generate_request("q")).await.unwrap();
    let mut data = resp.into_body().into_data_stream();
    let first = data.next().await.unwrap().unwrap();
    assert_eq!(first, frame::encode_event(line).as_bytes());

    // Hanging up must tear down the backend request too.
    drop(data);
    tokio::time::timeout(Duration::from_secs(5), released.notified())
        .await
        .unwrap();
}

#[tokio::test]
async fn management_get_round_trips() {
    let backend = Router::new().route(
        "/check_sources",
        get(|| async { axum::Json(serde_json::json!({ "sources": ["kb/doc.txt"] })) }),
    );
    let backend_url = serve(backend).await;
    let app = gateway(&backend_url, Duration::from_secs(1));

    let req = Request::builder()
        .method("GET")
        .uri("/api/check_sources")
        .body(Body::empty())
        .unwrap();
    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let content_type = resp.headers()[header::CONTENT_TYPE].to_str().unwrap().to_string();
    assert!(content_type.starts_with("application/json"));
    let body = read_body(resp.into_body()).await;
    let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(value, serde_json::json!({ "sources": ["kb/doc.txt"] }));
}

#[tokio::test]
async fn management_post_forwards_body_and_content_type() {
    let backend = Router::new().route(
        "/set_prompt_template",
        post(|headers: axum::http::HeaderMap, body: Bytes| async move {
            let ct = headers
                .get(header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .unwrap_or("none")
                .to_string();
            format!("{ct}|{}", String::from_utf8_lossy(&body))
        }),
    );
    let backend_url = serve(backend).await;
    let app = gateway(&backend_url, Duration::from_secs(1));

    let req = Request::builder()
        .method("POST")
        .uri("/api/set_prompt_template")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(r#"{"template":"Answer: {query}"}"#))
        .unwrap();
    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = read_body(resp.into_body()).await;
    assert_eq!(body, r#"application/json|{"template":"Answer: {query}"}"#.as_bytes());
}

#[tokio::test]
async fn unknown_endpoint_is_not_forwarded() {
    let app = gateway("http://127.0.0.1:1", Duration::from_secs(1));

    let req = Request::builder()
        .method("GET")
        .uri("/api/drop_all_tables")
        .body(Body::empty())
        .unwrap();
    let resp = app.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    // A POST-only endpoint is not reachable by GET.
    let req = Request::builder()
        .method("GET")
        .uri("/api/upload_source")
        .body(Body::empty())
        .unwrap();
    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn healthz_responds_ok() {
    let app = gateway("http://127.0.0.1:1", Duration::from_secs(1));
    let req = Request::builder()
        .method("GET")
        .uri("/healthz")
        .body(Body::empty())
        .unwrap();
    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = read_body(resp.into_body()).await;
    assert_eq!(body, "ok".as_bytes());
}
