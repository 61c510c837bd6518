use axum::extract::{OriginalUri, State};
use axum::{
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{any, get},
    Router,
};
use http::Method;
use std::net::TcpListener;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio::time::{sleep, Duration};

/// Credentials `/auth` accepts: `replay:secret`.
pub const AUTH_USER: &str = "replay";
pub const AUTH_PASSWORD: &str = "secret";
const AUTH_HEADER: &str = "Basic cmVwbGF5OnNlY3JldA==";

#[derive(Clone, Default)]
struct Hits(Arc<AtomicUsize>);

pub struct TestServer {
    pub base_url: String,
    hits: Arc<AtomicUsize>,
    shutdown_tx: oneshot::Sender<()>,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    /// Requests received so far, on any route.
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }

    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(());
        let _ = self.handle.await;
    }
}

async fn ok() -> impl IntoResponse {
    "ok"
}

async fn err() -> impl IntoResponse {
    (StatusCode::INTERNAL_SERVER_ERROR, "fail")
}

// /sleep/150
async fn sleep_ms(axum::extract::Path(ms): axum::extract::Path<u64>) -> impl IntoResponse {
    sleep(Duration::from_millis(ms)).await;
    "slept"
}

// 200 only for form-encoded POSTs
async fn form(method: Method, headers: HeaderMap, body: String) -> impl IntoResponse {
    let is_form = headers
        .get(header::CONTENT_TYPE)
        .is_some_and(|v| v == "application/x-www-form-urlencoded");
    match (method == Method::POST, is_form) {
        (true, true) if !body.is_empty() => StatusCode::OK,
        _ => StatusCode::UNSUPPORTED_MEDIA_TYPE,
    }
}

async fn auth(headers: HeaderMap) -> impl IntoResponse {
    match headers.get(header::AUTHORIZATION) {
        Some(v) if v == AUTH_HEADER => StatusCode::OK,
        _ => StatusCode::UNAUTHORIZED,
    }
}

// /ua/curl → 200 when User-Agent is exactly "curl"
async fn user_agent(axum::extract::Path(expected): axum::extract::Path<String>, headers: HeaderMap) -> impl IntoResponse {
    match headers.get(header::USER_AGENT) {
        Some(v) if v == expected.as_str() => StatusCode::OK,
        _ => StatusCode::BAD_REQUEST,
    }
}

async fn count(State(hits): State<Hits>, request: axum::extract::Request, next: axum::middleware::Next) -> axum::response::Response {
    hits.0.fetch_add(1, Ordering::SeqCst);
    next.run(request).await
}

/// Starts the target server on a random local port. Must be called from
/// within a tokio runtime.
pub fn spawn_test_server() -> TestServer {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    listener.set_nonblocking(true).unwrap();
    let addr = listener.local_addr().unwrap();
    let base_url = format!("http://{}", addr);

    async fn fallback(method: Method, uri: OriginalUri) -> String {
        format!("fallback: {} {}", method, uri.0)
    }

    let hits = Hits::default();
    let app = Router::new()
        .route("/ok", any(ok))
        .route("/err", any(err))
        .route("/sleep/{ms}", any(sleep_ms))
        .route("/form", any(form))
        .route("/auth", get(auth))
        .route("/ua/{expected}", get(user_agent))
        .fallback(fallback)
        .layer(axum::middleware::from_fn_with_state(hits.clone(), count));

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    let handle = tokio::spawn(async move {
        let server = axum::serve(
            tokio::net::TcpListener::from_std(listener).unwrap(),
            app,
        )
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            });

        server.await.unwrap();
    });

    TestServer { base_url, hits: hits.0, shutdown_tx, handle }
}

/// URL of a local port nothing listens on, so every connection is refused.
pub fn refused_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}", addr)
}
