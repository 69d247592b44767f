#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use parking_lot::Mutex;
use tokio::task::JoinHandle;

pub const EPPN: &str = "urn:mace:dir:attribute-def:eduPersonPrincipalName";

pub fn fixture(path: &str) -> String {
    let full = format!("{}/tests/fixtures/{}", env!("CARGO_MANIFEST_DIR"), path);
    std::fs::read_to_string(&full).unwrap_or_else(|e| panic!("read fixture {full}: {e}"))
}

/// Canned behaviour for one mock authority endpoint.
#[derive(Clone)]
pub struct MockReply {
    pub path: &'static str,
    pub body: String,
    pub status: StatusCode,
    pub credentials: Option<(&'static str, &'static str)>,
    pub delay: Option<Duration>,
}

impl MockReply {
    pub fn ok(path: &'static str, body: impl Into<String>) -> Self {
        Self { path, body: body.into(), status: StatusCode::OK, credentials: None, delay: None }
    }

    pub fn with_credentials(mut self, user: &'static str, password: &'static str) -> Self {
        self.credentials = Some((user, password));
        self
    }

    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

struct MockState {
    reply: MockReply,
    hits: AtomicUsize,
    queries: Mutex<Vec<HashMap<String, String>>>,
}

/// In-process attribute authority bound to an ephemeral localhost port. Aborted on drop.
pub struct MockAuthority {
    pub addr: SocketAddr,
    state: Arc<MockState>,
    handle: JoinHandle<()>,
}

impl MockAuthority {
    pub async fn start(reply: MockReply) -> Self {
        let path = reply.path;
        let state = Arc::new(MockState { reply, hits: AtomicUsize::new(0), queries: Mutex::new(Vec::new()) });
        let app = Router::new().route(path, get(serve)).with_state(state.clone());
        let listener = tokio::net::TcpListener::bind(("127.0.0.1", 0)).await.expect("bind 127.0.0.1:0");
        let addr = listener.local_addr().expect("local addr");
        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                eprintln!("mock authority error: {e:?}");
            }
        });
        Self { addr, state, handle }
    }

    pub fn endpoint(&self) -> String { format!("http://{}{}", self.addr, self.state.reply.path) }

    pub fn hits(&self) -> usize { self.state.hits.load(Ordering::SeqCst) }

    pub fn queries(&self) -> Vec<HashMap<String, String>> { self.state.queries.lock().clone() }
}

impl Drop for MockAuthority {
    fn drop(&mut self) { self.handle.abort(); }
}

async fn serve(State(state): State<Arc<MockState>>, headers: HeaderMap, Query(q): Query<HashMap<String, String>>) -> Response {
    state.hits.fetch_add(1, Ordering::SeqCst);
    state.queries.lock().push(q);
    if let Some(delay) = state.reply.delay {
        tokio::time::sleep(delay).await;
    }
    if let Some((user, password)) = state.reply.credentials {
        let expected = format!("Basic {}", STANDARD.encode(format!("{user}:{password}")));
        let got = headers.get(header::AUTHORIZATION).and_then(|v| v.to_str().ok());
        if got != Some(expected.as_str()) {
            return (StatusCode::UNAUTHORIZED, "bad credentials").into_response();
        }
    }
    (state.reply.status, [(header::CONTENT_TYPE, "application/json")], state.reply.body.clone()).into_response()
}
