//! In-process stand-in for the IntegreSQL service.
//!
//! Serves the v1 template/test-database API from memory on a loopback port,
//! on its own tokio runtime thread so tests can use the blocking client.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::thread::JoinHandle;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post, put},
};
use parking_lot::Mutex;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::oneshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateStatus {
    Registering,
    Ready,
    Discarded,
}

#[derive(Debug)]
struct TemplateEntry {
    status: TemplateStatus,
    next_id: i64,
    leased: HashMap<i64, bool>,
}

#[derive(Debug)]
struct ServiceState {
    ready: bool,
    templates: HashMap<String, TemplateEntry>,
}

type Shared = Arc<Mutex<ServiceState>>;

#[derive(Debug)]
pub struct FakeService {
    addr: SocketAddr,
    state: Shared,
    shutdown: Option<oneshot::Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl FakeService {
    pub fn start() -> Self {
        let state: Shared = Arc::new(Mutex::new(ServiceState {
            ready: true,
            templates: HashMap::new(),
        }));
        let (addr_tx, addr_rx) = std::sync::mpsc::channel();
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let app = router(Arc::clone(&state));

        let thread = std::thread::spawn(move || {
            let rt = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .expect("failed to build runtime");
            rt.block_on(async move {
                let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
                    .await
                    .expect("failed to bind");
                addr_tx
                    .send(listener.local_addr().expect("no local addr"))
                    .expect("test dropped");
                axum::serve(listener, app)
                    .with_graceful_shutdown(async {
                        let _ = shutdown_rx.await;
                    })
                    .await
                    .expect("server failed");
            });
        });
        let addr = addr_rx.recv().expect("server did not start");

        Self {
            addr,
            state,
            shutdown: Some(shutdown_tx),
            thread: Some(thread),
        }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}/api", self.addr)
    }

    /// Answer every template/test call with 503 while not ready.
    pub fn set_ready(&self, ready: bool) {
        self.state.lock().ready = ready;
    }

    pub fn template_status(&self, hash: &str) -> Option<TemplateStatus> {
        self.state.lock().templates.get(hash).map(|t| t.status)
    }

    pub fn template_count(&self) -> usize {
        self.state.lock().templates.len()
    }
}

impl Drop for FakeService {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

fn router(state: Shared) -> Router {
    Router::new()
        .route("/api/v1/templates", post(initialize))
        .route("/api/v1/templates/:hash", put(finalize).delete(discard))
        .route("/api/v1/templates/:hash/tests", get(open))
        .route("/api/v1/templates/:hash/tests/:id", delete(mark_unmodified))
        .route("/api/v1/templates/:hash/tests/:id/recreate", post(recreate))
        .route("/api/v1/templates/:hash/tests/:id/unlock", post(unlock))
        .route("/api/v1/admin/templates", delete(reset))
        .with_state(state)
}

fn record(hash: &str, id: Option<i64>) -> serde_json::Value {
    let name = match id {
        Some(id) => format!("integresql_test_{hash}_{id:03}"),
        None => format!("integresql_template_{hash}"),
    };
    let mut value = json!({
        "database": {
            "templateHash": hash,
            "config": {
                "host": "127.0.0.1",
                "port": 5432,
                "username": "test",
                "password": "test",
                "database": name,
            }
        }
    });
    if let Some(id) = id {
        value["id"] = id.into();
    }
    value
}

#[derive(Deserialize)]
struct RegisterBody {
    hash: String,
}

async fn initialize(State(state): State<Shared>, Json(body): Json<RegisterBody>) -> Response {
    let mut state = state.lock();
    if !state.ready {
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    }
    match state.templates.get(&body.hash) {
        Some(entry) if entry.status != TemplateStatus::Discarded => {
            return (StatusCode::LOCKED, "template is already initialized").into_response();
        }
        _ => {}
    }
    state.templates.insert(
        body.hash.clone(),
        TemplateEntry {
            status: TemplateStatus::Registering,
            next_id: 0,
            leased: HashMap::new(),
        },
    );
    (StatusCode::OK, Json(record(&body.hash, None))).into_response()
}

async fn finalize(State(state): State<Shared>, Path(hash): Path<String>) -> Response {
    let mut state = state.lock();
    if !state.ready {
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    }
    match state.templates.get_mut(&hash) {
        Some(entry) if entry.status != TemplateStatus::Discarded => {
            entry.status = TemplateStatus::Ready;
            StatusCode::NO_CONTENT.into_response()
        }
        _ => (StatusCode::NOT_FOUND, "template not found").into_response(),
    }
}

async fn discard(State(state): State<Shared>, Path(hash): Path<String>) -> Response {
    let mut state = state.lock();
    if !state.ready {
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    }
    match state.templates.get_mut(&hash) {
        Some(entry) if entry.status != TemplateStatus::Discarded => {
            entry.status = TemplateStatus::Discarded;
            entry.leased.clear();
            StatusCode::NO_CONTENT.into_response()
        }
        _ => (StatusCode::NOT_FOUND, "template not found").into_response(),
    }
}

async fn open(State(state): State<Shared>, Path(hash): Path<String>) -> Response {
    let mut state = state.lock();
    if !state.ready {
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    }
    let Some(entry) = state.templates.get_mut(&hash) else {
        return (StatusCode::NOT_FOUND, "template not found").into_response();
    };
    match entry.status {
        TemplateStatus::Discarded => (StatusCode::GONE, "template discarded").into_response(),
        TemplateStatus::Registering => StatusCode::SERVICE_UNAVAILABLE.into_response(),
        TemplateStatus::Ready => {
            // reuse a free slot before growing the pool
            let id = match entry.leased.iter().find(|(_, leased)| !**leased) {
                Some((id, _)) => *id,
                None => {
                    entry.next_id += 1;
                    entry.next_id
                }
            };
            entry.leased.insert(id, true);
            (StatusCode::OK, Json(record(&hash, Some(id)))).into_response()
        }
    }
}

/// Return a leased database to the pool. Recreate and unlock only differ in
/// whether the real service rebuilds the database first.
fn release(state: &Shared, hash: &str, id: &str) -> Response {
    let mut state = state.lock();
    if !state.ready {
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    }
    let Ok(id) = id.parse::<i64>() else {
        return (StatusCode::BAD_REQUEST, "invalid test database id").into_response();
    };
    let Some(entry) = state.templates.get_mut(hash) else {
        return (StatusCode::NOT_FOUND, "template not found").into_response();
    };
    match entry.leased.get_mut(&id) {
        Some(leased) if *leased => {
            *leased = false;
            StatusCode::NO_CONTENT.into_response()
        }
        _ => (StatusCode::NOT_FOUND, format!("test database {id} not found")).into_response(),
    }
}

async fn recreate(
    State(state): State<Shared>,
    Path((hash, id)): Path<(String, String)>,
) -> Response {
    release(&state, &hash, &id)
}

async fn unlock(
    State(state): State<Shared>,
    Path((hash, id)): Path<(String, String)>,
) -> Response {
    release(&state, &hash, &id)
}

async fn mark_unmodified(
    State(state): State<Shared>,
    Path((hash, id)): Path<(String, String)>,
) -> Response {
    let mut state = state.lock();
    if !state.ready {
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    }
    let Some(entry) = state.templates.get_mut(&hash) else {
        return (StatusCode::NOT_FOUND, "template not found").into_response();
    };
    let Ok(id) = id.parse::<i64>() else {
        return (StatusCode::NOT_FOUND, "test database not found").into_response();
    };
    match entry.leased.get_mut(&id) {
        Some(leased) if *leased => {
            *leased = false;
            StatusCode::NO_CONTENT.into_response()
        }
        _ => (StatusCode::NOT_FOUND, "test database not found").into_response(),
    }
}

async fn reset(State(state): State<Shared>) -> Response {
    state.lock().templates.clear();
    StatusCode::NO_CONTENT.into_response()
}
