#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::body::Body;
use axum::http::{Method, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use reina_api::config::{JobConfig, ServerConfig};
use reina_api::router::build_app_router;
use reina_api::state::AppState;
use reina_core::simulation::{Progress, Simulation, SimulationError};
use reina_core::variables::VariableStore;
use reina_simulation::SeirModel;
use serde_json::{json, Value};
use tower::ServiceExt;

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 5,
        sweep_interval_secs: 10,
        session_idle_secs: 3600,
        simulation_pace_ms: 0,
        jobs: JobConfig::default(),
    }
}

/// State around an unpaced SEIR model.
pub fn test_state() -> AppState {
    AppState::new(test_config(), Arc::new(SeirModel::new()))
}

/// Build the full application router with all middleware layers.
pub fn build_test_app(state: AppState) -> Router {
    let config = state.config.clone();
    build_app_router(state, &config)
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

async fn send(
    app: Router,
    method: Method,
    uri: &str,
    session: Option<&str>,
    body: Option<Value>,
) -> Response<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(session) = session {
        builder = builder.header("x-session-id", session);
    }
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    app.oneshot(request).await.unwrap()
}

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    send(app, Method::GET, uri, None, None).await
}

pub async fn post_json(app: Router, uri: &str, body: Value) -> Response<Body> {
    send(app, Method::POST, uri, None, Some(body)).await
}

pub async fn session_get(app: Router, uri: &str, session: &str) -> Response<Body> {
    send(app, Method::GET, uri, Some(session), None).await
}

pub async fn session_post(app: Router, uri: &str, session: &str) -> Response<Body> {
    send(app, Method::POST, uri, Some(session), None).await
}

pub async fn session_post_json(
    app: Router,
    uri: &str,
    session: &str,
    body: Value,
) -> Response<Body> {
    send(app, Method::POST, uri, Some(session), Some(body)).await
}

pub async fn session_patch_json(
    app: Router,
    uri: &str,
    session: &str,
    body: Value,
) -> Response<Body> {
    send(app, Method::PATCH, uri, Some(session), Some(body)).await
}

pub async fn session_delete(app: Router, uri: &str, session: &str) -> Response<Body> {
    send(app, Method::DELETE, uri, Some(session), None).await
}

/// Collect a response body and parse it as JSON.
pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// Mint a session and return its id.
pub async fn new_session(app: Router) -> String {
    let response = post_json(app, "/api/v1/sessions", json!({})).await;
    let json = body_json(response).await;
    json["data"]["session_id"].as_str().unwrap().to_string()
}

/// Poll until the run reports `status`, returning the poll payload.
pub async fn poll_until(app: Router, session: &str, status: &str) -> Value {
    for _ in 0..500 {
        let response = session_get(app.clone(), "/api/v1/simulations/poll", session).await;
        if response.status() == axum::http::StatusCode::OK {
            let json = body_json(response).await;
            if json["data"]["status"] == status {
                return json["data"].clone();
            }
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("run never reached status {status}");
}

// ---------------------------------------------------------------------------
// Gated simulation
// ---------------------------------------------------------------------------

/// Longest a gated run waits before giving up.
pub const GATE_TIMEOUT: Duration = Duration::from_secs(5);

/// Publishes nothing until its gate opens, then returns `{"label": ...}`.
///
/// Stops early when interrupted. Fails once the gate stays shut for
/// [`GATE_TIMEOUT`] so no test leaves a blocking thread behind.
#[derive(Clone, Default)]
pub struct GatedSimulation {
    gate: Arc<AtomicBool>,
}

impl GatedSimulation {
    pub fn open(&self) {
        self.gate.store(true, Ordering::SeqCst);
    }
}

impl Simulation for GatedSimulation {
    fn identity(&self) -> &str {
        "test.gated"
    }

    fn default_variables(&self) -> VariableStore {
        let mut vars = VariableStore::new();
        vars.set("label", "a");
        vars
    }

    fn simulate(
        &self,
        variables: &VariableStore,
        progress: &mut dyn Progress,
    ) -> Result<Value, SimulationError> {
        let started = Instant::now();
        while !self.gate.load(Ordering::SeqCst) {
            if progress.is_interrupted() {
                return Err(SimulationError::Interrupted);
            }
            if started.elapsed() > GATE_TIMEOUT {
                return Err(SimulationError::Failed("gate never opened".into()));
            }
            std::thread::sleep(Duration::from_millis(1));
        }
        if progress.is_interrupted() {
            return Err(SimulationError::Interrupted);
        }
        let label = variables.get("label").cloned().unwrap_or(Value::Null);
        Ok(json!({ "label": label }))
    }
}

/// State and gate handle around a [`GatedSimulation`].
pub fn gated_state() -> (AppState, GatedSimulation) {
    let simulation = GatedSimulation::default();
    let state = AppState::new(test_config(), Arc::new(simulation.clone()));
    (state, simulation)
}
