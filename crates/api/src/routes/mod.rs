//! Route tables, one module per resource.

pub mod health;
pub mod sessions;
pub mod simulations;

use axum::routing::get;
use axum::Router;

use crate::handlers;
use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// ```text
/// POST   /sessions                  -> create_session
/// GET    /session/variables         -> get_variables
/// PATCH  /session/variables         -> patch_variables
/// DELETE /session/variables         -> reset_variables
/// POST   /simulations/run           -> run_simulation
/// GET    /simulations/poll          -> poll_simulation
/// POST   /simulations/cancel        -> cancel_simulation
/// GET    /jobs                      -> list_jobs
/// GET    /cache/stats               -> cache_stats
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/sessions", sessions::router())
        .nest("/session", sessions::session_router())
        .nest("/simulations", simulations::router())
        .route("/jobs", get(handlers::jobs::list_jobs))
        .route("/cache/stats", get(handlers::cache::cache_stats))
}
