//! Route definitions for the `/simulations` resource.
//!
//! All endpoints require the `x-session-id` header.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::simulations;
use crate::state::AppState;

/// Routes mounted at `/simulations`.
///
/// ```text
/// POST   /run      -> run_simulation
/// GET    /poll     -> poll_simulation
/// POST   /cancel   -> cancel_simulation
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/run", post(simulations::run_simulation))
        .route("/poll", get(simulations::poll_simulation))
        .route("/cancel", post(simulations::cancel_simulation))
}
