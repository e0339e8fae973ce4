use axum::routing::{get, post};
use axum::Router;

use crate::handlers::sessions;
use crate::state::AppState;

/// Routes mounted at `/sessions`.
pub fn router() -> Router<AppState> {
    Router::new().route("/", post(sessions::create_session))
}

/// Routes mounted at `/session`, acting on the caller's own session.
///
/// ```text
/// GET    /variables   -> get_variables
/// PATCH  /variables   -> patch_variables
/// DELETE /variables   -> reset_variables
/// ```
pub fn session_router() -> Router<AppState> {
    Router::new().route(
        "/variables",
        get(sessions::get_variables)
            .patch(sessions::patch_variables)
            .delete(sessions::reset_variables),
    )
}
