//! Handlers for the `/simulations` resource.
//!
//! Every endpoint acts on the caller's session, identified by the
//! `x-session-id` header via [`CallerSession`].

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use reina_core::error::CoreError;

use crate::engine::launcher::{LaunchOutcome, RunRequest};
use crate::engine::poll::{poll, PollView};
use crate::error::AppResult;
use crate::middleware::session::CallerSession;
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Run
// ---------------------------------------------------------------------------

/// POST /api/v1/simulations/run
///
/// Start (or reuse) a computation for the session's variables with the
/// request's overrides applied. Returns 202 when the session is now bound
/// to a run, 200 for a reused result or a busy refusal.
pub async fn run_simulation(
    session: CallerSession,
    State(state): State<AppState>,
    Json(input): Json<RunRequest>,
) -> AppResult<impl IntoResponse> {
    let mut record = session.record.lock().await;
    let outcome = state.launcher.start_run(session.id, &mut record, input)?;

    let status = match outcome {
        LaunchOutcome::Started { .. } => StatusCode::ACCEPTED,
        LaunchOutcome::Reused { .. } | LaunchOutcome::Busy => StatusCode::OK,
    };

    Ok((status, Json(DataResponse { data: outcome })))
}

// ---------------------------------------------------------------------------
// Poll
// ---------------------------------------------------------------------------

/// GET /api/v1/simulations/poll
///
/// Latest state of the session's bound run. Returns 204 with no body when
/// the session has no bound run.
pub async fn poll_simulation(
    session: CallerSession,
    State(state): State<AppState>,
) -> AppResult<Response> {
    let mut record = session.record.lock().await;
    record.touch();
    let fp = state.launcher.fingerprint_of(&record);

    let outcome = poll(state.cache.as_ref(), &record, &fp);
    match PollView::from_outcome(outcome) {
        None => {
            tracing::debug!(session_id = %session.id, "Poll declined, no bound run");
            Ok(StatusCode::NO_CONTENT.into_response())
        }
        Some(view) => Ok(Json(DataResponse { data: view }).into_response()),
    }
}

// ---------------------------------------------------------------------------
// Cancel
// ---------------------------------------------------------------------------

/// POST /api/v1/simulations/cancel
///
/// Ask the session's bound run to stop and clear the binding. Returns 204,
/// or 409 when nothing is bound.
pub async fn cancel_simulation(
    session: CallerSession,
    State(state): State<AppState>,
) -> AppResult<StatusCode> {
    let mut record = session.record.lock().await;
    if state.launcher.cancel_run(session.id, &mut record) {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(CoreError::Conflict("No simulation is bound to this session".into()).into())
    }
}
