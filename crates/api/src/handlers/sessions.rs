//! Handlers for sessions and their variable stores.

use std::collections::BTreeMap;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use reina_core::types::SessionId;
use reina_core::variables::VariableStore;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use validator::Validate;

use crate::error::AppResult;
use crate::middleware::session::CallerSession;
use crate::response::DataResponse;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct CreatedSession {
    pub session_id: SessionId,
    pub variables: VariableStore,
}

/// Body of `PATCH /session/variables`.
#[derive(Debug, Deserialize, Validate)]
pub struct PatchVariables {
    #[validate(length(min = 1, message = "at least one variable is required"))]
    pub variables: BTreeMap<String, Value>,
}

/// POST /api/v1/sessions
///
/// Mint a session id for use in the `x-session-id` header. Returns 201.
pub async fn create_session(State(state): State<AppState>) -> impl IntoResponse {
    let (session_id, record) = state.sessions.create().await;
    let variables = record.lock().await.variables.clone();
    tracing::info!(%session_id, "Session created");

    (
        StatusCode::CREATED,
        Json(DataResponse {
            data: CreatedSession {
                session_id,
                variables,
            },
        }),
    )
}

/// GET /api/v1/session/variables
pub async fn get_variables(session: CallerSession) -> Json<DataResponse<VariableStore>> {
    let mut record = session.record.lock().await;
    record.touch();
    Json(DataResponse {
        data: record.variables.clone(),
    })
}

/// PATCH /api/v1/session/variables
///
/// Merge the given overrides into the session's variables. The session's
/// bound run is left alone.
pub async fn patch_variables(
    session: CallerSession,
    Json(input): Json<PatchVariables>,
) -> AppResult<Json<DataResponse<VariableStore>>> {
    input.validate()?;

    let mut record = session.record.lock().await;
    record.touch();
    record.variables.merge(input.variables);

    Ok(Json(DataResponse {
        data: record.variables.clone(),
    }))
}

/// DELETE /api/v1/session/variables
///
/// Reset the session's variables to the model defaults.
pub async fn reset_variables(
    session: CallerSession,
    State(state): State<AppState>,
) -> Json<DataResponse<VariableStore>> {
    let mut record = session.record.lock().await;
    record.touch();
    record.variables = state.sessions.defaults().clone();
    tracing::debug!(session_id = %session.id, "Session variables reset");

    Json(DataResponse {
        data: record.variables.clone(),
    })
}
