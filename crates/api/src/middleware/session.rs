//! Session extractor for Axum handlers.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use reina_core::types::SessionId;

use crate::error::AppError;
use crate::session::SharedSession;
use crate::state::AppState;

/// Header carrying the caller's session id.
pub const SESSION_HEADER: &str = "x-session-id";

/// The caller's session, resolved from the `x-session-id` header.
///
/// An unknown but well-formed id starts a new session with default
/// variables. Handlers lock `record` for the whole read-decide-write.
///
/// ```ignore
/// async fn my_handler(session: CallerSession) -> AppResult<Json<()>> {
///     let mut record = session.record.lock().await;
///     record.touch();
///     Ok(Json(()))
/// }
/// ```
#[derive(Clone)]
pub struct CallerSession {
    pub id: SessionId,
    pub record: SharedSession,
}

impl FromRequestParts<AppState> for CallerSession {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(SESSION_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| AppError::BadRequest(format!("Missing {SESSION_HEADER} header")))?;

        let id: SessionId = raw.trim().parse().map_err(|_| {
            AppError::BadRequest(format!("Invalid {SESSION_HEADER} header. Expected a UUID"))
        })?;

        let record = state.sessions.entry(id).await;
        Ok(CallerSession { id, record })
    }
}
