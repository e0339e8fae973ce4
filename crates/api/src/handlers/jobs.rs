//! Read-only view of the job registry.

use axum::extract::State;
use axum::Json;
use reina_core::fingerprint::Fingerprint;
use reina_core::types::{JobId, Timestamp};
use reina_worker::WorkerId;
use serde::Serialize;

use crate::response::DataResponse;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct LiveJob {
    pub worker_id: WorkerId,
    pub job_id: JobId,
    pub fingerprint: Fingerprint,
    pub started_at: Timestamp,
}

#[derive(Debug, Serialize)]
pub struct JobsOverview {
    pub live: Vec<LiveJob>,
    pub total_registered: u64,
    pub total_spawned: u64,
}

/// GET /api/v1/jobs
pub async fn list_jobs(State(state): State<AppState>) -> Json<DataResponse<JobsOverview>> {
    let live = state
        .registry
        .list()
        .await
        .into_iter()
        .map(|(worker_id, handle)| LiveJob {
            worker_id,
            job_id: handle.id,
            fingerprint: handle.fingerprint,
            started_at: handle.started_at,
        })
        .collect();

    Json(DataResponse {
        data: JobsOverview {
            live,
            total_registered: state.registry.total_registered(),
            total_spawned: state.launcher.spawn_count(),
        },
    })
}
