use axum::extract::State;
use axum::Json;
use reina_cache::CacheStatsSnapshot;
use serde::Serialize;

use crate::response::DataResponse;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct CacheOverview {
    pub entries: usize,
    pub hit_rate: f64,
    #[serde(flatten)]
    pub counters: CacheStatsSnapshot,
}

/// GET /api/v1/cache/stats
pub async fn cache_stats(State(state): State<AppState>) -> Json<DataResponse<CacheOverview>> {
    let counters = state.cache.stats();
    Json(DataResponse {
        data: CacheOverview {
            entries: state.cache.len(),
            hit_rate: counters.hit_rate(),
            counters,
        },
    })
}
