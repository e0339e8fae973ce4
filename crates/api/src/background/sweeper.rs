//! Periodic housekeeping.
//!
//! Expired cache entries are dropped lazily on read; this loop also drops
//! the ones nobody reads again, together with sessions that went idle.
//! A dropped session's job binding is released with it.

use std::sync::Arc;
use std::time::Duration;

use reina_cache::ResultCache;
use tokio_util::sync::CancellationToken;

use crate::engine::launcher::Launcher;
use crate::session::SessionStore;

/// Run the sweep loop until `cancel` is triggered.
pub async fn run(
    cache: Arc<dyn ResultCache>,
    sessions: Arc<SessionStore>,
    launcher: Arc<Launcher>,
    every: Duration,
    session_idle: Duration,
    cancel: CancellationToken,
) {
    let max_idle =
        chrono::Duration::from_std(session_idle).unwrap_or_else(|_| chrono::Duration::days(36_500));
    tracing::info!(
        interval_secs = every.as_secs(),
        session_idle_secs = session_idle.as_secs(),
        "Sweeper started"
    );

    let mut interval = tokio::time::interval(every);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Sweeper stopping");
                break;
            }
            _ = interval.tick() => {
                sweep_once(cache.as_ref(), &sessions, &launcher, max_idle).await;
            }
        }
    }
}

/// One housekeeping pass. Returns `(expired entries, idle sessions)` removed.
pub async fn sweep_once(
    cache: &dyn ResultCache,
    sessions: &SessionStore,
    launcher: &Launcher,
    max_idle: chrono::Duration,
) -> (usize, usize) {
    let expired = cache.purge_expired();
    let dropped = sessions.remove_idle(max_idle).await;
    for job_id in dropped.iter().flatten() {
        launcher.release_binding(*job_id);
    }
    let idle = dropped.len();
    if expired > 0 || idle > 0 {
        tracing::debug!(expired, idle, "Sweep removed stale state");
    }
    (expired, idle)
}
