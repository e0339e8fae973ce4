use std::sync::Arc;

use reina_cache::{MemoryCache, ResultCache, SystemClock};
use reina_core::simulation::Simulation;
use reina_worker::{JobRegistry, WorkerContext};

use crate::config::ServerConfig;
use crate::engine::launcher::Launcher;
use crate::session::SessionStore;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc`).
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    /// Progress channel between workers and pollers.
    pub cache: Arc<dyn ResultCache>,
    /// Live workers, for introspection only.
    pub registry: Arc<JobRegistry>,
    pub sessions: Arc<SessionStore>,
    pub launcher: Arc<Launcher>,
}

impl AppState {
    /// Wire up a fresh in-memory cache, registry and session store around
    /// `simulation`.
    pub fn new(config: ServerConfig, simulation: Arc<dyn Simulation>) -> Self {
        let clock = Arc::new(SystemClock);
        let cache: Arc<dyn ResultCache> = Arc::new(MemoryCache::with_clock(clock.clone()));
        let registry = Arc::new(JobRegistry::new());

        let ctx = WorkerContext {
            cache: Arc::clone(&cache),
            clock,
            registry: Arc::clone(&registry),
            settings: config.jobs.worker_settings(),
        };
        let sessions = Arc::new(SessionStore::new(simulation.default_variables()));
        let launcher = Arc::new(Launcher::new(simulation, ctx, config.jobs.clone()));

        Self {
            config: Arc::new(config),
            cache,
            registry,
            sessions,
            launcher,
        }
    }
}
