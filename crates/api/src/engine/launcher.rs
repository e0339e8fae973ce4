//! Launch orchestration.
//!
//! [`Launcher::start_run`] runs the decision sequence for one request:
//! apply the request to the session's variables, reuse a finished result,
//! honour the preset-only restriction, join a run that already claimed the
//! fingerprint, or spawn a fresh worker. Several sessions may be bound to
//! one job. When a session's binding moves away from a job and no other
//! session is left on it, that job is sent a kill signal.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use reina_core::error::CoreError;
use reina_core::fingerprint::{fingerprint, kill_signal_key, Fingerprint};
use reina_core::simulation::Simulation;
use reina_core::types::{JobId, SessionId};
use reina_simulation::params::MAX_SIMULATION_DAYS;
use reina_worker::{JobHandle, Worker, WorkerContext};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio_util::task::TaskTracker;
use validator::Validate;

use crate::config::JobConfig;
use crate::session::SessionRecord;

/// Body of `POST /simulations/run`.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct RunRequest {
    #[validate(range(min = 1, max = MAX_SIMULATION_DAYS))]
    pub simulation_days: Option<u64>,
    pub random_seed: Option<u64>,
    /// Variable overrides merged into the session before fingerprinting.
    pub variables: Option<BTreeMap<String, Value>>,
}

/// Result of [`Launcher::start_run`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum LaunchOutcome {
    /// A finished result for these inputs is cached; nothing was spawned.
    Reused {
        fingerprint: Fingerprint,
        result: Value,
    },
    /// The session is bound to a run computing these inputs.
    Started {
        job_id: JobId,
        fingerprint: Fingerprint,
        poll_interval_ms: u64,
        max_polls: u32,
        /// The run was already in flight for another request.
        shared: bool,
    },
    /// New computations are disabled.
    Busy,
}

pub struct Launcher {
    simulation: Arc<dyn Simulation>,
    ctx: WorkerContext,
    config: JobConfig,
    tracker: TaskTracker,
    spawns: AtomicU64,
    /// Number of sessions bound to each job.
    binders: Mutex<HashMap<JobId, usize>>,
}

impl Launcher {
    pub fn new(simulation: Arc<dyn Simulation>, ctx: WorkerContext, config: JobConfig) -> Self {
        Self {
            simulation,
            ctx,
            config,
            tracker: TaskTracker::new(),
            spawns: AtomicU64::new(0),
            binders: Mutex::new(HashMap::new()),
        }
    }

    /// Number of workers spawned since startup.
    pub fn spawn_count(&self) -> u64 {
        self.spawns.load(Ordering::Relaxed)
    }

    /// Fingerprint of the configured simulation over `record`'s variables.
    pub fn fingerprint_of(&self, record: &SessionRecord) -> Fingerprint {
        fingerprint(self.simulation.identity(), &record.variables)
    }

    pub fn start_run(
        &self,
        session_id: SessionId,
        record: &mut SessionRecord,
        request: RunRequest,
    ) -> Result<LaunchOutcome, CoreError> {
        request
            .validate()
            .map_err(|e| CoreError::Validation(e.to_string()))?;
        record.touch();
        apply_request(record, request);

        let fp = self.fingerprint_of(record);
        let cache = self.ctx.cache.as_ref();

        if cache.get(&fp.finished_key()) == Some(Value::Bool(true)) {
            if let Some(result) = cache.get(&fp.results_key()) {
                tracing::info!(%session_id, fingerprint = %fp, "Reusing cached result");
                return Ok(LaunchOutcome::Reused {
                    fingerprint: fp,
                    result,
                });
            }
        }

        if self.config.restrict_to_preset_scenarios {
            tracing::info!(%session_id, fingerprint = %fp, "New computation refused");
            return Ok(LaunchOutcome::Busy);
        }

        let handle = JobHandle::new(fp.clone(), record.variables.clone());
        let claimed = cache.set_if_absent(
            &fp.claim_key(),
            Value::String(handle.id.to_string()),
            self.config.cache_ttl,
        );
        if !claimed {
            let owner = self
                .claim_owner(&fp)
                .filter(|owner| !self.is_signalled(*owner));
            if let Some(owner) = owner {
                self.rebind(session_id, record, owner);
                tracing::info!(%session_id, job_id = %owner, fingerprint = %fp, "Joined run in flight");
                return Ok(self.started(owner, fp, true));
            }
            // The claim expired between the two reads, or its job was told to stop.
            cache.set(
                &fp.claim_key(),
                Value::String(handle.id.to_string()),
                self.config.cache_ttl,
            );
        }

        // A poll arriving before the worker starts must not see the last failure.
        cache.remove(&fp.failed_key());

        let job_id = handle.id;
        self.rebind(session_id, record, job_id);
        Worker::new(handle, Arc::clone(&self.simulation), self.ctx.clone())
            .start_tracked(&self.tracker);
        self.spawns.fetch_add(1, Ordering::Relaxed);
        tracing::info!(%session_id, %job_id, fingerprint = %fp, "Spawned worker");

        Ok(self.started(job_id, fp, false))
    }

    /// Clear the session's binding. The job is signalled to stop unless
    /// another session is still bound to it.
    ///
    /// Returns whether a job was bound.
    pub fn cancel_run(&self, session_id: SessionId, record: &mut SessionRecord) -> bool {
        record.touch();
        let Some(job_id) = record.job_id.take() else {
            return false;
        };
        if self.unbind(job_id) {
            self.signal_kill(job_id);
            tracing::info!(%session_id, %job_id, "Run cancelled by caller");
        } else {
            tracing::info!(%session_id, %job_id, "Caller left a shared run");
        }
        true
    }

    /// Forget the binding of a session that no longer exists. The job keeps
    /// running so its result can still be reused.
    pub fn release_binding(&self, job_id: JobId) {
        self.unbind(job_id);
    }

    /// Number of sessions bound to `job_id`.
    pub fn binder_count(&self, job_id: JobId) -> usize {
        self.binders().get(&job_id).copied().unwrap_or(0)
    }

    /// Signal every live worker to stop and wait up to `timeout` for all
    /// spawned workers to exit. Returns whether they all did.
    pub async fn shutdown(&self, timeout: Duration) -> bool {
        let live = self.ctx.registry.list().await;
        tracing::info!(live = live.len(), "Stopping live workers");
        for (_, handle) in &live {
            self.signal_kill(handle.id);
        }

        self.tracker.close();
        match tokio::time::timeout(timeout, self.tracker.wait()).await {
            Ok(()) => true,
            Err(_) => {
                tracing::warn!(
                    remaining = self.tracker.len(),
                    "Workers still running after shutdown timeout"
                );
                false
            }
        }
    }

    fn claim_owner(&self, fp: &Fingerprint) -> Option<JobId> {
        self.ctx
            .cache
            .get(&fp.claim_key())
            .and_then(|v| v.as_str().and_then(|s| s.parse().ok()))
    }

    fn is_signalled(&self, job_id: JobId) -> bool {
        self.ctx.cache.get(&kill_signal_key(job_id)) == Some(Value::Bool(true))
    }

    /// Point the session at `job_id`. The job it was bound to before is
    /// killed once no session is left on it.
    fn rebind(&self, session_id: SessionId, record: &mut SessionRecord, job_id: JobId) {
        let previous = record.job_id.replace(job_id);
        if previous == Some(job_id) {
            return;
        }
        *self.binders().entry(job_id).or_default() += 1;
        if let Some(previous) = previous {
            if self.unbind(previous) {
                self.signal_kill(previous);
                tracing::debug!(%session_id, job_id = %previous, "Superseded run signalled");
            }
        }
    }

    /// Drop one binder of `job_id`. Returns whether it was the last one.
    fn unbind(&self, job_id: JobId) -> bool {
        let mut binders = self.binders();
        let Some(count) = binders.get_mut(&job_id) else {
            return true;
        };
        if *count > 1 {
            *count -= 1;
            return false;
        }
        binders.remove(&job_id);
        true
    }

    fn binders(&self) -> MutexGuard<'_, HashMap<JobId, usize>> {
        self.binders.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn signal_kill(&self, job_id: JobId) {
        self.ctx
            .cache
            .set(&kill_signal_key(job_id), Value::Bool(true), self.config.cache_ttl);
    }

    fn started(&self, job_id: JobId, fingerprint: Fingerprint, shared: bool) -> LaunchOutcome {
        LaunchOutcome::Started {
            job_id,
            fingerprint,
            poll_interval_ms: self.config.poll_interval_ms,
            max_polls: self.config.max_polls,
            shared,
        }
    }
}

fn apply_request(record: &mut SessionRecord, request: RunRequest) {
    if let Some(overrides) = request.variables {
        record.variables.merge(overrides);
    }
    if let Some(days) = request.simulation_days {
        record.variables.set("simulation_days", days);
    }
    if let Some(seed) = request.random_seed {
        record.variables.set("random_seed", seed);
    }
}
