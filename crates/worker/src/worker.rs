//! One simulation run: `SPAWNED -> RUNNING -> {FINISHED | CANCELLED | FAILED}`.
//!
//! The worker task registers itself, runs the simulation on the blocking
//! pool, writes its terminal flag and deregisters. Cancellation is
//! cooperative: [`RunningWorker::cancel`] publishes a kill signal that the
//! simulation observes through [`Progress::is_interrupted`].
//!
//! [`Progress::is_interrupted`]: reina_core::simulation::Progress::is_interrupted

use std::sync::Arc;
use std::time::Duration;

use reina_cache::{Clock, ResultCache};
use reina_core::simulation::{Progress, Simulation, SimulationError};
use reina_core::types::JobId;
use serde_json::Value;
use tokio::task::JoinHandle;
use tokio_util::task::TaskTracker;

use crate::handle::JobHandle;
use crate::publisher::ProgressPublisher;
use crate::registry::JobRegistry;

/// Default lifetime of every cache entry a worker writes.
pub const DEFAULT_RESULT_TTL: Duration = Duration::from_secs(30);

/// Default minimum spacing of non-forced snapshot writes.
pub const DEFAULT_PUBLISH_INTERVAL: Duration = Duration::from_millis(500);

/// Message stored in the failed flag when the simulation panics.
const CRASH_MESSAGE: &str = "The simulation stopped unexpectedly";

#[derive(Debug, Clone, Copy)]
pub struct WorkerSettings {
    pub result_ttl: Duration,
    pub publish_interval: Duration,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            result_ttl: DEFAULT_RESULT_TTL,
            publish_interval: DEFAULT_PUBLISH_INTERVAL,
        }
    }
}

/// Shared resources every worker needs.
#[derive(Clone)]
pub struct WorkerContext {
    pub cache: Arc<dyn ResultCache>,
    pub clock: Arc<dyn Clock>,
    pub registry: Arc<JobRegistry>,
    pub settings: WorkerSettings,
}

/// Terminal state of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerOutcome {
    Finished,
    Cancelled,
    Failed(String),
}

/// A run that has not been started yet.
pub struct Worker {
    handle: JobHandle,
    simulation: Arc<dyn Simulation>,
    ctx: WorkerContext,
}

impl Worker {
    pub fn new(handle: JobHandle, simulation: Arc<dyn Simulation>, ctx: WorkerContext) -> Self {
        Self {
            handle,
            simulation,
            ctx,
        }
    }

    /// Spawn the run on the current tokio runtime.
    pub fn start(self) -> RunningWorker {
        let running = self.running_shell();
        let task = tokio::spawn(self.run());
        running.with_task(task)
    }

    /// Spawn the run on `tracker`, so shutdown can wait for it.
    pub fn start_tracked(self, tracker: &TaskTracker) -> RunningWorker {
        let running = self.running_shell();
        let task = tracker.spawn(self.run());
        running.with_task(task)
    }

    fn running_shell(&self) -> PendingWorker {
        PendingWorker {
            job_id: self.handle.id,
            kill_key: self.handle.kill_signal_key(),
            cache: Arc::clone(&self.ctx.cache),
            ttl: self.ctx.settings.result_ttl,
        }
    }

    async fn run(self) -> WorkerOutcome {
        let Worker {
            handle,
            simulation,
            ctx,
        } = self;
        let job_id = handle.id;
        let fp = handle.fingerprint.clone();
        let ttl = ctx.settings.result_ttl;

        let worker_id = ctx.registry.register(handle.clone()).await;
        tracing::info!(%job_id, %worker_id, fingerprint = %fp, "Worker running");

        let mut publisher = ProgressPublisher::new(&handle, &ctx);

        // Flags left behind by an earlier run of the same inputs. A run told
        // to stop before it got here may have a successor, whose flags stay.
        if !publisher.is_interrupted() {
            ctx.cache.remove(&fp.finished_key());
            ctx.cache.remove(&fp.failed_key());
        }
        let variables = Arc::clone(&handle.variables);
        let joined = tokio::task::spawn_blocking(move || {
            let result = simulation.simulate(&variables, &mut publisher);
            (result, publisher)
        })
        .await;

        let outcome = match joined {
            Ok((Ok(result), mut publisher)) => {
                publisher.report(&result, true);
                ctx.cache.set(&fp.finished_key(), Value::Bool(true), ttl);
                tracing::info!(%job_id, writes = publisher.writes(), "Computation finished");
                WorkerOutcome::Finished
            }
            Ok((Err(SimulationError::Interrupted), _)) => {
                tracing::info!(%job_id, "Computation cancelled");
                WorkerOutcome::Cancelled
            }
            Ok((Err(err), _)) => {
                let message = err.to_string();
                tracing::warn!(%job_id, error = %message, "Computation failed");
                let flag = Value::String(message.clone());
                ctx.cache.set(&fp.failed_key(), flag, ttl);
                WorkerOutcome::Failed(message)
            }
            Err(join_err) => {
                tracing::error!(%job_id, error = %join_err, "Simulation thread crashed");
                let flag = Value::String(CRASH_MESSAGE.into());
                ctx.cache.set(&fp.failed_key(), flag, ttl);
                WorkerOutcome::Failed(CRASH_MESSAGE.into())
            }
        };

        if !release_claim(ctx.cache.as_ref(), &fp.claim_key(), job_id) {
            tracing::debug!(%job_id, "Claim already held by another run");
        }
        ctx.registry.deregister(worker_id).await;
        tracing::info!(%job_id, %worker_id, ?outcome, "Worker exited");

        outcome
    }
}

/// Drop the fingerprint claim if it still names `job_id`.
fn release_claim(cache: &dyn ResultCache, claim_key: &str, job_id: JobId) -> bool {
    cache.remove_if(claim_key, &Value::String(job_id.to_string()))
}

struct PendingWorker {
    job_id: JobId,
    kill_key: String,
    cache: Arc<dyn ResultCache>,
    ttl: Duration,
}

impl PendingWorker {
    fn with_task(self, task: JoinHandle<WorkerOutcome>) -> RunningWorker {
        RunningWorker {
            job_id: self.job_id,
            kill_key: self.kill_key,
            cache: self.cache,
            ttl: self.ttl,
            task,
        }
    }
}

/// Handle to a spawned run.
///
/// Dropping it detaches the run; it keeps going and cleans up after itself.
pub struct RunningWorker {
    job_id: JobId,
    kill_key: String,
    cache: Arc<dyn ResultCache>,
    ttl: Duration,
    task: JoinHandle<WorkerOutcome>,
}

impl RunningWorker {
    /// Request cooperative cancellation. The run may still finish first.
    pub fn cancel(&self) {
        self.cache.set(&self.kill_key, Value::Bool(true), self.ttl);
    }

    /// Wait for the run to reach a terminal state.
    pub async fn join(self) -> WorkerOutcome {
        match self.task.await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!(job_id = %self.job_id, error = %e, "Worker task aborted");
                WorkerOutcome::Failed(CRASH_MESSAGE.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use reina_cache::{MemoryCache, SystemClock};
    use reina_core::fingerprint::{fingerprint, kill_signal_key};
    use reina_core::variables::VariableStore;
    use reina_simulation::SeirModel;
    use serde_json::json;

    fn context() -> WorkerContext {
        WorkerContext {
            cache: Arc::new(MemoryCache::new()),
            clock: Arc::new(SystemClock),
            registry: Arc::new(JobRegistry::new()),
            settings: WorkerSettings::default(),
        }
    }

    fn seir_handle(days: u64) -> (Arc<dyn Simulation>, JobHandle) {
        let model = SeirModel::new();
        let mut vars = model.default_variables();
        vars.set("simulation_days", days);
        vars.remove("interventions");
        let handle = JobHandle::new(fingerprint(model.identity(), &vars), vars);
        (Arc::new(model), handle)
    }

    /// Panics on its first step.
    struct Exploding;

    impl Simulation for Exploding {
        fn identity(&self) -> &str {
            "exploding"
        }
        fn default_variables(&self) -> VariableStore {
            VariableStore::new()
        }
        fn simulate(
            &self,
            _: &VariableStore,
            _: &mut dyn Progress,
        ) -> Result<Value, SimulationError> {
            panic!("boom");
        }
    }

    #[tokio::test]
    async fn finished_run_publishes_final_result_and_flag() {
        let ctx = context();
        let (sim, handle) = seir_handle(45);
        let fp = handle.fingerprint.clone();

        let outcome = Worker::new(handle, sim, ctx.clone()).start().join().await;

        assert_eq!(outcome, WorkerOutcome::Finished);
        let result = ctx.cache.get(&fp.results_key()).unwrap();
        assert_eq!(result["rows"].as_array().unwrap().len(), 45);
        assert!(result.get("summary").is_some(), "final result carries the summary");
        assert_eq!(ctx.cache.get(&fp.finished_key()), Some(json!(true)));
        assert_eq!(ctx.cache.get(&fp.claim_key()), None, "claim released");
        assert!(ctx.registry.is_empty().await);
        assert_eq!(ctx.registry.total_registered(), 1);
    }

    #[tokio::test]
    async fn pre_signalled_run_is_cancelled_without_finishing() {
        let ctx = context();
        let (sim, handle) = seir_handle(300);
        let fp = handle.fingerprint.clone();
        ctx.cache
            .set(&kill_signal_key(handle.id), json!(true), DEFAULT_RESULT_TTL);

        let outcome = Worker::new(handle, sim, ctx.clone()).start().join().await;

        assert_eq!(outcome, WorkerOutcome::Cancelled);
        assert_eq!(ctx.cache.get(&fp.finished_key()), None);
        assert_eq!(ctx.cache.get(&fp.results_key()), None);
        assert!(ctx.registry.is_empty().await, "cancelled worker deregisters");
    }

    #[tokio::test]
    async fn pre_signalled_run_keeps_a_successors_flags() {
        let ctx = context();
        let (sim, handle) = seir_handle(30);
        let fp = handle.fingerprint.clone();
        ctx.cache.set(&kill_signal_key(handle.id), json!(true), DEFAULT_RESULT_TTL);
        ctx.cache.set(&fp.finished_key(), json!(true), DEFAULT_RESULT_TTL);

        let outcome = Worker::new(handle, sim, ctx.clone()).start().join().await;

        assert_eq!(outcome, WorkerOutcome::Cancelled);
        assert_eq!(ctx.cache.get(&fp.finished_key()), Some(json!(true)));
    }

    #[tokio::test]
    async fn cancel_stops_a_slow_run() {
        let ctx = context();
        let model = SeirModel::new().with_pace(Duration::from_millis(5));
        let mut vars = model.default_variables();
        vars.set("simulation_days", 730);
        let handle = JobHandle::new(fingerprint(model.identity(), &vars), vars);
        let fp = handle.fingerprint.clone();

        let running = Worker::new(handle, Arc::new(model), ctx.clone()).start();
        tokio::time::sleep(Duration::from_millis(50)).await;
        running.cancel();

        assert_eq!(running.join().await, WorkerOutcome::Cancelled);
        assert_eq!(ctx.cache.get(&fp.finished_key()), None);
        assert!(ctx.registry.is_empty().await);
    }

    #[tokio::test]
    async fn invalid_variables_mark_the_run_failed() {
        let ctx = context();
        let model = SeirModel::new();
        let mut vars = model.default_variables();
        vars.set("r0", "fast");
        let handle = JobHandle::new(fingerprint(model.identity(), &vars), vars);
        let fp = handle.fingerprint.clone();

        let outcome = Worker::new(handle, Arc::new(model), ctx.clone())
            .start()
            .join()
            .await;

        assert_matches!(outcome, WorkerOutcome::Failed(ref msg) if msg.contains("r0"));
        assert_matches!(ctx.cache.get(&fp.failed_key()), Some(Value::String(_)));
        assert_eq!(ctx.cache.get(&fp.finished_key()), None);
    }

    #[tokio::test]
    async fn panicking_simulation_is_reported_as_failed() {
        let ctx = context();
        let vars = VariableStore::new();
        let handle = JobHandle::new(fingerprint("exploding", &vars), vars);
        let fp = handle.fingerprint.clone();

        let outcome = Worker::new(handle, Arc::new(Exploding), ctx.clone())
            .start()
            .join()
            .await;

        assert_eq!(outcome, WorkerOutcome::Failed(CRASH_MESSAGE.into()));
        assert_eq!(ctx.cache.get(&fp.failed_key()), Some(json!(CRASH_MESSAGE)));
        assert!(ctx.registry.is_empty().await, "cleanup runs after a crash");
    }

    #[tokio::test]
    async fn new_run_clears_stale_terminal_flags() {
        let ctx = context();
        let (sim, handle) = seir_handle(10);
        let fp = handle.fingerprint.clone();
        ctx.cache
            .set(&fp.failed_key(), json!("old failure"), DEFAULT_RESULT_TTL);

        let outcome = Worker::new(handle, sim, ctx.clone()).start().join().await;

        assert_eq!(outcome, WorkerOutcome::Finished);
        assert_eq!(ctx.cache.get(&fp.failed_key()), None);
    }

    #[tokio::test]
    async fn exit_leaves_a_claim_taken_over_by_another_run() {
        let ctx = context();
        let (sim, handle) = seir_handle(10);
        let fp = handle.fingerprint.clone();
        let successor = JobId::new();
        ctx.cache.set(&fp.claim_key(), json!(successor.to_string()), DEFAULT_RESULT_TTL);

        let outcome = Worker::new(handle, sim, ctx.clone()).start().join().await;

        assert_eq!(outcome, WorkerOutcome::Finished);
        assert_eq!(ctx.cache.get(&fp.claim_key()), Some(json!(successor.to_string())));
    }

    #[tokio::test]
    async fn tracked_runs_can_be_awaited_through_the_tracker() {
        let ctx = context();
        let tracker = TaskTracker::new();
        let (sim, handle) = seir_handle(20);
        let fp = handle.fingerprint.clone();

        let _running = Worker::new(handle, sim, ctx.clone()).start_tracked(&tracker);
        tracker.close();
        tracker.wait().await;

        assert_eq!(ctx.cache.get(&fp.finished_key()), Some(json!(true)));
    }
}
