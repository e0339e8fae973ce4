//! Throttled progress publication.
//!
//! A simulation may offer snapshots far faster than any poller can consume
//! them. [`ProgressPublisher`] writes a snapshot to the cache only when it is
//! forced, when it is the first one, or when more than the publish interval
//! has passed since the last accepted write.

use std::sync::Arc;
use std::time::Instant;

use reina_cache::{Clock, ResultCache};
use reina_core::simulation::Progress;
use reina_core::types::JobId;
use serde_json::Value;

use crate::handle::JobHandle;
use crate::worker::{WorkerContext, WorkerSettings};

pub struct ProgressPublisher {
    cache: Arc<dyn ResultCache>,
    clock: Arc<dyn Clock>,
    settings: WorkerSettings,
    job_id: JobId,
    results_key: String,
    claim_key: String,
    kill_key: String,
    last_write: Option<Instant>,
    writes: u64,
}

impl ProgressPublisher {
    pub fn new(handle: &JobHandle, ctx: &WorkerContext) -> Self {
        Self {
            cache: Arc::clone(&ctx.cache),
            clock: Arc::clone(&ctx.clock),
            settings: ctx.settings,
            job_id: handle.id,
            results_key: handle.fingerprint.results_key(),
            claim_key: handle.fingerprint.claim_key(),
            kill_key: handle.kill_signal_key(),
            last_write: None,
            writes: 0,
        }
    }

    /// Number of snapshots actually written.
    pub fn writes(&self) -> u64 {
        self.writes
    }

    fn is_due(&self, now: Instant) -> bool {
        match self.last_write {
            None => true,
            Some(last) => now.duration_since(last) > self.settings.publish_interval,
        }
    }

    /// Keep this job's claim on the fingerprint alive for another TTL.
    fn refresh_claim(&self) {
        let mine = Value::String(self.job_id.to_string());
        let ttl = self.settings.result_ttl;
        match self.cache.get(&self.claim_key) {
            Some(current) if current == mine => self.cache.set(&self.claim_key, mine, ttl),
            Some(_) => {}
            None => {
                self.cache.set_if_absent(&self.claim_key, mine, ttl);
            }
        }
    }
}

impl Progress for ProgressPublisher {
    fn report(&mut self, snapshot: &Value, force: bool) -> bool {
        let now = self.clock.now();
        if force || self.is_due(now) {
            let ttl = self.settings.result_ttl;
            self.cache.set(&self.results_key, snapshot.clone(), ttl);
            self.refresh_claim();
            self.last_write = Some(now);
            self.writes += 1;
            tracing::debug!(job_id = %self.job_id, force, writes = self.writes, "Published snapshot");
        }
        true
    }

    fn is_interrupted(&self) -> bool {
        self.cache.get(&self.kill_key) == Some(Value::Bool(true))
    }
}
