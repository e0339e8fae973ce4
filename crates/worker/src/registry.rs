use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;
use tokio::sync::RwLock;

use crate::handle::JobHandle;

/// Arena slot of a live worker. Allocated on registration, never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct WorkerId(u64);

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "w{}", self.0)
    }
}

/// Table of live workers.
///
/// Only a worker inserts or removes its own entry; everyone else reads.
/// Created once by the boot context and shared via `Arc`.
pub struct JobRegistry {
    jobs: RwLock<HashMap<WorkerId, JobHandle>>,
    next_id: AtomicU64,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self {
            jobs: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Insert `handle` under a fresh worker id.
    pub async fn register(&self, handle: JobHandle) -> WorkerId {
        let id = WorkerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.jobs.write().await.insert(id, handle);
        id
    }

    /// Remove the entry of `id`, returning its handle.
    pub async fn deregister(&self, id: WorkerId) -> Option<JobHandle> {
        self.jobs.write().await.remove(&id)
    }

    /// Live workers, oldest first.
    pub async fn list(&self) -> Vec<(WorkerId, JobHandle)> {
        let mut jobs: Vec<_> = self
            .jobs
            .read()
            .await
            .iter()
            .map(|(id, handle)| (*id, handle.clone()))
            .collect();
        jobs.sort_by_key(|(id, _)| *id);
        jobs
    }

    /// Number of live workers.
    pub async fn len(&self) -> usize {
        self.jobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.jobs.read().await.is_empty()
    }

    /// Number of workers that ever registered.
    pub fn total_registered(&self) -> u64 {
        self.next_id.load(Ordering::Relaxed) - 1
    }
}

impl Default for JobRegistry {
    fn default() -> Self {
        Self::new()
    }
}
