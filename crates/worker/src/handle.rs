use std::sync::Arc;

use reina_core::fingerprint::{self, Fingerprint};
use reina_core::types::{JobId, Timestamp};
use reina_core::variables::VariableStore;

/// Identity of one worker run.
#[derive(Debug, Clone)]
pub struct JobHandle {
    pub id: JobId,
    /// Cache namespace of everything this run writes.
    pub fingerprint: Fingerprint,
    pub started_at: Timestamp,
    /// Snapshot of the caller's variables taken at spawn.
    pub variables: Arc<VariableStore>,
}

impl JobHandle {
    /// Create a handle for a run over `variables`, whose fingerprint the
    /// caller has already computed.
    pub fn new(fingerprint: Fingerprint, variables: VariableStore) -> Self {
        Self {
            id: JobId::new(),
            fingerprint,
            started_at: chrono::Utc::now(),
            variables: Arc::new(variables),
        }
    }

    /// Cache key of this run's cancellation flag.
    pub fn kill_signal_key(&self) -> String {
        fingerprint::kill_signal_key(self.id)
    }
}
