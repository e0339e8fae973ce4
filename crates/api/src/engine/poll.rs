use reina_cache::ResultCache;
use reina_core::fingerprint::Fingerprint;
use serde::Serialize;
use serde_json::Value;

use crate::session::SessionRecord;

/// Answer to one poll.
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    /// The session has no bound run; polling is not allowed.
    Declined,
    /// Nothing has been published for these inputs yet.
    Pending,
    /// The run terminated abnormally.
    Failed { error: String },
    /// Latest published snapshot.
    Snapshot { snapshot: Value, done: bool },
}

/// Read the cache state of the run computing `fp`, if `record` may poll.
///
/// `fp` must be the fingerprint of the session's current variables.
pub fn poll(cache: &dyn ResultCache, record: &SessionRecord, fp: &Fingerprint) -> PollOutcome {
    if record.job_id.is_none() {
        return PollOutcome::Declined;
    }

    if let Some(failed) = cache.get(&fp.failed_key()) {
        let error = match failed {
            Value::String(message) => message,
            other => other.to_string(),
        };
        return PollOutcome::Failed { error };
    }

    match cache.get(&fp.results_key()) {
        None => PollOutcome::Pending,
        Some(snapshot) => PollOutcome::Snapshot {
            snapshot,
            done: cache.get(&fp.finished_key()) == Some(Value::Bool(true)),
        },
    }
}

/// JSON body of a non-declined poll.
#[derive(Debug, Serialize)]
pub struct PollView {
    pub status: &'static str,
    pub done: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snapshot: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PollView {
    /// `None` for [`PollOutcome::Declined`], which has no body.
    pub fn from_outcome(outcome: PollOutcome) -> Option<Self> {
        let view = match outcome {
            PollOutcome::Declined => return None,
            PollOutcome::Pending => PollView {
                status: "pending",
                done: false,
                snapshot: None,
                error: None,
            },
            PollOutcome::Failed { error } => PollView {
                status: "failed",
                done: true,
                snapshot: None,
                error: Some(error),
            },
            PollOutcome::Snapshot { snapshot, done } => PollView {
                status: if done { "finished" } else { "running" },
                done,
                snapshot: Some(snapshot),
                error: None,
            },
        };
        Some(view)
    }
}
