//! Computation identity.
//!
//! A [`Fingerprint`] names "this simulation function with these inputs" and
//! is the namespace for every cache key a run writes. It is the SHA-256 of a
//! canonical JSON document, so it never depends on wall-clock time, process
//! state or map insertion order.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::types::JobId;
use crate::variables::VariableStore;

/// Deterministic identifier of a computation and its full input set.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Latest progress snapshot of the run.
    pub fn results_key(&self) -> String {
        format!("{}-results", self.0)
    }

    /// Set once the run completed normally and its final result was published.
    pub fn finished_key(&self) -> String {
        format!("{}-finished", self.0)
    }

    /// Set when the run terminated abnormally; holds the error message.
    pub fn failed_key(&self) -> String {
        format!("{}-failed", self.0)
    }

    /// Holds the id of the job currently computing this fingerprint.
    pub fn claim_key(&self) -> String {
        format!("{}-claim", self.0)
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Cache key of the advisory cancellation flag for `job_id`.
pub fn kill_signal_key(job_id: JobId) -> String {
    format!("thread-{job_id}-kill")
}

/// Compute the fingerprint of `function_identity` applied to `variables`.
pub fn fingerprint(function_identity: &str, variables: &VariableStore) -> Fingerprint {
    let mut document = serde_json::Map::new();
    document.insert("function".into(), Value::String(function_identity.to_string()));
    document.insert(
        "variables".into(),
        Value::Object(variables.iter().map(|(k, v)| (k.clone(), v.clone())).collect()),
    );
    let canonical = to_canonical_json(&Value::Object(document));
    Fingerprint(sha256_hex(canonical.as_bytes()))
}

/// Serialize `value` with object keys sorted and no whitespace.
pub fn to_canonical_json(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => Value::String(s.clone()).to_string(),
        Value::Array(items) => {
            let items: Vec<String> = items.iter().map(to_canonical_json).collect();
            format!("[{}]", items.join(","))
        }
        Value::Object(map) => {
            let sorted: BTreeMap<&String, String> =
                map.iter().map(|(k, v)| (k, to_canonical_json(v))).collect();
            let items: Vec<String> = sorted
                .into_iter()
                .map(|(k, v)| format!("{}:{v}", Value::String(k.clone())))
                .collect();
            format!("{{{}}}", items.join(","))
        }
    }
}

/// Compute a SHA-256 hex digest of the given bytes.
pub fn sha256_hex(data: &[u8]) -> String {
    let hash = Sha256::digest(data);
    format!("{hash:x}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn vars(pairs: &[(&str, Value)]) -> VariableStore {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn empty_input_produces_known_hash() {
        assert_eq!(
            sha256_hex(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn canonical_json_sorts_nested_keys() {
        let val = json!({ "z": [ { "y": "yes", "b": 1 }, null ], "a": { "x": 10 } });
        assert_eq!(
            to_canonical_json(&val),
            "{\"a\":{\"x\":10},\"z\":[{\"b\":1,\"y\":\"yes\"},null]}"
        );
    }

    #[test]
    fn equal_variable_sets_give_equal_fingerprints() {
        let a = vars(&[("simulation_days", json!(45)), ("r0", json!(2.5))]);
        let b = vars(&[("r0", json!(2.5)), ("simulation_days", json!(45))]);
        assert_eq!(fingerprint("seir", &a), fingerprint("seir", &b));
    }

    #[test]
    fn any_changed_variable_changes_the_fingerprint() {
        let base = vars(&[
            ("simulation_days", json!(45)),
            ("interventions", json!([{"day": 10, "kind": "limit-mobility", "value": 50}])),
        ]);
        let days = vars(&[
            ("simulation_days", json!(90)),
            ("interventions", json!([{"day": 10, "kind": "limit-mobility", "value": 50}])),
        ]);
        let nested = vars(&[
            ("simulation_days", json!(45)),
            ("interventions", json!([{"day": 10, "kind": "limit-mobility", "value": 60}])),
        ]);
        let extra = vars(&[
            ("simulation_days", json!(45)),
            ("interventions", json!([{"day": 10, "kind": "limit-mobility", "value": 50}])),
            ("random_seed", json!(1)),
        ]);

        let fp = fingerprint("seir", &base);
        assert_ne!(fp, fingerprint("seir", &days));
        assert_ne!(fp, fingerprint("seir", &nested));
        assert_ne!(fp, fingerprint("seir", &extra));
    }

    #[test]
    fn function_identity_is_part_of_the_fingerprint() {
        let v = vars(&[("simulation_days", json!(45))]);
        assert_ne!(fingerprint("seir", &v), fingerprint("sir", &v));
    }

    #[test]
    fn keys_share_the_fingerprint_prefix() {
        let fp = fingerprint("seir", &VariableStore::new());
        assert_eq!(fp.as_str().len(), 64);
        assert_eq!(fp.results_key(), format!("{fp}-results"));
        assert_eq!(fp.finished_key(), format!("{fp}-finished"));
        assert_eq!(fp.failed_key(), format!("{fp}-failed"));
        assert_eq!(fp.claim_key(), format!("{fp}-claim"));
    }

    #[test]
    fn kill_signal_key_names_the_job() {
        let id = JobId::new();
        assert_eq!(kill_signal_key(id), format!("thread-{id}-kill"));
    }
}
