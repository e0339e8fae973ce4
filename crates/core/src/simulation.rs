//! Collaborator contract for long-running simulations.
//!
//! A [`Simulation`] is opaque to the job subsystem: it receives a variable
//! snapshot and a [`Progress`] sink, reports partial results as it goes and
//! checks for interruption at points of its own choosing.

use serde_json::Value;

use crate::variables::VariableStore;

/// Errors a simulation run can end with.
#[derive(Debug, thiserror::Error)]
pub enum SimulationError {
    /// The run observed a cancellation request and stopped early.
    #[error("Execution interrupted")]
    Interrupted,

    /// A variable is missing or has an unusable value.
    #[error("Invalid variable '{name}': {reason}")]
    InvalidVariable { name: String, reason: String },

    /// Any other failure inside the model.
    #[error("Simulation failed: {0}")]
    Failed(String),
}

/// Sink for partial results, handed to [`Simulation::simulate`].
pub trait Progress {
    /// Offer a snapshot. Implementations may drop it unless `force` is set.
    ///
    /// Returns whether the simulation should keep going.
    fn report(&mut self, snapshot: &Value, force: bool) -> bool;

    /// Whether cancellation of this run has been requested.
    fn is_interrupted(&self) -> bool;
}

/// A deterministic, CPU-bound computation over a [`VariableStore`].
pub trait Simulation: Send + Sync + 'static {
    /// Stable name of the function, mixed into every fingerprint.
    fn identity(&self) -> &str;

    /// Variables a fresh session starts with.
    fn default_variables(&self) -> VariableStore;

    /// Run to completion, returning the final result.
    fn simulate(
        &self,
        variables: &VariableStore,
        progress: &mut dyn Progress,
    ) -> Result<Value, SimulationError>;
}
