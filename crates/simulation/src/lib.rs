//! Built-in epidemic model.
//!
//! A compact, seeded SEIR compartment model so the job service can run end to
//! end. The job subsystem treats it like any other [`Simulation`]: it only
//! sees variables in, snapshots out.
//!
//! [`Simulation`]: reina_core::simulation::Simulation

pub mod interventions;
pub mod params;
pub mod seir;

pub use seir::SeirModel;
