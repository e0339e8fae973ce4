//! Domain types shared by every REINA crate.
//!
//! Zero internal dependencies: the cache, worker and API crates build on the
//! identifiers, variable store and collaborator traits defined here.

pub mod error;
pub mod fingerprint;
pub mod simulation;
pub mod types;
pub mod variables;
