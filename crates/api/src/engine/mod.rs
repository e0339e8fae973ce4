//! Run orchestration.
//!
//! The launcher decides whether a request reuses a cached result, joins a
//! run already in flight or spawns a new worker. The poll module turns the
//! cache state of the caller's bound run into a poll answer.

pub mod launcher;
pub mod poll;
