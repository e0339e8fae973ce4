//! HTTP handlers, one module per resource.

pub mod cache;
pub mod jobs;
pub mod sessions;
pub mod simulations;
