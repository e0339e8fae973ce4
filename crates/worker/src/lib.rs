//! Background execution of simulation runs.
//!
//! A [`Worker`] runs one simulation to completion or cancellation on the
//! blocking thread pool, publishing throttled snapshots into the shared
//! [`ResultCache`](reina_cache::ResultCache). Live workers are listed in an
//! injected [`JobRegistry`] for introspection.

pub mod handle;
pub mod publisher;
pub mod registry;
pub mod worker;

pub use handle::JobHandle;
pub use publisher::ProgressPublisher;
pub use registry::{JobRegistry, WorkerId};
pub use worker::{RunningWorker, Worker, WorkerContext, WorkerOutcome, WorkerSettings};
