//! Deferred execution of low-priority work.

/// One-shot readiness gate
mod gate;
/// Tokio-backed scheduler
mod worker;

use std::time::Duration;

pub use gate::ReadyGate;
pub use worker::DeferredScheduler;

/// A unit of deferred work.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Runs work outside the request path.
pub trait Scheduler: Send + Sync {
    /// Runs `job` once the process has signalled it is ready to serve.
    ///
    /// Jobs submitted after the signal run right away.
    fn after_ready(&self, job: Job);

    /// Runs `job` after at least `delay`, without competing with regular work.
    fn low_priority(&self, job: Job, delay: Duration);
}
