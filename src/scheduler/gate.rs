use std::fmt;
use std::sync::{
    Mutex,
    MutexGuard,
    PoisonError,
};

use super::Job;

/// Holds jobs back until [`ReadyGate::open`] is called, once.
#[derive(Default)]
pub struct ReadyGate {
    state: Mutex<GateState>,
}

#[derive(Default)]
struct GateState {
    ready: bool,
    waiting: Vec<Job>,
}

impl ReadyGate {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.lock().ready
    }

    /// Runs `job` now if the gate is open, otherwise queues it.
    pub fn run_when_ready(&self, job: Job) {
        let mut state = self.lock();
        if state.ready {
            drop(state);
            job();
        } else {
            state.waiting.push(job);
        }
    }

    /// Opens the gate and runs queued jobs in submission order.
    ///
    /// Later calls do nothing.
    pub fn open(&self) {
        let waiting = {
            let mut state = self.lock();
            if state.ready {
                return;
            }
            state.ready = true;
            std::mem::take(&mut state.waiting)
        };

        tracing::debug!(queued = waiting.len(), "Ready gate opened");
        for job in waiting {
            job();
        }
    }

    fn lock(&self) -> MutexGuard<'_, GateState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for ReadyGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock();
        f.debug_struct("ReadyGate")
            .field("ready", &state.ready)
            .field("waiting", &state.waiting.len())
            .finish()
    }
}
