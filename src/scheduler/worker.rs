//! tokio ベースのスケジューラ

use std::fmt;
use std::sync::{
    Mutex,
    PoisonError,
};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::mpsc::{
    UnboundedReceiver,
    UnboundedSender,
    unbounded_channel,
};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use super::{
    Job,
    ReadyGate,
    Scheduler,
};

/// A job waiting in the low-priority queue.
struct Queued {
    deadline: Instant,
    job: Job,
}

/// Scheduler with a ready gate and a single low-priority worker task.
///
/// Low-priority jobs are processed one at a time in submission order. Each one
/// waits for its deadline, yields to the runtime once, then runs on the
/// blocking pool. Jobs submitted before [`DeferredScheduler::spawn_worker`] are
/// kept in the queue.
pub struct DeferredScheduler {
    gate: ReadyGate,
    sender: UnboundedSender<Queued>,
    /// ワーカー起動時に取り出す
    receiver: Mutex<Option<UnboundedReceiver<Queued>>>,
}

impl DeferredScheduler {
    #[must_use]
    pub fn new() -> Self {
        let (sender, receiver) = unbounded_channel();
        Self { gate: ReadyGate::new(), sender, receiver: Mutex::new(Some(receiver)) }
    }

    /// Starts the worker on `runtime`.
    ///
    /// Returns `None` if the worker was already started. The worker stops when
    /// the scheduler is dropped and the queue is drained.
    pub fn spawn_worker(&self, runtime: &Handle) -> Option<JoinHandle<()>> {
        let receiver = self.receiver.lock().unwrap_or_else(PoisonError::into_inner).take()?;
        tracing::debug!("Starting deferred scheduler worker");
        Some(runtime.spawn(run_worker(receiver)))
    }

    /// Signals that the process is ready to serve.
    pub fn mark_ready(&self) {
        self.gate.open();
    }

    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.gate.is_ready()
    }
}

impl Default for DeferredScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler for DeferredScheduler {
    fn after_ready(&self, job: Job) {
        self.gate.run_when_ready(job);
    }

    fn low_priority(&self, job: Job, delay: Duration) {
        let queued = Queued { deadline: Instant::now() + delay, job };
        if self.sender.send(queued).is_err() {
            tracing::warn!("Deferred scheduler worker has stopped, dropping job");
        }
    }
}

impl fmt::Debug for DeferredScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeferredScheduler")
            .field("gate", &self.gate)
            .field("worker_started", &self.receiver.lock().map(|r| r.is_none()).unwrap_or(true))
            .finish_non_exhaustive()
    }
}

async fn run_worker(mut receiver: UnboundedReceiver<Queued>) {
    while let Some(Queued { deadline, job }) = receiver.recv().await {
        tokio::time::sleep_until(deadline).await;
        tokio::task::yield_now().await;

        if let Err(error) = tokio::task::spawn_blocking(job).await {
            tracing::warn!(%error, "Deferred job failed");
        }
    }
    tracing::debug!("Deferred scheduler worker stopped");
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use googletest::prelude::*;
    use tokio::sync::mpsc;

    use super::*;

    #[tokio::test]
    async fn low_priority_job_runs_after_delay() {
        let scheduler = DeferredScheduler::new();
        let worker = scheduler.spawn_worker(&Handle::current()).unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();

        let started = Instant::now();
        scheduler.low_priority(
            Box::new(move || {
                tx.send(Instant::now()).unwrap();
            }),
            Duration::from_millis(20),
        );

        let ran_at = rx.recv().await.unwrap();
        assert_that!(ran_at.duration_since(started), ge(Duration::from_millis(20)));

        drop(scheduler);
        worker.await.unwrap();
    }

    #[tokio::test]
    async fn jobs_run_in_submission_order() {
        let scheduler = DeferredScheduler::new();
        let (tx, mut rx) = mpsc::unbounded_channel();

        for index in 0..3 {
            let tx = tx.clone();
            scheduler.low_priority(
                Box::new(move || {
                    tx.send(index).unwrap();
                }),
                Duration::from_millis(1),
            );
        }
        drop(tx);

        // キューに溜まった後でワーカーを起動
        let worker = scheduler.spawn_worker(&Handle::current()).unwrap();

        let mut order = Vec::new();
        while let Some(index) = rx.recv().await {
            order.push(index);
        }
        assert_that!(order, elements_are![eq(&0), eq(&1), eq(&2)]);

        drop(scheduler);
        worker.await.unwrap();
    }

    #[tokio::test]
    async fn worker_starts_once() {
        let scheduler = DeferredScheduler::new();

        let first = scheduler.spawn_worker(&Handle::current());
        let second = scheduler.spawn_worker(&Handle::current());

        assert_that!(first.is_some(), eq(true));
        assert_that!(second.is_none(), eq(true));
    }

    #[tokio::test]
    async fn after_ready_waits_for_mark_ready() {
        let scheduler = Arc::new(DeferredScheduler::new());
        let (tx, mut rx) = mpsc::unbounded_channel();

        scheduler.after_ready(Box::new(move || {
            tx.send(()).unwrap();
        }));
        assert_that!(rx.try_recv().is_err(), eq(true));
        assert_that!(scheduler.is_ready(), eq(false));

        scheduler.mark_ready();

        assert_that!(rx.try_recv().is_ok(), eq(true));
        assert_that!(scheduler.is_ready(), eq(true));
    }
}
