//! テスト用ユーティリティ
//!
//! 複数のテストモジュールで使用するスケジューラとストアのモックを提供します。
#![cfg(test)]

use std::sync::{
    Mutex,
    PoisonError,
};
use std::time::Duration;

use crate::registry::{
    PendingKey,
    StoreError,
    TranslationStore,
};
use crate::scheduler::{
    Job,
    Scheduler,
};

/// 呼び出しを記録し、テストから手動で実行できるスケジューラ
#[derive(Default)]
pub(crate) struct RecordingScheduler {
    state: Mutex<RecordingState>,
}

#[derive(Default)]
struct RecordingState {
    ready: bool,
    after_ready_calls: usize,
    waiting: Vec<Job>,
    queued: Vec<Job>,
    delays: Vec<Duration>,
}

impl RecordingScheduler {
    /// `after_ready` が呼ばれた回数
    pub(crate) fn after_ready_calls(&self) -> usize {
        self.lock().after_ready_calls
    }

    /// `low_priority` に渡された遅延
    pub(crate) fn delays(&self) -> Vec<Duration> {
        self.lock().delays.clone()
    }

    /// ready を通知し、待機中のジョブを実行する
    pub(crate) fn open_gate(&self) {
        let waiting = {
            let mut state = self.lock();
            state.ready = true;
            std::mem::take(&mut state.waiting)
        };
        for job in waiting {
            job();
        }
    }

    /// 低優先度キューが空になるまで実行する
    pub(crate) fn run_low_priority(&self) {
        loop {
            let queued = std::mem::take(&mut self.lock().queued);
            if queued.is_empty() {
                break;
            }
            for job in queued {
                job();
            }
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, RecordingState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Scheduler for RecordingScheduler {
    fn after_ready(&self, job: Job) {
        let mut state = self.lock();
        state.after_ready_calls += 1;
        if state.ready {
            drop(state);
            job();
        } else {
            state.waiting.push(job);
        }
    }

    fn low_priority(&self, job: Job, delay: Duration) {
        let mut state = self.lock();
        state.delays.push(delay);
        state.queued.push(job);
    }
}

/// `flush_pending` の呼び出しを記録するストア
#[derive(Default)]
pub(crate) struct RecordingStore {
    flushes: Mutex<Vec<(String, Vec<String>)>>,
    fail: bool,
}

impl RecordingStore {
    /// 常に失敗するストア
    pub(crate) fn failing() -> Self {
        Self { fail: true, ..Self::default() }
    }

    /// (domain, keys) の一覧
    pub(crate) fn flushes(&self) -> Vec<(String, Vec<String>)> {
        self.flushes.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

impl TranslationStore for RecordingStore {
    fn load(&self) -> Result<Vec<String>, StoreError> {
        if self.fail {
            return Err(StoreError::Unavailable("test store".to_string()));
        }
        Ok(vec!["default".to_string()])
    }

    fn flush_pending(&self, domain: &str, keys: Vec<PendingKey>) -> Result<(), StoreError> {
        if self.fail {
            return Err(StoreError::Rejected {
                domain: domain.to_string(),
                message: "test store".to_string(),
            });
        }
        let keys = keys.into_iter().map(|k| k.key).collect();
        self.flushes.lock().unwrap_or_else(PoisonError::into_inner).push((domain.to_string(), keys));
        Ok(())
    }
}
