//! 翻訳キーのレジストリ
//!
//! Every distinct `(domain, key)` pair is registered once per process. The
//! first request for a pair inserts its handle and schedules a deferred flush
//! of the pair's domain; later requests reuse the handle.
//!
//! # 状態遷移
//!
//! `UNSEEN → REGISTERED(defaults なし) → REGISTERED(defaults あり)`
//!
//! Scheduling happens only on the `UNSEEN → REGISTERED` transition.

use std::collections::HashMap;
use std::fmt;
use std::sync::{
    Arc,
    Mutex,
    MutexGuard,
    PoisonError,
    Weak,
};
use std::time::Duration;

use super::handle::{
    StaticString,
    TranslationHandle,
};
use super::request::KeyRequest;
use super::store::{
    PendingKey,
    StoreError,
    TranslationStore,
};
use crate::scheduler::Scheduler;
use crate::types::{
    Defaults,
    Placeholders,
};

/// Default low-priority delay before a domain is flushed.
pub const DEFAULT_FLUSH_DELAY: Duration = Duration::from_millis(500);

/// Process-wide registry of translation keys.
///
/// Cheap to clone; clones share the same state.
#[derive(Clone)]
pub struct Registry {
    shared: Arc<Shared>,
}

struct Shared {
    seen: Mutex<Seen>,
    scheduler: Arc<dyn Scheduler>,
    store: Arc<dyn TranslationStore>,
    flush_delay: Duration,
}

#[derive(Default)]
struct Seen {
    /// domain → key → handle
    handles: HashMap<String, HashMap<String, TranslationHandle>>,
    /// Registered but not yet flushed, per domain in registration order.
    pending: HashMap<String, Vec<TranslationHandle>>,
}

impl Registry {
    #[must_use]
    pub fn new(scheduler: Arc<dyn Scheduler>, store: Arc<dyn TranslationStore>) -> Self {
        Self::with_flush_delay(scheduler, store, DEFAULT_FLUSH_DELAY)
    }

    #[must_use]
    pub fn with_flush_delay(
        scheduler: Arc<dyn Scheduler>,
        store: Arc<dyn TranslationStore>,
        flush_delay: Duration,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                seen: Mutex::new(Seen::default()),
                scheduler,
                store,
                flush_delay,
            }),
        }
    }

    /// Returns the string for `request`, registering its pair on first sight.
    ///
    /// When `request.defaults` is given and the registered handle has none yet,
    /// the defaults are stored on the shared handle.
    pub fn get_or_create(&self, request: KeyRequest) -> StaticString {
        let domain = request.resolved_domain().to_string();
        let KeyRequest { key, placeholders, defaults, .. } = request;

        // 挿入の有無の判定はロック内で完結させる
        let (handle, created) = {
            let mut seen = self.lock();
            let existing = seen.handles.get(&domain).and_then(|keys| keys.get(&key)).cloned();

            match existing {
                Some(handle) => (handle, false),
                None => {
                    let handle = TranslationHandle::new(domain.clone(), key.clone());
                    seen.handles.entry(domain.clone()).or_default().insert(key, handle.clone());
                    seen.pending.entry(domain.clone()).or_default().push(handle.clone());
                    (handle, true)
                }
            }
        };

        if let Some(defaults) = defaults
            && handle.merge_defaults(defaults)
        {
            tracing::trace!(domain = handle.domain(), key = handle.key(), "Stored defaults");
        }

        // スケジューラがジョブを即時実行してもデッドロックしないよう、ロック解放後に登録
        if created {
            tracing::debug!(domain = handle.domain(), key = handle.key(), "Registered new key");
            self.schedule_flush(domain);
        }

        StaticString::new(handle, placeholders)
    }

    /// [`Registry::get_or_create`] with an explicit domain.
    pub fn get_or_create_in_domain(
        &self,
        domain: &str,
        key: &str,
        placeholders: Option<Placeholders>,
        defaults: Option<Defaults>,
    ) -> StaticString {
        self.get_or_create(KeyRequest {
            domain: Some(domain.to_string()),
            key: key.to_string(),
            placeholders,
            defaults,
        })
    }

    /// [`Registry::get_or_create`] in the default domain.
    pub fn get_or_create_default(
        &self,
        key: &str,
        placeholders: Option<Placeholders>,
        defaults: Option<Defaults>,
    ) -> StaticString {
        self.get_or_create(KeyRequest { domain: None, key: key.to_string(), placeholders, defaults })
    }

    /// Looks up a registered handle without registering anything.
    #[must_use]
    pub fn get(&self, domain: &str, key: &str) -> Option<TranslationHandle> {
        self.lock().handles.get(domain)?.get(key).cloned()
    }

    #[must_use]
    pub fn contains(&self, domain: &str, key: &str) -> bool {
        self.get(domain, key).is_some()
    }

    /// Domains with at least one registered key, sorted.
    #[must_use]
    pub fn domains(&self) -> Vec<String> {
        let mut domains: Vec<String> = self.lock().handles.keys().cloned().collect();
        domains.sort_unstable();
        domains
    }

    /// Number of registered keys in `domain` that are not flushed yet.
    #[must_use]
    pub fn pending_count(&self, domain: &str) -> usize {
        self.lock().pending.get(domain).map_or(0, Vec::len)
    }

    /// Removes and returns the pending keys of `domain` in registration order.
    pub fn take_pending(&self, domain: &str) -> Vec<TranslationHandle> {
        self.lock().pending.remove(domain).unwrap_or_default()
    }

    /// Writes the pending keys of `domain` to the store.
    ///
    /// On failure the keys go back to the pending set so the next flush of the
    /// domain retries them.
    ///
    /// # Returns
    /// The number of keys written.
    ///
    /// # Errors
    /// - The store rejected the batch
    pub fn flush_domain(&self, domain: &str) -> Result<usize, StoreError> {
        let pending = self.take_pending(domain);
        if pending.is_empty() {
            tracing::trace!(domain, "Nothing to flush");
            return Ok(0);
        }

        let keys: Vec<PendingKey> = pending.iter().map(PendingKey::from).collect();
        let count = keys.len();

        match self.shared.store.flush_pending(domain, keys) {
            Ok(()) => {
                tracing::debug!(domain, count, "Flushed pending keys");
                Ok(count)
            }
            Err(error) => {
                let mut seen = self.lock();
                let queued = seen.pending.entry(domain.to_string()).or_default();
                // 失敗した分を先頭に戻して登録順を保つ
                let mut restored = pending;
                restored.append(queued);
                *queued = restored;
                Err(error)
            }
        }
    }

    /// Flushes every domain that has pending keys.
    ///
    /// Failures are logged; the remaining domains are still flushed.
    ///
    /// # Returns
    /// The number of keys written.
    pub fn flush_all(&self) -> usize {
        let domains: Vec<String> = self.lock().pending.keys().cloned().collect();

        domains
            .iter()
            .map(|domain| {
                self.flush_domain(domain).unwrap_or_else(|error| {
                    tracing::warn!(domain = domain.as_str(), %error, "Failed to flush pending keys");
                    0
                })
            })
            .sum()
    }

    fn schedule_flush(&self, domain: String) {
        // 待機中のジョブはスケジューラ自身のキューに入るため、弱参照のみ保持する
        let registry = Arc::downgrade(&self.shared);
        let scheduler = Arc::downgrade(&self.shared.scheduler);
        let delay = self.shared.flush_delay;

        self.shared.scheduler.after_ready(Box::new(move || {
            let Some(scheduler) = scheduler.upgrade() else {
                tracing::debug!(domain = domain.as_str(), "Scheduler dropped before flush");
                return;
            };
            scheduler.low_priority(Box::new(move || run_flush(&registry, &domain)), delay);
        }));
    }

    fn lock(&self) -> MutexGuard<'_, Seen> {
        self.shared.seen.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Body of the deferred flush job.
fn run_flush(registry: &Weak<Shared>, domain: &str) {
    let Some(shared) = registry.upgrade() else {
        tracing::debug!(domain, "Registry dropped before flush");
        return;
    };

    if let Err(error) = (Registry { shared }).flush_domain(domain) {
        tracing::warn!(domain, %error, "Failed to flush pending keys");
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let seen = self.lock();
        f.debug_struct("Registry")
            .field("domains", &seen.handles.len())
            .field("keys", &seen.handles.values().map(HashMap::len).sum::<usize>())
            .field("pending", &seen.pending.values().map(Vec::len).sum::<usize>())
            .field("flush_delay", &self.shared.flush_delay)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use std::thread;

    use googletest::prelude::*;
    use rstest::*;
    use serde_json::json;

    use super::*;
    use crate::test_utils::{
        RecordingScheduler,
        RecordingStore,
    };

    struct Fixture {
        registry: Registry,
        scheduler: Arc<RecordingScheduler>,
        store: Arc<RecordingStore>,
    }

    #[fixture]
    fn ctx() -> Fixture {
        let scheduler = Arc::new(RecordingScheduler::default());
        let store = Arc::new(RecordingStore::default());
        let registry = Registry::new(scheduler.clone(), store.clone());
        Fixture { registry, scheduler, store }
    }

    fn defaults(locale: &str, text: &str) -> Defaults {
        Defaults::from([(locale.to_string(), text.to_string())])
    }

    #[rstest]
    fn repeated_request_returns_same_handle(ctx: Fixture) {
        let first = ctx.registry.get_or_create_in_domain("app", "greeting", None, None);
        let second = ctx.registry.get_or_create_in_domain("app", "greeting", None, None);

        assert_that!(first.handle().same_entity(second.handle()), eq(true));
        assert_that!(ctx.scheduler.after_ready_calls(), eq(1));
    }

    #[rstest]
    fn distinct_pairs_schedule_separately(ctx: Fixture) {
        ctx.registry.get_or_create_in_domain("app", "greeting", None, None);
        ctx.registry.get_or_create_in_domain("app", "farewell", None, None);
        ctx.registry.get_or_create_in_domain("admin", "greeting", None, None);

        assert_that!(ctx.scheduler.after_ready_calls(), eq(3));
        assert_that!(ctx.registry.pending_count("app"), eq(2));
        assert_that!(ctx.registry.pending_count("admin"), eq(1));
        assert_that!(ctx.registry.domains(), elements_are![eq("admin"), eq("app")]);
    }

    #[rstest]
    fn defaults_are_merged_into_existing_handle(ctx: Fixture) {
        ctx.registry.get_or_create_in_domain("app", "greeting", None, Some(defaults("en", "Hi")));
        let later = ctx.registry.get_or_create_in_domain("app", "greeting", None, None);

        assert_that!(later.defaults().unwrap().get("en"), some(eq("Hi")));
    }

    #[rstest]
    fn later_defaults_do_not_overwrite(ctx: Fixture) {
        let first = ctx.registry.get_or_create_in_domain("app", "greeting", None, None);
        ctx.registry.get_or_create_in_domain("app", "greeting", None, Some(defaults("en", "Hi")));
        ctx.registry.get_or_create_in_domain(
            "app",
            "greeting",
            None,
            Some(defaults("en", "Hello")),
        );

        // 最初に取得したハンドルからも見える
        assert_that!(first.defaults().unwrap().get("en"), some(eq("Hi")));
        assert_that!(ctx.scheduler.after_ready_calls(), eq(1));
    }

    #[rstest]
    fn omitted_domain_uses_default(ctx: Fixture) {
        let placeholders = json!({"count": 1}).as_object().cloned();

        let implicit = ctx.registry.get_or_create_default("greeting", placeholders.clone(), None);
        let explicit =
            ctx.registry.get_or_create_in_domain("default", "greeting", placeholders, None);

        assert_that!(implicit.domain(), eq("default"));
        assert_that!(implicit.handle().same_entity(explicit.handle()), eq(true));
        assert_that!(implicit, eq(&explicit));
        assert_that!(ctx.scheduler.after_ready_calls(), eq(1));
    }

    #[rstest]
    fn placeholders_belong_to_the_request(ctx: Fixture) {
        let with = ctx
            .registry
            .get_or_create_default("items", json!({"count": 2}).as_object().cloned(), None);
        let without = ctx.registry.get_or_create_default("items", None, None);

        assert_that!(with.placeholders(), some(anything()));
        assert_that!(without.placeholders(), none());
        assert_that!(with.handle().same_entity(without.handle()), eq(true));
    }

    #[rstest]
    fn deferred_job_flushes_whole_domain(ctx: Fixture) {
        ctx.registry.get_or_create_in_domain("app", "a", None, None);
        ctx.registry.get_or_create_in_domain("app", "b", None, Some(defaults("en", "B")));

        ctx.scheduler.open_gate();
        ctx.scheduler.run_low_priority();

        // 1 回目のジョブで両方のキーが書き込まれ、2 回目は空振り
        assert_eq!(
            ctx.store.flushes(),
            vec![("app".to_string(), vec!["a".to_string(), "b".to_string()])]
        );
        assert_eq!(ctx.scheduler.delays(), vec![DEFAULT_FLUSH_DELAY; 2]);
        assert_that!(ctx.registry.pending_count("app"), eq(0));
    }

    #[rstest]
    fn nothing_is_flushed_before_ready(ctx: Fixture) {
        ctx.registry.get_or_create_in_domain("app", "a", None, None);

        ctx.scheduler.run_low_priority();

        assert_that!(ctx.store.flushes(), is_empty());
        assert_that!(ctx.registry.pending_count("app"), eq(1));
    }

    #[rstest]
    fn failed_flush_requeues_keys() {
        let scheduler = Arc::new(RecordingScheduler::default());
        let registry = Registry::new(scheduler, Arc::new(RecordingStore::failing()));
        registry.get_or_create_in_domain("app", "a", None, None);
        registry.get_or_create_in_domain("app", "b", None, None);

        let result = registry.flush_domain("app");

        assert_that!(result, err(anything()));
        assert_that!(registry.pending_count("app"), eq(2));
        let requeued: Vec<String> =
            registry.take_pending("app").iter().map(|h| h.key().to_string()).collect();
        assert_that!(requeued, elements_are![eq("a"), eq("b")]);
    }

    #[rstest]
    fn flush_all_covers_every_domain(ctx: Fixture) {
        ctx.registry.get_or_create_in_domain("app", "a", None, None);
        ctx.registry.get_or_create_in_domain("admin", "b", None, None);

        let written = ctx.registry.flush_all();

        assert_that!(written, eq(2));
        assert_that!(ctx.store.flushes(), len(eq(2)));
        assert_that!(ctx.registry.pending_count("app"), eq(0));
        assert_that!(ctx.registry.contains("admin", "b"), eq(true));
    }

    #[rstest]
    fn flush_after_registry_dropped_is_noop(ctx: Fixture) {
        let Fixture { registry, scheduler, store } = ctx;
        registry.get_or_create_in_domain("app", "a", None, None);
        drop(registry);

        scheduler.open_gate();
        scheduler.run_low_priority();

        assert_that!(store.flushes(), is_empty());
    }

    #[rstest]
    fn waiting_jobs_do_not_keep_scheduler_alive() {
        let scheduler = Arc::new(RecordingScheduler::default());
        let registry = Registry::new(scheduler.clone(), Arc::new(RecordingStore::default()));
        registry.get_or_create_in_domain("app", "a", None, None);
        assert_that!(Arc::strong_count(&scheduler), eq(2));

        drop(registry);

        // ゲート前のジョブが残っていても参照は手元の 1 つだけ
        assert_that!(Arc::strong_count(&scheduler), eq(1));
        scheduler.open_gate();
        scheduler.run_low_priority();
    }

    #[rstest]
    fn concurrent_first_requests_register_once(ctx: Fixture) {
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = ctx.registry.clone();
                thread::spawn(move || registry.get_or_create_in_domain("app", "race", None, None))
            })
            .collect();

        let strings: Vec<StaticString> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_that!(ctx.scheduler.after_ready_calls(), eq(1));
        assert_that!(ctx.registry.pending_count("app"), eq(1));
        for string in &strings[1..] {
            assert_that!(string.handle().same_entity(strings[0].handle()), eq(true));
        }
    }

    #[rstest]
    fn debug_shows_counts(ctx: Fixture) {
        ctx.registry.get_or_create_in_domain("app", "a", None, None);

        let debug_str = format!("{:?}", ctx.registry);

        assert_that!(debug_str, contains_substring("Registry"));
        assert_that!(debug_str, contains_substring("keys: 1"));
        assert_that!(debug_str, contains_substring("pending: 1"));
    }
}
