//! 永続化ストアのインターフェース

use std::collections::{
    BTreeMap,
    BTreeSet,
};
use std::sync::{
    Mutex,
    MutexGuard,
    PoisonError,
};

use thiserror::Error;

use super::handle::TranslationHandle;
use crate::types::Defaults;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Translation store is unavailable: {0}")]
    Unavailable(String),

    #[error("Translation store rejected keys for domain '{domain}': {message}")]
    Rejected { domain: String, message: String },
}

/// A key waiting to be written to the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingKey {
    pub key: String,
    pub defaults: Option<Defaults>,
}

impl From<&TranslationHandle> for PendingKey {
    fn from(handle: &TranslationHandle) -> Self {
        Self { key: handle.key().to_string(), defaults: handle.defaults().cloned() }
    }
}

/// Durable storage of registered keys.
///
/// Called from the deferred flush job, never from the request path.
pub trait TranslationStore: Send + Sync {
    /// Loads stored translations and returns the known domains.
    fn load(&self) -> Result<Vec<String>, StoreError>;

    /// Writes or merges all pending keys of `domain`.
    fn flush_pending(&self, domain: &str, keys: Vec<PendingKey>) -> Result<(), StoreError>;
}

/// In-process store: domain → key → defaults.
///
/// Merging keeps the first non-empty defaults of a key.
#[derive(Debug, Default)]
pub struct MemoryStore {
    domains: Mutex<BTreeMap<String, BTreeMap<String, Option<Defaults>>>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-populated with empty domains.
    #[must_use]
    pub fn with_domains<I, S>(domains: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let domains = domains.into_iter().map(|d| (d.into(), BTreeMap::new())).collect();
        Self { domains: Mutex::new(domains) }
    }

    /// Known domains in sorted order.
    #[must_use]
    pub fn domains(&self) -> Vec<String> {
        self.lock().keys().cloned().collect()
    }

    /// Stored keys of `domain` in sorted order.
    #[must_use]
    pub fn keys(&self, domain: &str) -> BTreeSet<String> {
        self.lock().get(domain).map(|keys| keys.keys().cloned().collect()).unwrap_or_default()
    }

    #[must_use]
    pub fn defaults(&self, domain: &str, key: &str) -> Option<Defaults> {
        self.lock().get(domain)?.get(key)?.clone()
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<String, BTreeMap<String, Option<Defaults>>>> {
        self.domains.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl TranslationStore for MemoryStore {
    fn load(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.domains())
    }

    fn flush_pending(&self, domain: &str, keys: Vec<PendingKey>) -> Result<(), StoreError> {
        let mut domains = self.lock();
        let stored = domains.entry(domain.to_string()).or_default();

        for PendingKey { key, defaults } in keys {
            let slot = stored.entry(key).or_default();
            if slot.is_none() {
                *slot = defaults.filter(|d| !d.is_empty());
            }
        }

        Ok(())
    }
}
