//! i18n サービス
//!
//! Ties settings, the key registry, the deferred scheduler and the country
//! reference data together into one process-scoped context object.

use std::collections::HashMap;
use std::fmt;
use std::sync::{
    Arc,
    PoisonError,
    RwLock,
};
use std::time::Duration;

use thiserror::Error;
use tokio::runtime::{
    Handle,
    TryCurrentError,
};
use tokio::task::JoinHandle;

use crate::config::I18nSettings;
use crate::fuzzy::CountryTable;
use crate::registry::{
    KeyRequest,
    Registry,
    StaticString,
    StoreError,
    TranslationStore,
};
use crate::render::{
    ClientExposure,
    ExposedSettings,
};
use crate::scheduler::DeferredScheduler;
use crate::types::{
    Defaults,
    Placeholders,
};

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Failed to load translations: {0}")]
    Store(#[from] StoreError),

    #[error("No tokio runtime available to run deferred jobs: {0}")]
    NoRuntime(#[from] TryCurrentError),
}

/// Process-scoped i18n context.
///
/// Create it once at startup, call [`I18n::start`] before serving, and share
/// it with every call site.
pub struct I18n {
    settings: I18nSettings,
    registry: Registry,
    scheduler: Arc<DeferredScheduler>,
    store: Arc<dyn TranslationStore>,
    countries: CountryTable,
    /// alpha3 コード → 国名
    country_names: HashMap<String, StaticString>,
    /// ストアから読み込んだドメイン
    loaded_domains: RwLock<Vec<String>>,
}

impl I18n {
    /// Creates the context and registers the country display names.
    ///
    /// Nothing is persisted until [`I18n::start`] has run.
    #[must_use]
    pub fn new(
        settings: I18nSettings,
        store: Arc<dyn TranslationStore>,
        countries: CountryTable,
    ) -> Self {
        let scheduler = Arc::new(DeferredScheduler::new());
        let registry = Registry::with_flush_delay(
            scheduler.clone(),
            Arc::clone(&store),
            Duration::from_millis(settings.flush_delay_ms),
        );
        let country_names = countries.register_names(&registry);

        Self {
            settings,
            registry,
            scheduler,
            store,
            countries,
            country_names,
            loaded_domains: RwLock::new(Vec::new()),
        }
    }

    /// Loads stored translations, then opens the ready gate.
    ///
    /// Starts the deferred worker on the current tokio runtime. Keys registered
    /// before this call are flushed once it returns.
    ///
    /// # Errors
    /// - No tokio runtime is running
    /// - The store fails to load; the gate stays closed
    pub fn start(&self) -> Result<Option<JoinHandle<()>>, ServiceError> {
        let runtime = Handle::try_current()?;
        let worker = self.scheduler.spawn_worker(&runtime);

        let domains = self.store.load()?;
        tracing::debug!(?domains, "Loaded translation domains");
        *self.loaded_domains.write().unwrap_or_else(PoisonError::into_inner) = domains;

        self.scheduler.mark_ready();
        Ok(worker)
    }

    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.scheduler.is_ready()
    }

    /// Localized string for `key`; `domain: None` uses the default domain.
    pub fn translate(
        &self,
        domain: Option<&str>,
        key: &str,
        placeholders: Option<Placeholders>,
    ) -> StaticString {
        self.registry.get_or_create(KeyRequest {
            domain: domain.map(str::to_string),
            key: key.to_string(),
            placeholders,
            defaults: None,
        })
    }

    /// Localized string for `key`, seeding fallback translations.
    pub fn translate_with_defaults(
        &self,
        domain: Option<&str>,
        key: &str,
        defaults: Defaults,
    ) -> StaticString {
        self.registry.get_or_create(KeyRequest {
            domain: domain.map(str::to_string),
            key: key.to_string(),
            placeholders: None,
            defaults: Some(defaults),
        })
    }

    /// Resolves a free-text country name to its alpha-3 code.
    #[must_use]
    pub fn find_country(&self, name: Option<&str>) -> Option<&str> {
        self.countries.find_country(name)
    }

    /// Registered display name of the country with the given code.
    #[must_use]
    pub fn country_name(&self, code: &str) -> Option<&StaticString> {
        self.country_names.get(code)
    }

    /// Domains known to the client: loaded ones plus those registered since.
    #[must_use]
    pub fn domains(&self) -> Vec<String> {
        let mut domains =
            self.loaded_domains.read().unwrap_or_else(PoisonError::into_inner).clone();
        domains.extend(self.registry.domains());
        domains.sort_unstable();
        domains.dedup();
        domains
    }

    #[must_use]
    pub fn client_exposure(&self) -> ClientExposure {
        ClientExposure {
            i18n_domains: self.domains(),
            i18n_settings: ExposedSettings::from(&self.settings),
        }
    }

    /// Writes all pending keys now, e.g. before shutdown.
    pub fn flush_all(&self) -> usize {
        self.registry.flush_all()
    }

    #[must_use]
    pub const fn settings(&self) -> &I18nSettings {
        &self.settings
    }

    #[must_use]
    pub const fn registry(&self) -> &Registry {
        &self.registry
    }

    #[must_use]
    pub const fn countries(&self) -> &CountryTable {
        &self.countries
    }
}

impl fmt::Debug for I18n {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("I18n")
            .field("settings", &self.settings)
            .field("registry", &self.registry)
            .field("scheduler", &self.scheduler)
            .field("countries", &self.countries.len())
            .finish_non_exhaustive()
    }
}
