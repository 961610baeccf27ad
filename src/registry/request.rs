//! 翻訳キーの要求

use crate::types::{
    DEFAULT_DOMAIN,
    Defaults,
    Placeholders,
};

/// One request for a localized string.
///
/// `domain: None` (or an empty domain) selects [`DEFAULT_DOMAIN`], which covers
/// the call shape where only a key is given.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KeyRequest {
    pub domain: Option<String>,
    pub key: String,
    pub placeholders: Option<Placeholders>,
    pub defaults: Option<Defaults>,
}

impl KeyRequest {
    /// Request for `key` in an explicit domain.
    #[must_use]
    pub fn in_domain(domain: impl Into<String>, key: impl Into<String>) -> Self {
        Self { domain: Some(domain.into()), key: key.into(), ..Self::default() }
    }

    /// Request for `key` in [`DEFAULT_DOMAIN`].
    #[must_use]
    pub fn default_domain(key: impl Into<String>) -> Self {
        Self { key: key.into(), ..Self::default() }
    }

    #[must_use]
    pub fn with_placeholders(mut self, placeholders: Placeholders) -> Self {
        self.placeholders = Some(placeholders);
        self
    }

    #[must_use]
    pub fn with_defaults(mut self, defaults: Defaults) -> Self {
        self.defaults = Some(defaults);
        self
    }

    /// The domain the request resolves to.
    #[must_use]
    pub fn resolved_domain(&self) -> &str {
        self.domain.as_deref().filter(|d| !d.is_empty()).unwrap_or(DEFAULT_DOMAIN)
    }
}
