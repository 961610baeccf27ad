//! 翻訳キーのハンドル

use std::fmt;
use std::sync::{
    Arc,
    OnceLock,
};

use crate::render::{
    self,
    DEFAULT_MARKUP_TAG,
    Markup,
};
use crate::types::{
    Defaults,
    Placeholders,
};

/// Shared record of one `(domain, key)` pair.
///
/// Clones point at the same record, so defaults merged through one clone are
/// visible through every other. Equality compares `(domain, key)` only; use
/// [`TranslationHandle::same_entity`] for identity.
#[derive(Clone)]
pub struct TranslationHandle {
    inner: Arc<HandleInner>,
}

struct HandleInner {
    domain: String,
    key: String,
    /// 最初の空でないデフォルトのみ保持
    defaults: OnceLock<Defaults>,
}

impl TranslationHandle {
    pub(super) fn new(domain: String, key: String) -> Self {
        Self { inner: Arc::new(HandleInner { domain, key, defaults: OnceLock::new() }) }
    }

    #[must_use]
    pub fn domain(&self) -> &str {
        &self.inner.domain
    }

    #[must_use]
    pub fn key(&self) -> &str {
        &self.inner.key
    }

    #[must_use]
    pub fn defaults(&self) -> Option<&Defaults> {
        self.inner.defaults.get()
    }

    /// Stores `defaults` if none are stored yet.
    ///
    /// Empty maps are ignored. Returns `true` when `defaults` was stored.
    pub(super) fn merge_defaults(&self, defaults: Defaults) -> bool {
        if defaults.is_empty() {
            return false;
        }
        self.inner.defaults.set(defaults).is_ok()
    }

    /// Returns `true` if both handles are the same registered record.
    #[must_use]
    pub fn same_entity(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl PartialEq for TranslationHandle {
    fn eq(&self, other: &Self) -> bool {
        self.domain() == other.domain() && self.key() == other.key()
    }
}

impl Eq for TranslationHandle {}

impl fmt::Debug for TranslationHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TranslationHandle")
            .field("domain", &self.domain())
            .field("key", &self.key())
            .field("defaults", &self.defaults())
            .finish()
    }
}

/// A localized string as handed out to callers.
///
/// Wraps the shared [`TranslationHandle`] together with the placeholders of
/// this particular request.
#[derive(Debug, Clone, PartialEq)]
pub struct StaticString {
    handle: TranslationHandle,
    placeholders: Option<Placeholders>,
}

impl StaticString {
    pub(super) const fn new(handle: TranslationHandle, placeholders: Option<Placeholders>) -> Self {
        Self { handle, placeholders }
    }

    #[must_use]
    pub const fn handle(&self) -> &TranslationHandle {
        &self.handle
    }

    #[must_use]
    pub fn domain(&self) -> &str {
        self.handle.domain()
    }

    #[must_use]
    pub fn key(&self) -> &str {
        self.handle.key()
    }

    #[must_use]
    pub const fn placeholders(&self) -> Option<&Placeholders> {
        self.placeholders.as_ref()
    }

    #[must_use]
    pub fn defaults(&self) -> Option<&Defaults> {
        self.handle.defaults()
    }

    /// Replaces every occurrence of `needle` in the key text.
    #[must_use]
    pub fn replace(&self, needle: &str, replacement: &str) -> String {
        self.key().replace(needle, replacement)
    }

    /// Serializable record for the rendering side.
    #[must_use]
    pub fn markup(&self) -> Markup {
        Markup::new(self.domain(), self.key(), self.placeholders())
    }
}

impl fmt::Display for StaticString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&render::to_html(&self.markup(), DEFAULT_MARKUP_TAG))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use googletest::prelude::*;
    use rstest::rstest;
    use serde_json::json;

    use super::*;

    fn handle(domain: &str, key: &str) -> TranslationHandle {
        TranslationHandle::new(domain.to_string(), key.to_string())
    }

    fn defaults(locale: &str, text: &str) -> Defaults {
        Defaults::from([(locale.to_string(), text.to_string())])
    }

    #[rstest]
    fn clones_share_defaults() {
        let original = handle("app", "greeting");
        let clone = original.clone();

        assert_that!(original.merge_defaults(defaults("en", "Hi")), eq(true));

        assert_that!(clone.defaults().unwrap().get("en"), some(eq("Hi")));
        assert_that!(clone.same_entity(&original), eq(true));
    }

    #[rstest]
    fn first_defaults_win() {
        let handle = handle("app", "greeting");

        handle.merge_defaults(defaults("en", "Hi"));
        let replaced = handle.merge_defaults(defaults("en", "Hello"));

        assert_that!(replaced, eq(false));
        assert_that!(handle.defaults().unwrap().get("en"), some(eq("Hi")));
    }

    #[rstest]
    fn empty_defaults_are_ignored() {
        let handle = handle("app", "greeting");

        assert_that!(handle.merge_defaults(Defaults::new()), eq(false));
        assert_that!(handle.defaults(), none());
        assert_that!(handle.merge_defaults(defaults("nl", "Hoi")), eq(true));
    }

    #[rstest]
    fn equality_is_by_pair_not_identity() {
        let a = handle("app", "greeting");
        let b = handle("app", "greeting");

        assert_that!(a, eq(&b));
        assert_that!(a.same_entity(&b), eq(false));
        assert_that!(a, not(eq(&handle("other", "greeting"))));
    }

    #[rstest]
    fn replace_works_on_key_text() {
        let string = StaticString::new(handle("app", "Hello NAME"), None);

        assert_that!(string.replace("NAME", "Ann"), eq("Hello Ann"));
        assert_that!(string.key(), eq("Hello NAME"));
    }

    #[rstest]
    fn display_renders_markup() {
        let placeholders = json!({"count": 1}).as_object().cloned();
        let string = StaticString::new(handle("app", "items"), placeholders);

        let html = string.to_string();

        assert_that!(html, starts_with("<hawkejs data-i18n"));
        assert_that!(html, contains_substring(r#"data-domain="app""#));
        assert_that!(html, contains_substring(r#"data-key="items""#));
        assert_that!(html, contains_substring(r#"data-params="%7B%22count%22:1%7D""#));
    }
}
