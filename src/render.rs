//! 描画側へ渡すデータ
//!
//! Translation itself happens in the display layer. This module only turns a
//! registered string into a record the renderer understands, plus the settings
//! payload exposed to clients.

use serde::Serialize;

use crate::config::I18nSettings;
use crate::types::Placeholders;

/// Element name used by `Display` on strings.
pub const DEFAULT_MARKUP_TAG: &str = "hawkejs";

/// Renderer-facing representation of one localized string.
///
/// `params` holds the URI encoded JSON of the placeholders (see
/// [`encode_uri`]), or an empty string when there are none.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Markup {
    pub domain: String,
    pub key: String,
    pub params: String,
}

impl Markup {
    #[must_use]
    pub fn new(domain: &str, key: &str, placeholders: Option<&Placeholders>) -> Self {
        Self { domain: domain.to_string(), key: key.to_string(), params: encode_params(placeholders) }
    }
}

/// Characters left as-is by URI encoding on top of the unreserved set.
///
/// `(escape, char)` pairs restored after component encoding.
const URI_RESERVED: [(&str, &str); 15] = [
    ("%3B", ";"),
    ("%2C", ","),
    ("%2F", "/"),
    ("%3F", "?"),
    ("%3A", ":"),
    ("%40", "@"),
    ("%26", "&"),
    ("%3D", "="),
    ("%2B", "+"),
    ("%24", "$"),
    ("%21", "!"),
    ("%2A", "*"),
    ("%27", "'"),
    ("%28", "("),
    ("%29", ")"),
];

/// Percent-encodes `text` as a whole URI, keeping reserved delimiters such as
/// `:` `,` `/` `?` `&` `=` and `#` readable.
///
/// Quotes, angle brackets, spaces, `%` and non-ASCII are still escaped, so the
/// result is safe inside a double-quoted attribute and `decodeURI` restores it.
#[must_use]
pub fn encode_uri(text: &str) -> String {
    // '#' は別扱い: 成分エンコードでは %23
    let mut encoded = urlencoding::encode(text).replace("%23", "#");
    for (escape, plain) in URI_RESERVED {
        // 元の '%' は %25 になるので、"%XX" が誤って一致することはない
        encoded = encoded.replace(escape, plain);
    }
    encoded
}

/// Encodes placeholders for transport inside an attribute.
#[must_use]
pub fn encode_params(placeholders: Option<&Placeholders>) -> String {
    placeholders
        .and_then(|p| serde_json::to_string(p).ok())
        .map(|json| encode_uri(&json))
        .unwrap_or_default()
}

/// Renders `markup` as an empty element the renderer fills in later.
#[must_use]
pub fn to_html(markup: &Markup, tag: &str) -> String {
    format!(
        r#"<{tag} data-i18n data-domain="{}" data-key="{}" data-params="{}"></{tag}>"#,
        encode_uri(&markup.domain),
        encode_uri(&markup.key),
        markup.params,
    )
}

/// Renders `markup` as a JSON object.
///
/// # Errors
/// - Serialization failed
pub fn to_json(markup: &Markup) -> Result<String, serde_json::Error> {
    serde_json::to_string(markup)
}

/// Locale settings handed to the client, read-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExposedSettings {
    pub locale: String,
    pub prefix: Option<String>,
    pub fallback: Vec<String>,
}

impl From<&I18nSettings> for ExposedSettings {
    fn from(settings: &I18nSettings) -> Self {
        Self {
            locale: settings.locale.clone(),
            prefix: settings.prefix.clone(),
            fallback: settings.fallback.clone(),
        }
    }
}

/// Payload exposed to full page renders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientExposure {
    pub i18n_domains: Vec<String>,
    pub i18n_settings: ExposedSettings,
}
