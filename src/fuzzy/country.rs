//! 国名の参照データとファジー検索

use std::collections::HashMap;

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use super::score::score;
use crate::registry::{
    KeyRequest,
    Registry,
    StaticString,
};

/// Domain under which country display names are registered.
pub const COUNTRIES_DOMAIN: &str = "countries";

/// Reference name checked before the general search.
const GREAT_BRITAIN: &str = "Great Britain";
const GREAT_BRITAIN_ALPHA3: &str = "GBR";
const GREAT_BRITAIN_FUZZINESS: f64 = 0.9;
const GREAT_BRITAIN_THRESHOLD: f64 = 0.7;

/// Fuzziness used against every reference entry.
const SEARCH_FUZZINESS: f64 = 0.5;

#[derive(Error, Debug)]
pub enum CountryDataError {
    #[error("Failed to parse country data: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Country data must be a JSON object or array, got {0}")]
    UnexpectedShape(&'static str),
}

/// One row of the country reference data.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CountryEntry {
    /// Short identifier (alpha-2, alpha-3 or other code).
    #[serde(default)]
    pub code: String,
    pub alpha3: Option<String>,
    pub name: Option<String>,
}

impl CountryEntry {
    #[must_use]
    pub fn new(code: impl Into<String>, alpha3: Option<&str>, name: Option<&str>) -> Self {
        Self {
            code: code.into(),
            alpha3: alpha3.map(str::to_string),
            name: name.map(str::to_string),
        }
    }

    /// `(name, alpha3)` when both are present and non-empty.
    fn searchable(&self) -> Option<(&str, &str)> {
        let name = self.name.as_deref().filter(|n| !n.is_empty())?;
        let alpha3 = self.alpha3.as_deref().filter(|a| !a.is_empty())?;
        Some((name, alpha3))
    }
}

/// Country reference data in a fixed iteration order.
///
/// The order is the tie-break of [`CountryTable::find_country`]: among equal
/// scores the entry seen first wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CountryTable {
    entries: Vec<CountryEntry>,
}

impl CountryTable {
    #[must_use]
    pub const fn new(entries: Vec<CountryEntry>) -> Self {
        Self { entries }
    }

    /// Parses reference data.
    ///
    /// Accepts either an object keyed by code (`{"BEL": {"name": .., "alpha3": ..}}`,
    /// document order is kept) or an array of entries with a `code` field.
    pub fn from_json(json: &str) -> Result<Self, CountryDataError> {
        let value: Value = serde_json::from_str(json)?;

        let entries = match value {
            Value::Object(map) => map
                .into_iter()
                .map(|(code, row)| -> Result<CountryEntry, serde_json::Error> {
                    let mut entry: CountryEntry = serde_json::from_value(row)?;
                    entry.code = code;
                    Ok(entry)
                })
                .collect::<Result<Vec<_>, _>>()?,
            Value::Array(_) => serde_json::from_value(value)?,
            Value::Null => return Err(CountryDataError::UnexpectedShape("null")),
            Value::Bool(_) => return Err(CountryDataError::UnexpectedShape("boolean")),
            Value::Number(_) => return Err(CountryDataError::UnexpectedShape("number")),
            Value::String(_) => return Err(CountryDataError::UnexpectedShape("string")),
        };

        tracing::debug!(count = entries.len(), "Loaded country reference data");
        Ok(Self { entries })
    }

    #[must_use]
    pub fn entries(&self) -> &[CountryEntry] {
        &self.entries
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Resolves a free-text country name to its alpha-3 code.
    ///
    /// 1. `None` / empty input → `None`
    /// 2. Anything close enough to "Great Britain" → `"GBR"`
    /// 3. A leading `"The "` is removed (first occurrence, case-sensitive)
    /// 4. An exact match returns immediately, otherwise the best score wins
    ///
    /// There is no minimum score: a weak best match is still returned, but an
    /// input scoring `0` against every entry yields `None`.
    #[must_use]
    #[allow(clippy::float_cmp)]
    pub fn find_country(&self, name: Option<&str>) -> Option<&str> {
        let name = name.filter(|n| !n.is_empty())?;

        if score(GREAT_BRITAIN, name, GREAT_BRITAIN_FUZZINESS) > GREAT_BRITAIN_THRESHOLD {
            return Some(GREAT_BRITAIN_ALPHA3);
        }

        let name = name.replacen("The ", "", 1);

        let mut best_score = 0.0;
        let mut best = None;
        for (reference, alpha3) in self.entries.iter().filter_map(CountryEntry::searchable) {
            let current = score(reference, &name, SEARCH_FUZZINESS);

            if current == 1.0 {
                return Some(alpha3);
            }

            // 同点の場合は先に見つかったエントリを優先
            if current > best_score {
                best_score = current;
                best = Some(alpha3);
            }
        }

        best
    }

    /// Registers the display name of every entry under [`COUNTRIES_DOMAIN`].
    ///
    /// Only entries whose code has at least three characters take part, and
    /// entries without a name are skipped.
    ///
    /// # Returns
    /// code → registered string
    pub fn register_names(&self, registry: &Registry) -> HashMap<String, StaticString> {
        self.entries
            .iter()
            .filter(|entry| entry.code.chars().count() >= 3)
            .filter_map(|entry| {
                let name = entry.name.as_deref().filter(|n| !n.is_empty())?;
                let string =
                    registry.get_or_create(KeyRequest::in_domain(COUNTRIES_DOMAIN, name));
                Some((entry.code.clone(), string))
            })
            .collect()
    }
}
