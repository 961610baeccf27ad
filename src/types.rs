//! Core types used throughout the project.

use std::collections::HashMap;

use serde_json::{
    Map,
    Value,
};

/// Domain used when the caller does not name one.
pub const DEFAULT_DOMAIN: &str = "default";

/// Substitution parameters of a translated string (display only).
pub type Placeholders = Map<String, Value>;

/// Fallback translations: locale → text.
pub type Defaults = HashMap<String, String>;
