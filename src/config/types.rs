use serde::{
    Deserialize,
    Serialize,
};
use thiserror::Error;

use crate::render::DEFAULT_MARKUP_TAG;

/// Name of the configuration file looked up in the project directory.
pub const CONFIG_FILE_NAME: &str = ".static-i18n.json";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Configuration error in '{field_path}': {message}")]
pub struct ValidationError {
    /// JSON path to the field (e.g., "fallback[0]")
    pub field_path: String,
    pub message: String,
}

impl ValidationError {
    #[must_use]
    pub fn new(field_path: impl Into<String>, message: impl Into<String>) -> Self {
        Self { field_path: field_path.into(), message: message.into() }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration validation failed:\n{}", format_validation_errors(.0))]
    ValidationErrors(Vec<ValidationError>),

    #[error("Failed to load configuration file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse configuration: {0}")]
    ParseError(#[from] serde_json::Error),
}

fn format_validation_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .enumerate()
        .map(|(i, err)| format!("  {}. {} - {}", i + 1, err.field_path, err.message))
        .collect::<Vec<_>>()
        .join("\n")
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct I18nSettings {
    /// Active locale handed to the renderer.
    pub locale: String,

    /// URL prefix of the active locale, if any.
    pub prefix: Option<String>,

    /// Locales tried in order when a translation is missing.
    pub fallback: Vec<String>,

    /// Low-priority delay before newly seen keys are persisted.
    pub flush_delay_ms: u64,

    /// Element name of the rendered markup.
    pub markup_tag: String,
}

impl I18nSettings {
    /// # Errors
    /// - Required field is empty
    /// - Invalid markup tag
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        if self.locale.is_empty() {
            errors.push(ValidationError::new(
                "locale",
                "The locale cannot be empty. Please specify a locale, for example: \"en\"",
            ));
        }

        if let Some(prefix) = &self.prefix
            && prefix.is_empty()
        {
            errors.push(ValidationError::new(
                "prefix",
                "The prefix cannot be empty. Please specify a prefix (e.g., \"en\"), or remove this field",
            ));
        }

        for (index, locale) in self.fallback.iter().enumerate() {
            if locale.is_empty() {
                errors.push(ValidationError::new(
                    format!("fallback[{index}]"),
                    "Fallback locales cannot be empty",
                ));
            }
        }

        if self.markup_tag.is_empty() {
            errors.push(ValidationError::new(
                "markupTag",
                "The tag cannot be empty. Example: \"hawkejs\"",
            ));
        } else if !is_valid_tag(&self.markup_tag) {
            errors.push(ValidationError::new(
                "markupTag",
                format!(
                    "Invalid tag '{}': use ASCII letters, digits and '-', starting with a letter",
                    self.markup_tag
                ),
            ));
        }

        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}

fn is_valid_tag(tag: &str) -> bool {
    let mut chars = tag.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '-')
}

impl Default for I18nSettings {
    fn default() -> Self {
        Self {
            locale: "en".to_string(),
            prefix: None,
            fallback: vec!["en".to_string()],
            flush_delay_ms: 500,
            markup_tag: DEFAULT_MARKUP_TAG.to_string(),
        }
    }
}
