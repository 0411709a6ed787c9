//! Session configuration.
//!
//! Every field has a default matching what chat hosts typically need, so an
//! empty object (or no config at all) is valid. Field names are camelCase so
//! the same struct deserializes straight from a JS object.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::scanner::Delimiters;

pub const DEFAULT_DEBOUNCE_MS: u64 = 100;
pub const DEFAULT_VISIBILITY_MARGIN: f64 = 100.0;
pub const DEFAULT_CACHE_CAPACITY: usize = 500;
pub const DEFAULT_MARKER_ATTRIBUTE: &str = "data-latex-done";

const KATEX_CDN: &str = "https://cdn.jsdelivr.net/npm/katex@0.16.9/dist";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Config {
    /// Inline math delimiter.
    pub delimiter: char,
    /// Escape character that makes a following delimiter literal.
    pub escape: char,
    /// Quiet period after the last qualifying mutation before a rescan.
    pub debounce_ms: u64,
    /// Distance beyond the viewport within which nodes are processed eagerly.
    pub visibility_margin: f64,
    /// Maximum number of whole-text render results kept.
    pub cache_capacity: usize,
    /// Attribute set on nodes once rendered.
    pub marker_attribute: String,
    /// CSS selector for candidate elements.
    pub selector: String,
    /// Elements inside these tags are never rewritten.
    pub ignored_tags: Vec<String>,
    pub katex_script_url: String,
    pub katex_stylesheet_url: String,
    /// Fall back to native MathML output when no JS typesetter is present.
    pub mathml_fallback: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            delimiter: '$',
            escape: '\\',
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            visibility_margin: DEFAULT_VISIBILITY_MARGIN,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            marker_attribute: DEFAULT_MARKER_ATTRIBUTE.into(),
            selector: "p, li".into(),
            ignored_tags: ["script", "noscript", "style", "textarea", "pre", "code", "iframe"]
                .into_iter()
                .map(String::from)
                .collect(),
            katex_script_url: format!("{KATEX_CDN}/katex.min.js"),
            katex_stylesheet_url: format!("{KATEX_CDN}/katex.min.css"),
            mathml_fallback: false,
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cache_capacity == 0 {
            return Err(ConfigError::ZeroCapacity);
        }
        if self.delimiter == self.escape {
            return Err(ConfigError::ConflictingDelimiters(self.delimiter));
        }
        if self.selector.trim().is_empty() {
            return Err(ConfigError::InvalidSelector);
        }
        let marker_ok = !self.marker_attribute.is_empty()
            && self
                .marker_attribute
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !marker_ok {
            return Err(ConfigError::InvalidMarker(self.marker_attribute.clone()));
        }
        Ok(())
    }

    pub fn delimiters(&self) -> Delimiters {
        Delimiters {
            delimiter: self.delimiter,
            escape: self.escape,
        }
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}
