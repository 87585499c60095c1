// src/config/ai.rs
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_CONTENT_SELECTOR: &str = ".entry_content, .entry-content, article";
pub const DEFAULT_ENRICH_DELAY_MS: u64 = 2_000;

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}
fn default_selector() -> String {
    DEFAULT_CONTENT_SELECTOR.to_string()
}
fn default_delay_ms() -> u64 {
    DEFAULT_ENRICH_DELAY_MS
}
fn default_max_fragment_chars() -> usize {
    12_000
}

/// `[ai]` table of the monitor config. Enrichment runs only when an API key
/// resolves to something non-empty.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AiSection {
    /// Literal key, or "ENV" to read OPENAI_API_KEY.
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_selector")]
    pub content_selector: String,
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,
    #[serde(default = "default_max_fragment_chars")]
    pub max_fragment_chars: usize,
}

impl Default for AiSection {
    fn default() -> Self {
        Self {
            api_key: None,
            model: default_model(),
            content_selector: default_selector(),
            delay_ms: default_delay_ms(),
            max_fragment_chars: default_max_fragment_chars(),
        }
    }
}

/// Resolved enrichment settings. Exists only when enrichment is enabled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnrichmentSettings {
    pub api_key: String,
    pub model: String,
    pub content_selector: String,
    pub delay: Duration,
    pub max_fragment_chars: usize,
}

impl AiSection {
    pub fn apply_env(&mut self) {
        if let Ok(k) = env::var("OPENAI_API_KEY") {
            // explicit key in the file wins over the env unless it asks for ENV
            let from_file = self
                .api_key
                .as_deref()
                .map(|s| !s.trim().eq_ignore_ascii_case("env") && !s.trim().is_empty())
                .unwrap_or(false);
            if !from_file {
                self.api_key = Some(k);
            }
        }
        if let Ok(m) = env::var("OPENAI_MODEL") {
            if !m.trim().is_empty() {
                self.model = m.trim().to_string();
            }
        }
        if let Ok(sel) = env::var("CONTENT_SELECTOR") {
            if !sel.trim().is_empty() {
                self.content_selector = sel.trim().to_string();
            }
        }
        if let Some(ms) = env::var("ENRICH_DELAY_MS").ok().and_then(|v| v.parse().ok()) {
            self.delay_ms = ms;
        }
    }

    pub fn resolve(&self) -> Option<EnrichmentSettings> {
        let key = self.api_key.as_deref().map(str::trim).unwrap_or_default();
        if key.is_empty() || key.eq_ignore_ascii_case("env") {
            return None;
        }
        Some(EnrichmentSettings {
            api_key: key.to_string(),
            model: self.model.clone(),
            content_selector: self.content_selector.clone(),
            delay: Duration::from_millis(self.delay_ms),
            max_fragment_chars: self.max_fragment_chars.max(256),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_or_placeholder_key_disables_enrichment() {
        let mut s = AiSection::default();
        assert!(s.resolve().is_none());
        s.api_key = Some("ENV".into());
        assert!(s.resolve().is_none());
        s.api_key = Some("  ".into());
        assert!(s.resolve().is_none());
    }

    #[test]
    fn resolved_settings_clamp_fragment_budget() {
        let s = AiSection {
            api_key: Some("sk-test".into()),
            max_fragment_chars: 10,
            ..AiSection::default()
        };
        let r = s.resolve().expect("enabled");
        assert_eq!(r.api_key, "sk-test");
        assert_eq!(r.max_fragment_chars, 256);
        assert_eq!(r.delay, Duration::from_millis(DEFAULT_ENRICH_DELAY_MS));
    }
}
