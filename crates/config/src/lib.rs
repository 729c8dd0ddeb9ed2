use std::env;
use std::fs;
use std::path::Path;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ── Extraction strategy ───────────────────────────────────────────────────────

/// How an extraction call is driven.
///
/// | Strategy      | Behaviour                                                       |
/// |---------------|-----------------------------------------------------------------|
/// | `two_pass`    | outline → oracle picks identifiers → extract → synthesize.      |
/// | `single_pass` | cleaned page text is sent to the oracle in one prompt.          |
/// | `auto`        | single pass when the cleaned text fits the budget, else two pass.|
/// | `agentic`     | snapshot-driven QUERYING/DONE/NOTFOUND/SEARCH loop.             |
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    #[default]
    TwoPass,
    SinglePass,
    Auto,
    Agentic,
}

/// How the section selector reads the oracle's identifier reply.
///
/// `loose` splits free text into plain hints and matches them as
/// case-insensitive substrings.  It is weaker than `strict` and produces
/// false positives on most real pages.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectionMode {
    #[default]
    Strict,
    Loose,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub provider: String,
    pub ollama_model: String,
    pub openrouter_model: String,
    /// Base URL for the Ollama API.  Overridden at runtime by the
    /// `OLLAMA_BASE_URL` environment variable when set.
    pub ollama_base_url: String,
    /// OpenRouter API key.  `OPENROUTER_API_KEY` takes precedence.
    pub openrouter_api_key: String,
    /// Upper bound for a single oracle request.
    pub request_timeout_secs: u64,
    /// Retries on transient failures (connect, timeout, 5xx).  `0` disables.
    pub max_retries: u32,
    /// First backoff delay; doubles on each retry.
    pub retry_backoff_ms: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "ollama".to_string(),
            ollama_model: "llama3.2:1b".to_string(),
            openrouter_model: "openai/gpt-4o-mini".to_string(),
            ollama_base_url: "http://localhost:11434".to_string(),
            openrouter_api_key: String::new(),
            request_timeout_secs: 120,
            max_retries: 0,
            retry_backoff_ms: 500,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    /// Fetch through the JS-rendering reader proxy instead of a plain GET.
    pub render_js: bool,
    /// Navigation budget; the fetch fails fast once it elapses.
    pub navigation_timeout_secs: u64,
    /// Prefix of the reader proxy (the target URL is appended).
    pub reader_proxy_url: String,
    /// Raw bytes kept from a response body before parsing.
    pub max_download_bytes: usize,
    pub user_agent: String,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            render_js: true,
            navigation_timeout_secs: 30,
            reader_proxy_url: "https://r.jina.ai/".to_string(),
            max_download_bytes: 4_000_000,
            user_agent: "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 \
                (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36"
                .to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    pub strategy: Strategy,
    pub selection_mode: SelectionMode,
    /// Tags (or accessibility roles) that appear in the outline.
    pub outline_tags: Vec<String>,
    /// Characters of element text kept after `→` in an outline line.
    pub outline_text_chars: usize,
    /// Outline lines sent to the oracle; the rest are summarised as a count.
    pub outline_max_entries: usize,
    /// Subtrees dropped before any digest is built.
    pub excluded_tags: Vec<String>,
    /// Joins deduplicated matches of one identifier.
    pub item_separator: String,
    /// Joins the blocks of different identifiers.
    pub block_separator: String,
    /// Cleaned-text budget for the single-pass prompt (and the `auto` switch).
    pub single_pass_max_chars: usize,
    /// Budget for the serialized structured-element list.
    pub max_structured_chars: usize,
    /// Query attempts of the agentic state machine before it gives up.
    pub max_attempts: usize,
    /// Initial snapshot window of the agentic loop; doubles on every SEARCH.
    pub snapshot_window_chars: usize,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            strategy: Strategy::TwoPass,
            selection_mode: SelectionMode::Strict,
            outline_tags: [
                "h1", "h2", "h3", "h4", "h5", "h6", "p", "span", "div", "section", "table",
                "heading", "paragraph", "region",
            ]
            .iter()
            .map(ToString::to_string)
            .collect(),
            outline_text_chars: 50,
            outline_max_entries: 400,
            excluded_tags: [
                "script",
                "style",
                "noscript",
                "nav",
                "header",
                "footer",
                "aside",
                "navigation",
                "banner",
                "contentinfo",
                "complementary",
            ]
            .iter()
            .map(ToString::to_string)
            .collect(),
            item_separator: "\n".to_string(),
            block_separator: "\n---\n".to_string(),
            single_pass_max_chars: 10_000,
            max_structured_chars: 24_000,
            max_attempts: 3,
            snapshot_window_chars: 8_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    pub log_level: String,
    /// Emit JSON log lines instead of the human-readable format.
    pub json: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json: false,
        }
    }
}

/// Per-stage artifact persistence (outline, oracle replies, extracted text).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiagnosticsConfig {
    pub enabled: bool,
    pub dir: String,
}

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            dir: "logs".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    pub socket_path: String,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            socket_path: "/tmp/pagesift.sock".to_string(),
        }
    }
}

/// A configuration that parsed but cannot drive an extraction.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("unknown llm provider '{0}' (expected 'ollama' or 'openrouter')")]
    UnknownProvider(String),
    #[error("no model configured for provider '{0}'")]
    MissingModel(String),
    #[error("missing endpoint: {0}")]
    MissingEndpoint(&'static str),
    #[error("{0} must be greater than zero")]
    ZeroLimit(&'static str),
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub llm: LlmConfig,
    pub renderer: RendererConfig,
    pub extraction: ExtractionConfig,
    pub telemetry: TelemetryConfig,
    pub diagnostics: DiagnosticsConfig,
    pub daemon: DaemonConfig,
}

impl AppConfig {
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let mut config = Self::default();
        if let Ok(raw) = fs::read_to_string(path) {
            config = toml::from_str(&raw)?;
        }
        config.apply_env_overrides(|key| env::var(key).ok());
        Ok(config)
    }

    /// Apply environment overrides through `lookup` so callers (and tests)
    /// control where the values come from.
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(value) = non_empty("OLLAMA_BASE_URL") {
            self.llm.provider = "ollama".to_string();
            self.llm.ollama_base_url = value;
        }

        if let Some(key) = non_empty("OPENROUTER_API_KEY") {
            self.llm.openrouter_api_key = key;
        }

        if let Some(model) = non_empty("PAGESIFT_MODEL") {
            if self.is_openrouter() {
                self.llm.openrouter_model = model;
            } else {
                self.llm.ollama_model = model;
            }
        }
    }

    pub fn save_to(&self, path: impl AsRef<Path>) -> Result<()> {
        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent)?;
        }

        let rendered = toml::to_string_pretty(self)?;
        fs::write(path, rendered)?;
        Ok(())
    }

    pub fn is_openrouter(&self) -> bool {
        self.llm.provider.eq_ignore_ascii_case("openrouter")
    }

    pub fn active_model(&self) -> &str {
        if self.is_openrouter() {
            &self.llm.openrouter_model
        } else {
            &self.llm.ollama_model
        }
    }

    /// Check the settings an extraction cannot run without.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let provider = self.llm.provider.to_ascii_lowercase();
        if provider != "ollama" && provider != "openrouter" {
            return Err(ConfigError::UnknownProvider(self.llm.provider.clone()));
        }
        if self.active_model().trim().is_empty() {
            return Err(ConfigError::MissingModel(provider));
        }
        if provider == "ollama" && self.llm.ollama_base_url.trim().is_empty() {
            return Err(ConfigError::MissingEndpoint("llm.ollama_base_url"));
        }
        if provider == "openrouter" && self.llm.openrouter_api_key.trim().is_empty() {
            return Err(ConfigError::MissingEndpoint(
                "llm.openrouter_api_key (or OPENROUTER_API_KEY)",
            ));
        }
        if self.renderer.render_js && self.renderer.reader_proxy_url.trim().is_empty() {
            return Err(ConfigError::MissingEndpoint("renderer.reader_proxy_url"));
        }
        if self.renderer.navigation_timeout_secs == 0 {
            return Err(ConfigError::ZeroLimit("renderer.navigation_timeout_secs"));
        }
        if self.llm.request_timeout_secs == 0 {
            return Err(ConfigError::ZeroLimit("llm.request_timeout_secs"));
        }
        if self.extraction.max_attempts == 0 {
            return Err(ConfigError::ZeroLimit("extraction.max_attempts"));
        }
        Ok(())
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::fs;
    use tempfile::TempDir;

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    // ── Defaults ───────────────────────────────────────────────────────────

    #[test]
    fn defaults() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.llm.provider, "ollama");
        assert_eq!(cfg.llm.ollama_model, "llama3.2:1b");
        assert_eq!(cfg.llm.ollama_base_url, "http://localhost:11434");
        assert_eq!(cfg.llm.max_retries, 0, "oracle calls must not retry silently by default");
        assert_eq!(cfg.renderer.navigation_timeout_secs, 30);
        assert!(cfg.renderer.render_js);
        assert_eq!(cfg.extraction.strategy, Strategy::TwoPass);
        assert_eq!(cfg.extraction.selection_mode, SelectionMode::Strict);
        assert_eq!(cfg.extraction.outline_text_chars, 50);
        assert_eq!(cfg.extraction.block_separator, "\n---\n");
        assert_eq!(cfg.telemetry.log_level, "info");
        assert!(!cfg.diagnostics.enabled);
        assert_eq!(cfg.daemon.socket_path, "/tmp/pagesift.sock");
    }

    #[test]
    fn default_outline_tags_cover_headings_and_containers() {
        let tags = ExtractionConfig::default().outline_tags;
        for tag in ["h1", "h6", "p", "span", "div", "section", "table"] {
            assert!(tags.iter().any(|t| t == tag), "missing {tag}");
        }
    }

    #[test]
    fn default_exclusions_cover_boilerplate() {
        let excluded = ExtractionConfig::default().excluded_tags;
        for tag in ["script", "style", "nav", "header", "footer", "aside"] {
            assert!(excluded.iter().any(|t| t == tag), "missing {tag}");
        }
    }

    // ── load_from ──────────────────────────────────────────────────────────

    #[test]
    fn load_from_missing_file_returns_defaults() {
        let dir = TempDir::new().unwrap();
        let cfg = AppConfig::load_from(dir.path().join("nonexistent.toml")).unwrap();
        assert_eq!(cfg.extraction.max_attempts, 3);
    }

    #[test]
    fn load_from_valid_toml() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("test.toml");
        fs::write(
            &path,
            r#"
[llm]
ollama_model = "custom:7b"
request_timeout_secs = 45
max_retries = 2

[renderer]
render_js = false
navigation_timeout_secs = 10

[extraction]
strategy = "agentic"
selection_mode = "loose"
outline_tags = ["h2", "table"]
"#,
        )
        .unwrap();

        let cfg = AppConfig::load_from(&path).unwrap();
        assert_eq!(cfg.llm.ollama_model, "custom:7b");
        assert_eq!(cfg.llm.request_timeout_secs, 45);
        assert_eq!(cfg.llm.max_retries, 2);
        assert!(!cfg.renderer.render_js);
        assert_eq!(cfg.renderer.navigation_timeout_secs, 10);
        assert_eq!(cfg.extraction.strategy, Strategy::Agentic);
        assert_eq!(cfg.extraction.selection_mode, SelectionMode::Loose);
        assert_eq!(cfg.extraction.outline_tags, vec!["h2", "table"]);
        // Unspecified fields keep their defaults.
        assert_eq!(cfg.extraction.item_separator, "\n");
        assert_eq!(cfg.daemon.socket_path, "/tmp/pagesift.sock");
    }

    #[test]
    fn load_from_invalid_toml_returns_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.toml");
        fs::write(&path, "this is not valid toml {{{{").unwrap();
        assert!(AppConfig::load_from(&path).is_err());
    }

    #[test]
    fn save_and_reload_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sub/config.toml");

        let mut cfg = AppConfig::default();
        cfg.extraction.strategy = Strategy::Auto;
        cfg.diagnostics.enabled = true;
        cfg.save_to(&path).unwrap();

        let loaded = AppConfig::load_from(&path).unwrap();
        assert_eq!(loaded.extraction.strategy, Strategy::Auto);
        assert!(loaded.diagnostics.enabled);
    }

    // ── Env overrides ──────────────────────────────────────────────────────

    #[test]
    fn env_ollama_base_url_forces_ollama_provider() {
        let mut cfg = AppConfig::default();
        cfg.llm.provider = "openrouter".to_string();
        cfg.apply_env_overrides(env_from(&[("OLLAMA_BASE_URL", "http://ollama:11434")]));
        assert_eq!(cfg.llm.provider, "ollama");
        assert_eq!(cfg.llm.ollama_base_url, "http://ollama:11434");
    }

    #[test]
    fn env_model_targets_active_provider() {
        let mut cfg = AppConfig::default();
        cfg.llm.provider = "openrouter".to_string();
        cfg.apply_env_overrides(env_from(&[
            ("PAGESIFT_MODEL", "meta-llama/llama-3.1-8b-instruct"),
            ("OPENROUTER_API_KEY", "sk-test"),
        ]));
        assert_eq!(cfg.llm.openrouter_model, "meta-llama/llama-3.1-8b-instruct");
        assert_eq!(cfg.llm.ollama_model, "llama3.2:1b");
        assert_eq!(cfg.llm.openrouter_api_key, "sk-test");
    }

    #[test]
    fn blank_env_values_are_ignored() {
        let mut cfg = AppConfig::default();
        cfg.apply_env_overrides(env_from(&[("OLLAMA_BASE_URL", "  ")]));
        assert_eq!(cfg.llm.ollama_base_url, "http://localhost:11434");
    }

    // ── validate ───────────────────────────────────────────────────────────

    #[test]
    fn default_config_is_valid() {
        assert_eq!(AppConfig::default().validate(), Ok(()));
    }

    #[test]
    fn validate_rejects_missing_model() {
        let mut cfg = AppConfig::default();
        cfg.llm.ollama_model = " ".to_string();
        assert_eq!(
            cfg.validate(),
            Err(ConfigError::MissingModel("ollama".to_string()))
        );
    }

    #[test]
    fn validate_requires_openrouter_key() {
        let mut cfg = AppConfig::default();
        cfg.llm.provider = "OpenRouter".to_string();
        assert!(matches!(cfg.validate(), Err(ConfigError::MissingEndpoint(_))));
        cfg.llm.openrouter_api_key = "sk-test".to_string();
        assert_eq!(cfg.validate(), Ok(()));
    }

    #[test]
    fn validate_rejects_unknown_provider_and_zero_limits() {
        let mut cfg = AppConfig::default();
        cfg.llm.provider = "bard".to_string();
        assert_eq!(
            cfg.validate(),
            Err(ConfigError::UnknownProvider("bard".to_string()))
        );

        let mut cfg = AppConfig::default();
        cfg.renderer.navigation_timeout_secs = 0;
        assert!(matches!(cfg.validate(), Err(ConfigError::ZeroLimit(_))));
    }

    #[test]
    fn strategy_serde_labels() {
        for (strategy, label) in [
            (Strategy::TwoPass, "\"two_pass\""),
            (Strategy::SinglePass, "\"single_pass\""),
            (Strategy::Auto, "\"auto\""),
            (Strategy::Agentic, "\"agentic\""),
        ] {
            assert_eq!(serde_json::to_string(&strategy).unwrap(), label);
        }
    }
}
