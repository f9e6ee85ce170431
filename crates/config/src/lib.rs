//! Configuration loading, validation, and management for recollect.
//!
//! Loads configuration from `~/.recollect/config.toml` with environment
//! variable overrides. Validates all settings at startup.

pub mod compaction;

pub use compaction::{CompactionConfig, CompactionConfigPatch, DEFAULT_KEEP_RECENT_MESSAGES};

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.recollect/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Compaction thresholds
    #[serde(default)]
    pub compaction: CompactionConfig,

    /// Per-turn context assembly
    #[serde(default)]
    pub context: ContextConfig,

    /// Summarization model settings
    #[serde(default)]
    pub summarizer: SummarizerConfig,

    /// Where transcripts, chat logs, and memory files live
    #[serde(default)]
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextConfig {
    #[serde(default = "default_max_recent_messages")]
    pub max_recent_messages: usize,

    #[serde(default = "default_max_relevant_chunks")]
    pub max_relevant_chunks: usize,

    /// Feed hits longer than this many characters are truncated
    #[serde(default = "default_feed_message_max_chars")]
    pub feed_message_max_chars: usize,

    /// Query embedding model; unset means keyword-only search
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding_model: Option<String>,
}

fn default_max_recent_messages() -> usize {
    20
}
fn default_max_relevant_chunks() -> usize {
    5
}
fn default_feed_message_max_chars() -> usize {
    2000
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            max_recent_messages: default_max_recent_messages(),
            max_relevant_chunks: default_max_relevant_chunks(),
            feed_message_max_chars: default_feed_message_max_chars(),
            embedding_model: None,
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct SummarizerConfig {
    /// Provider label passed through to the summarizer
    #[serde(default = "default_provider")]
    pub provider: String,

    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Second OpenAI-compatible endpoint tried when `base_url` fails or times out
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backup_base_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_model")]
    pub model: String,

    /// Cheaper model tried first for summaries
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub utility_model: Option<String>,

    /// Models tried, in order, after `model` fails
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fallback_models: Vec<String>,

    #[serde(default = "default_context_window")]
    pub context_window: usize,

    #[serde(default = "default_max_summary_tokens")]
    pub max_summary_tokens: usize,

    /// Upper bound on one full summarization pass, and on each endpoint attempt
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_provider() -> String {
    "openai".into()
}
fn default_base_url() -> String {
    "https://api.openai.com/v1".into()
}
fn default_model() -> String {
    "gpt-4o-mini".into()
}
fn default_context_window() -> usize {
    128_000
}
fn default_max_summary_tokens() -> usize {
    2000
}
fn default_timeout_secs() -> u64 {
    120
}

impl Default for SummarizerConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            base_url: default_base_url(),
            backup_base_url: None,
            api_key: None,
            model: default_model(),
            utility_model: None,
            fallback_models: Vec::new(),
            context_window: default_context_window(),
            max_summary_tokens: default_max_summary_tokens(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Redact a secret for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for SummarizerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SummarizerConfig")
            .field("provider", &self.provider)
            .field("base_url", &self.base_url)
            .field("backup_base_url", &self.backup_base_url)
            .field("api_key", &redact(&self.api_key))
            .field("model", &self.model)
            .field("utility_model", &self.utility_model)
            .field("fallback_models", &self.fallback_models)
            .field("context_window", &self.context_window)
            .field("max_summary_tokens", &self.max_summary_tokens)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Overrides `~/.recollect`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,
}

impl StorageConfig {
    pub fn data_dir(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(AppConfig::config_dir)
    }

    pub fn sessions_dir(&self) -> PathBuf {
        self.data_dir().join("sessions")
    }

    pub fn chats_dir(&self) -> PathBuf {
        self.data_dir().join("chats")
    }

    pub fn knowledge_path(&self) -> PathBuf {
        self.data_dir().join("knowledge.jsonl")
    }

    pub fn memory_dir(&self) -> PathBuf {
        self.data_dir().join("memory")
    }

    pub fn session_memory_dir(&self) -> PathBuf {
        self.memory_dir().join("sessions")
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.recollect/config.toml).
    ///
    /// Environment variables override file values:
    /// - `RECOLLECT_API_KEY` (falls back to `OPENAI_API_KEY`)
    /// - `RECOLLECT_MODEL`
    /// - `RECOLLECT_BASE_URL`
    /// - `RECOLLECT_EMBEDDING_MODEL`
    /// - `RECOLLECT_DATA_DIR`
    /// - `RECOLLECT_COMPACTION_ENABLED`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply environment overrides using the given lookup.
    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(key) = lookup("RECOLLECT_API_KEY").or_else(|| lookup("OPENAI_API_KEY")) {
            self.summarizer.api_key = Some(key);
        }
        if let Some(model) = lookup("RECOLLECT_MODEL") {
            self.summarizer.model = model;
        }
        if let Some(url) = lookup("RECOLLECT_BASE_URL") {
            self.summarizer.base_url = url;
        }
        if let Some(url) = lookup("RECOLLECT_BACKUP_BASE_URL") {
            self.summarizer.backup_base_url = Some(url);
        }
        if let Some(model) = lookup("RECOLLECT_EMBEDDING_MODEL") {
            self.context.embedding_model = Some(model);
        }
        if let Some(dir) = lookup("RECOLLECT_DATA_DIR") {
            self.storage.data_dir = Some(PathBuf::from(dir));
        }
        if let Some(enabled) = lookup("RECOLLECT_COMPACTION_ENABLED") {
            match enabled.to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" => self.compaction.enabled = true,
                "0" | "false" | "no" => self.compaction.enabled = false,
                other => {
                    tracing::warn!(value = other, "Ignoring invalid RECOLLECT_COMPACTION_ENABLED")
                }
            }
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".recollect")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.compaction.keep_recent_messages == Some(0) {
            return Err(ConfigError::ValidationError(
                "compaction.keep_recent_messages must be > 0".into(),
            ));
        }

        if let (Some(soft), Some(hard)) =
            (self.compaction.soft_threshold_tokens, self.compaction.max_tokens)
        {
            if soft >= hard {
                return Err(ConfigError::ValidationError(format!(
                    "compaction.soft_threshold_tokens ({soft}) must be below max_tokens ({hard})"
                )));
            }
        }

        if self.summarizer.max_summary_tokens >= self.summarizer.context_window {
            return Err(ConfigError::ValidationError(
                "summarizer.max_summary_tokens must be below context_window".into(),
            ));
        }

        if self.summarizer.timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "summarizer.timeout_secs must be > 0".into(),
            ));
        }

        if self.context.feed_message_max_chars == 0 {
            return Err(ConfigError::ValidationError(
                "context.feed_message_max_chars must be > 0".into(),
            ));
        }

        Ok(())
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.summarizer.api_key.is_some()
    }

    /// Generate a default config TOML string.
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.context.feed_message_max_chars, 2000);
        assert_eq!(config.compaction.keep_recent(), 10);
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.compaction, config.compaction);
        assert_eq!(parsed.summarizer.model, config.summarizer.model);
    }

    #[test]
    fn soft_threshold_above_hard_rejected() {
        let mut config = AppConfig::default();
        config.compaction.soft_threshold_tokens = Some(2000);
        config.compaction.max_tokens = Some(1000);
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_keep_recent_rejected() {
        let mut config = AppConfig::default();
        config.compaction.keep_recent_messages = Some(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn summary_budget_must_fit_window() {
        let mut config = AppConfig::default();
        config.summarizer.context_window = 1000;
        config.summarizer.max_summary_tokens = 1000;
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_summarizer_timeout_rejected() {
        let mut config = AppConfig::default();
        config.summarizer.timeout_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let config = AppConfig::load_from(Path::new("/nonexistent/config.toml")).unwrap();
        assert_eq!(config.summarizer.model, "gpt-4o-mini");
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
[compaction]
max_messages = 50
soft_threshold_tokens = 500
max_tokens = 1000

[context]
feed_message_max_chars = 300
"#,
        )
        .unwrap();

        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.compaction.max_messages, Some(50));
        assert_eq!(config.compaction.max_tokens, Some(1000));
        assert_eq!(config.context.feed_message_max_chars, 300);
        assert_eq!(config.context.max_recent_messages, 20);
    }

    #[test]
    fn invalid_file_reports_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[compaction\nmax_tokens = ").unwrap();
        let err = AppConfig::load_from(&path).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }

    #[test]
    fn env_overrides_apply() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("OPENAI_API_KEY", "sk-env"),
            ("RECOLLECT_MODEL", "gpt-4.1-mini"),
            ("RECOLLECT_BACKUP_BASE_URL", "http://localhost:11434/v1"),
            ("RECOLLECT_DATA_DIR", "/var/lib/recollect"),
            ("RECOLLECT_COMPACTION_ENABLED", "false"),
        ]);
        let mut config = AppConfig::default();
        config.apply_env(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(config.summarizer.api_key.as_deref(), Some("sk-env"));
        assert_eq!(config.summarizer.model, "gpt-4.1-mini");
        assert_eq!(
            config.summarizer.backup_base_url.as_deref(),
            Some("http://localhost:11434/v1")
        );
        assert_eq!(
            config.storage.sessions_dir(),
            PathBuf::from("/var/lib/recollect/sessions")
        );
        assert!(!config.compaction.enabled);
    }

    #[test]
    fn debug_redacts_api_key() {
        let mut config = AppConfig::default();
        config.summarizer.api_key = Some("sk-very-secret".into());
        let debug = format!("{config:?}");
        assert!(!debug.contains("sk-very-secret"));
        assert!(debug.contains("[REDACTED]"));
    }
}
