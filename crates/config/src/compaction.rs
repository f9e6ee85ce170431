//! Compaction thresholds and their runtime patch type.

use serde::{Deserialize, Serialize};

/// Messages kept verbatim when `keep_recent_messages` is unset.
pub const DEFAULT_KEEP_RECENT_MESSAGES: usize = 10;

/// When and how aggressively a conversation is compacted.
///
/// Optional limits that are unset never trigger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompactionConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Compact once the message count reaches this
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_messages: Option<usize>,

    /// Compact once the estimated token count reaches this
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<usize>,

    /// Most-recent messages preserved verbatim (default 10)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keep_recent_messages: Option<usize>,

    /// Write a recovery summary to the daily log before compaction (default true)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_flush_enabled: Option<bool>,

    /// Token estimate at which the memory flush fires
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub soft_threshold_tokens: Option<usize>,
}

fn default_true() -> bool {
    true
}

impl CompactionConfig {
    pub fn keep_recent(&self) -> usize {
        self.keep_recent_messages
            .unwrap_or(DEFAULT_KEEP_RECENT_MESSAGES)
    }

    pub fn flush_enabled(&self) -> bool {
        self.memory_flush_enabled.unwrap_or(true)
    }

    /// Shallow-merge a partial update.
    pub fn apply(&mut self, patch: CompactionConfigPatch) {
        if let Some(enabled) = patch.enabled {
            self.enabled = enabled;
        }
        if let Some(max_messages) = patch.max_messages {
            self.max_messages = max_messages;
        }
        if let Some(max_tokens) = patch.max_tokens {
            self.max_tokens = max_tokens;
        }
        if let Some(keep) = patch.keep_recent_messages {
            self.keep_recent_messages = keep;
        }
        if let Some(flush) = patch.memory_flush_enabled {
            self.memory_flush_enabled = flush;
        }
        if let Some(soft) = patch.soft_threshold_tokens {
            self.soft_threshold_tokens = soft;
        }
    }
}

impl Default for CompactionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_messages: Some(200),
            max_tokens: Some(100_000),
            keep_recent_messages: Some(DEFAULT_KEEP_RECENT_MESSAGES),
            memory_flush_enabled: Some(true),
            soft_threshold_tokens: Some(80_000),
        }
    }
}

/// A partial update to [`CompactionConfig`].
///
/// `None` leaves a field untouched; `Some(None)` clears an optional field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompactionConfigPatch {
    pub enabled: Option<bool>,
    pub max_messages: Option<Option<usize>>,
    pub max_tokens: Option<Option<usize>>,
    pub keep_recent_messages: Option<Option<usize>>,
    pub memory_flush_enabled: Option<Option<bool>>,
    pub soft_threshold_tokens: Option<Option<usize>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unset_fields_use_defaults() {
        let config = CompactionConfig {
            enabled: true,
            max_messages: None,
            max_tokens: None,
            keep_recent_messages: None,
            memory_flush_enabled: None,
            soft_threshold_tokens: None,
        };
        assert_eq!(config.keep_recent(), 10);
        assert!(config.flush_enabled());
    }

    #[test]
    fn patch_merges_only_given_fields() {
        let mut config = CompactionConfig::default();
        config.apply(CompactionConfigPatch {
            max_tokens: Some(Some(1000)),
            soft_threshold_tokens: Some(None),
            ..Default::default()
        });
        assert_eq!(config.max_tokens, Some(1000));
        assert_eq!(config.soft_threshold_tokens, None);
        assert_eq!(config.max_messages, Some(200));
        assert!(config.enabled);
    }

    #[test]
    fn patch_can_disable() {
        let mut config = CompactionConfig::default();
        config.apply(CompactionConfigPatch {
            enabled: Some(false),
            ..Default::default()
        });
        assert!(!config.enabled);
    }

    #[test]
    fn parses_partial_toml() {
        let config: CompactionConfig = toml::from_str("max_tokens = 5000").unwrap();
        assert!(config.enabled);
        assert_eq!(config.max_tokens, Some(5000));
        assert_eq!(config.max_messages, None);
        assert_eq!(config.keep_recent(), 10);
    }
}
