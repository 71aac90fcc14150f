//! Configuration loading and validation for hearthloop.
//!
//! Loads configuration from a TOML file with serde defaults for every
//! field, so an empty file is a valid configuration. Validates all
//! settings at startup: iteration ceilings must stay inside their
//! per-mode bands, the policy length bounds must be ordered, and the
//! parser order must not be empty.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use hearthloop_core::SessionMode;

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// The root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// The model identifier passed to the provider
    #[serde(default = "default_model")]
    pub model: String,

    /// Which wire format the parser chain tries first for this model
    #[serde(default)]
    pub parser_order: ParserOrder,

    /// Quick-lookup mode settings
    #[serde(default = "ModeConfig::quick_lookup")]
    pub quick_lookup: ModeConfig,

    /// Research mode settings
    #[serde(default = "ModeConfig::research")]
    pub research: ModeConfig,

    /// Ingest mode settings
    #[serde(default = "ModeConfig::ingest")]
    pub ingest: ModeConfig,

    /// Admission-control limits
    #[serde(default)]
    pub policy: PolicyConfig,

    /// Parallel tool dispatch width
    #[serde(default = "default_dispatch_width")]
    pub dispatch_width: usize,
}

/// Which wire format the parser chain tries first.
///
/// Both formats are always supported; the order is per-model
/// configuration, never a hardcoded choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ParserOrder {
    /// Structured tag first (`<tool_call><function=...>`), then JSON object.
    #[default]
    TagFirst,
    /// JSON object first, then structured tag.
    ObjectFirst,
}

/// Per-mode turn budgets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModeConfig {
    /// Iteration ceiling for a single turn
    pub max_iterations: u32,

    /// Temperature for tool-selection iterations
    pub tool_temperature: f32,

    /// Temperature for free-form synthesis / final answers
    pub synthesis_temperature: f32,

    /// Max tokens per model response
    pub max_tokens: u32,

    /// Tool-result count above which older results are compacted
    pub compaction_threshold: usize,

    /// How many most-recent results stay verbatim after compaction
    pub compaction_tail: usize,
}

impl ModeConfig {
    pub fn quick_lookup() -> Self {
        Self {
            max_iterations: 2,
            tool_temperature: 0.2,
            synthesis_temperature: 0.7,
            max_tokens: 1024,
            compaction_threshold: 8,
            compaction_tail: 3,
        }
    }

    pub fn research() -> Self {
        Self {
            max_iterations: 12,
            tool_temperature: 0.2,
            synthesis_temperature: 0.8,
            max_tokens: 4096,
            compaction_threshold: 5,
            compaction_tail: 3,
        }
    }

    pub fn ingest() -> Self {
        Self {
            max_iterations: 4,
            tool_temperature: 0.1,
            synthesis_temperature: 0.3,
            max_tokens: 512,
            compaction_threshold: 8,
            compaction_tail: 3,
        }
    }
}

/// Admission-control limits enforced by the tool policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyConfig {
    /// Minimum length of a query string; shorter proposals are rejected
    #[serde(default = "default_query_min_len")]
    pub query_min_len: usize,

    /// Maximum length of a query string; longer queries are truncated,
    /// not rejected
    #[serde(default = "default_query_max_len")]
    pub query_max_len: usize,

    /// Cap applied (clamped, not rejected) to numeric result-count args
    #[serde(default = "default_max_results")]
    pub max_results: u64,

    /// Namespaces a memory write may target
    #[serde(default = "default_write_namespaces")]
    pub write_namespaces: Vec<String>,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            query_min_len: default_query_min_len(),
            query_max_len: default_query_max_len(),
            max_results: default_max_results(),
            write_namespaces: default_write_namespaces(),
        }
    }
}

fn default_model() -> String {
    "local/assistant".into()
}

fn default_dispatch_width() -> usize {
    3
}

fn default_query_min_len() -> usize {
    3
}

fn default_query_max_len() -> usize {
    512
}

fn default_max_results() -> u64 {
    25
}

fn default_write_namespaces() -> Vec<String> {
    vec!["notes".into(), "facts".into(), "preferences".into()]
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            parser_order: ParserOrder::default(),
            quick_lookup: ModeConfig::quick_lookup(),
            research: ModeConfig::research(),
            ingest: ModeConfig::ingest(),
            policy: PolicyConfig::default(),
            dispatch_width: default_dispatch_width(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        let config: AppConfig = toml::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// The mode configuration for a given session mode.
    pub fn mode(&self, mode: SessionMode) -> &ModeConfig {
        match mode {
            SessionMode::QuickLookup => &self.quick_lookup,
            SessionMode::Research => &self.research,
            SessionMode::Ingest => &self.ingest,
        }
    }

    /// Validate settings. Called on load; callers building a config in
    /// code should call it too.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=2).contains(&self.quick_lookup.max_iterations) {
            return Err(ConfigError::Invalid(
                "quick_lookup.max_iterations must be 1 or 2".into(),
            ));
        }
        if !(10..=25).contains(&self.research.max_iterations) {
            return Err(ConfigError::Invalid(
                "research.max_iterations must be between 10 and 25".into(),
            ));
        }
        if !(1..=8).contains(&self.ingest.max_iterations) {
            return Err(ConfigError::Invalid(
                "ingest.max_iterations must be between 1 and 8".into(),
            ));
        }
        if self.policy.query_min_len >= self.policy.query_max_len {
            return Err(ConfigError::Invalid(
                "policy.query_min_len must be below policy.query_max_len".into(),
            ));
        }
        if self.dispatch_width == 0 {
            return Err(ConfigError::Invalid("dispatch_width must be at least 1".into()));
        }
        for mode in [&self.quick_lookup, &self.research, &self.ingest] {
            if mode.compaction_tail == 0 || mode.compaction_tail > mode.compaction_threshold {
                return Err(ConfigError::Invalid(
                    "compaction_tail must be between 1 and compaction_threshold".into(),
                ));
            }
        }
        Ok(())
    }
}
