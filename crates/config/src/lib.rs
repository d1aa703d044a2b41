//! Configuration loading, validation, and management for Lectern.
//!
//! Loads configuration from `~/.lectern/config.toml` with environment
//! variable overrides. Validates all settings at load time.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.lectern/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Normalization and index settings
    #[serde(default)]
    pub index: IndexConfig,

    /// Context selection settings
    #[serde(default)]
    pub context: ContextConfig,

    /// Generation orchestration settings
    #[serde(default)]
    pub generation: GenerationConfig,

    /// Citation verification settings
    #[serde(default)]
    pub verify: VerifyConfig,

    /// Artifact generator settings
    #[serde(default)]
    pub artifacts: ArtifactConfig,

    /// Capacity of the domain event bus
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

fn default_event_capacity() -> usize {
    256
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConfig {
    /// Max distance in seconds between a segment midpoint and its linked frame
    #[serde(default = "default_frame_tolerance")]
    pub frame_tolerance_secs: f64,

    /// Below this many segments, embeddings are scored for every segment
    #[serde(default = "default_shortlist_threshold")]
    pub shortlist_threshold: usize,

    /// Reciprocal Rank Fusion constant
    #[serde(default = "default_rrf_k")]
    pub rrf_k: f64,

    /// BM25 term-frequency saturation
    #[serde(default = "default_bm25_k1")]
    pub bm25_k1: f64,

    /// BM25 length normalization
    #[serde(default = "default_bm25_b")]
    pub bm25_b: f64,

    /// Weight of slide-text term occurrences relative to spoken text
    #[serde(default = "default_slide_text_weight")]
    pub slide_text_weight: f64,
}

fn default_frame_tolerance() -> f64 {
    15.0
}
fn default_shortlist_threshold() -> usize {
    512
}
fn default_rrf_k() -> f64 {
    60.0
}
fn default_bm25_k1() -> f64 {
    1.2
}
fn default_bm25_b() -> f64 {
    0.75
}
fn default_slide_text_weight() -> f64 {
    0.5
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            frame_tolerance_secs: default_frame_tolerance(),
            shortlist_threshold: default_shortlist_threshold(),
            rrf_k: default_rrf_k(),
            bm25_k1: default_bm25_k1(),
            bm25_b: default_bm25_b(),
            slide_text_weight: default_slide_text_weight(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextConfig {
    /// Default token budget for one generation context
    #[serde(default = "default_token_budget")]
    pub token_budget: usize,

    /// Half-width in seconds of the window around a time anchor
    #[serde(default = "default_anchor_window")]
    pub anchor_window_secs: f64,

    /// How many similarity hits to consider
    #[serde(default = "default_similarity_k")]
    pub similarity_k: usize,
}

fn default_token_budget() -> usize {
    2000
}
fn default_anchor_window() -> f64 {
    15.0
}
fn default_similarity_k() -> usize {
    12
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            token_budget: default_token_budget(),
            anchor_window_secs: default_anchor_window(),
            similarity_k: default_similarity_k(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Attempts per generation request, including the first
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Per-call timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Linear backoff step between transient failures
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,

    /// Upper bound on any single backoff, including rate-limit waits
    #[serde(default = "default_max_backoff_secs")]
    pub max_backoff_secs: u64,

    /// Simultaneous outstanding generation calls
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
}

fn default_max_attempts() -> u32 {
    3
}
fn default_timeout_secs() -> u64 {
    60
}
fn default_backoff_ms() -> u64 {
    500
}
fn default_max_backoff_secs() -> u64 {
    30
}
fn default_max_concurrent() -> usize {
    4
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            timeout_secs: default_timeout_secs(),
            backoff_ms: default_backoff_ms(),
            max_backoff_secs: default_max_backoff_secs(),
            max_concurrent: default_max_concurrent(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyConfig {
    /// Slack in seconds allowed at each edge of a cited range. A range
    /// accepted within the slack is snapped to its segment.
    #[serde(default = "default_tolerance_secs")]
    pub tolerance_secs: f64,
}

fn default_tolerance_secs() -> f64 {
    0.0
}

impl Default for VerifyConfig {
    fn default() -> Self {
        Self {
            tolerance_secs: default_tolerance_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactConfig {
    /// Length of a concept unit when the lecture has no slides
    #[serde(default = "default_unit_window")]
    pub unit_window_secs: f64,

    /// Upper bound on concept units for checklists and summaries
    #[serde(default = "default_max_units")]
    pub max_units: usize,
}

fn default_unit_window() -> f64 {
    120.0
}
fn default_max_units() -> usize {
    24
}

impl Default for ArtifactConfig {
    fn default() -> Self {
        Self {
            unit_window_secs: default_unit_window(),
            max_units: default_max_units(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from the default path (~/.lectern/config.toml).
    ///
    /// Environment variables override the file:
    /// - `LECTERN_MAX_ATTEMPTS`
    /// - `LECTERN_MAX_CONCURRENT`
    /// - `LECTERN_TIMEOUT_SECS`
    /// - `LECTERN_TOKEN_BUDGET`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env_overrides(|key| std::env::var(key).ok())?;
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

    /// Apply `LECTERN_*` overrides read through `lookup`, then re-validate.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("LECTERN_MAX_ATTEMPTS") {
            self.generation.max_attempts = parse_env("LECTERN_MAX_ATTEMPTS", &v)?;
        }
        if let Some(v) = lookup("LECTERN_MAX_CONCURRENT") {
            self.generation.max_concurrent = parse_env("LECTERN_MAX_CONCURRENT", &v)?;
        }
        if let Some(v) = lookup("LECTERN_TIMEOUT_SECS") {
            self.generation.timeout_secs = parse_env("LECTERN_TIMEOUT_SECS", &v)?;
        }
        if let Some(v) = lookup("LECTERN_TOKEN_BUDGET") {
            self.context.token_budget = parse_env("LECTERN_TOKEN_BUDGET", &v)?;
        }
        self.validate()
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".lectern")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.generation.max_attempts == 0 {
            return Err(ConfigError::ValidationError(
                "generation.max_attempts must be at least 1".into(),
            ));
        }

        if self.generation.max_concurrent == 0 {
            return Err(ConfigError::ValidationError(
                "generation.max_concurrent must be at least 1".into(),
            ));
        }

        if self.generation.timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "generation.timeout_secs must be > 0".into(),
            ));
        }

        if self.context.token_budget == 0 {
            return Err(ConfigError::ValidationError(
                "context.token_budget must be > 0".into(),
            ));
        }

        if !(self.context.anchor_window_secs > 0.0) {
            return Err(ConfigError::ValidationError(
                "context.anchor_window_secs must be > 0".into(),
            ));
        }

        if self.context.similarity_k == 0 {
            return Err(ConfigError::ValidationError(
                "context.similarity_k must be at least 1".into(),
            ));
        }

        if !(self.index.rrf_k > 0.0) {
            return Err(ConfigError::ValidationError("index.rrf_k must be > 0".into()));
        }

        if !(0.0..=1.0).contains(&self.index.bm25_b) || self.index.bm25_k1 < 0.0 {
            return Err(ConfigError::ValidationError(
                "index.bm25_b must be in [0, 1] and index.bm25_k1 must be >= 0".into(),
            ));
        }

        if self.index.frame_tolerance_secs < 0.0
            || self.index.slide_text_weight < 0.0
            || self.verify.tolerance_secs < 0.0
        {
            return Err(ConfigError::ValidationError(
                "tolerances and weights must be non-negative".into(),
            ));
        }

        if !(self.artifacts.unit_window_secs > 0.0) || self.artifacts.max_units == 0 {
            return Err(ConfigError::ValidationError(
                "artifacts.unit_window_secs and artifacts.max_units must be > 0".into(),
            ));
        }

        if self.event_capacity == 0 {
            return Err(ConfigError::ValidationError(
                "event_capacity must be at least 1".into(),
            ));
        }

        Ok(())
    }

    /// Generate a default config TOML string (for `config init`).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            index: IndexConfig::default(),
            context: ContextConfig::default(),
            generation: GenerationConfig::default(),
            verify: VerifyConfig::default(),
            artifacts: ArtifactConfig::default(),
            event_capacity: default_event_capacity(),
        }
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| {
        ConfigError::ValidationError(format!("{key}='{value}' is not a valid value"))
    })
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

impl From<ConfigError> for lectern_core::Error {
    fn from(e: ConfigError) -> Self {
        lectern_core::Error::Config {
            message: e.to_string(),
        }
    }
}
