//! Engine Configuration
//!
//! Tunables for the pipelines and the guidance self-heal schedule. Values
//! come from built-in defaults overridden by either an optional TOML file
//! ([`load_config`]) or `CAROUSEL_*` environment variables
//! ([`EngineConfig::from_env`]).

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

/// Engine tunables.
#[derive(Clone, Debug, PartialEq)]
pub struct EngineConfig {
    /// Concurrent slide exports per preview batch.
    pub preview_batch_size: usize,
    /// Yield between preview batches, in milliseconds, keeping the UI
    /// responsive while payloads stream.
    pub preview_batch_yield_ms: u64,
    /// Bound on the current-slide query; index 0 is assumed on expiry.
    pub current_slide_timeout_ms: u64,
    /// Bound on partial-slide and height decision waits. 0 waits
    /// indefinitely for the human response.
    pub decision_timeout_ms: u64,
    /// Delays for the guidance visibility self-heal passes. The host has
    /// been observed to asynchronously reset inherited visibility after a
    /// rebuild; each entry schedules one re-assertion. Empty disables the
    /// heal (tests).
    pub visibility_heal_delays_ms: Vec<u64>,
    /// Settle delay before guidance is restored after export regions are
    /// created, in milliseconds.
    pub export_settle_ms: u64,
    /// Upper bound on the adaptive preview render scale.
    pub max_preview_scale: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            preview_batch_size: 2,
            preview_batch_yield_ms: 30,
            current_slide_timeout_ms: 100,
            decision_timeout_ms: 0,
            visibility_heal_delays_ms: vec![150, 600],
            export_settle_ms: 300,
            max_preview_scale: 0.25,
        }
    }
}

impl EngineConfig {
    /// Defaults layered with `CAROUSEL_*` environment variables.
    ///
    /// - `CAROUSEL_BATCH_SIZE`
    /// - `CAROUSEL_BATCH_YIELD_MS`
    /// - `CAROUSEL_CURRENT_SLIDE_TIMEOUT_MS`
    /// - `CAROUSEL_DECISION_TIMEOUT_MS`
    /// - `CAROUSEL_EXPORT_SETTLE_MS`
    /// - `CAROUSEL_HEAL_DELAYS_MS` (comma-separated, empty disables)
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(v) = env_parse("CAROUSEL_BATCH_SIZE") {
            config.preview_batch_size = v;
        }
        if let Some(v) = env_parse("CAROUSEL_BATCH_YIELD_MS") {
            config.preview_batch_yield_ms = v;
        }
        if let Some(v) = env_parse("CAROUSEL_CURRENT_SLIDE_TIMEOUT_MS") {
            config.current_slide_timeout_ms = v;
        }
        if let Some(v) = env_parse("CAROUSEL_DECISION_TIMEOUT_MS") {
            config.decision_timeout_ms = v;
        }
        if let Some(v) = env_parse("CAROUSEL_EXPORT_SETTLE_MS") {
            config.export_settle_ms = v;
        }
        if let Ok(raw) = std::env::var("CAROUSEL_HEAL_DELAYS_MS") {
            config.visibility_heal_delays_ms = raw
                .split(',')
                .filter_map(|s| s.trim().parse().ok())
                .collect();
        }

        config
    }

    /// Configuration for deterministic headless runs and tests: no settle
    /// delays, no self-heal passes, no inter-batch yield.
    #[must_use]
    pub fn headless() -> Self {
        Self {
            preview_batch_yield_ms: 0,
            visibility_heal_delays_ms: Vec::new(),
            export_settle_ms: 0,
            ..Self::default()
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

/// Partial configuration as parsed from a TOML file; unset keys fall back
/// to the defaults.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct EngineToml {
    preview_batch_size: Option<usize>,
    preview_batch_yield_ms: Option<u64>,
    current_slide_timeout_ms: Option<u64>,
    decision_timeout_ms: Option<u64>,
    visibility_heal_delays_ms: Option<Vec<u64>>,
    export_settle_ms: Option<u64>,
    max_preview_scale: Option<f64>,
}

impl EngineToml {
    fn apply(self, mut base: EngineConfig) -> EngineConfig {
        if let Some(v) = self.preview_batch_size {
            base.preview_batch_size = v;
        }
        if let Some(v) = self.preview_batch_yield_ms {
            base.preview_batch_yield_ms = v;
        }
        if let Some(v) = self.current_slide_timeout_ms {
            base.current_slide_timeout_ms = v;
        }
        if let Some(v) = self.decision_timeout_ms {
            base.decision_timeout_ms = v;
        }
        if let Some(v) = self.visibility_heal_delays_ms {
            base.visibility_heal_delays_ms = v;
        }
        if let Some(v) = self.export_settle_ms {
            base.export_settle_ms = v;
        }
        if let Some(v) = self.max_preview_scale {
            base.max_preview_scale = v;
        }
        base
    }
}

/// Configuration loading failures.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    /// The file is not valid TOML for this schema.
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Default config file location: `<config dir>/carousel/engine.toml`.
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("carousel").join("engine.toml"))
}

/// Load configuration from a specific TOML file.
pub fn load_config_from_path(path: &Path) -> Result<EngineConfig, ConfigError> {
    let raw = std::fs::read_to_string(path)?;
    let partial: EngineToml = toml::from_str(&raw)?;
    Ok(partial.apply(EngineConfig::default()))
}

/// Load configuration from the default location, falling back to defaults
/// when no file exists.
pub fn load_config() -> Result<EngineConfig, ConfigError> {
    match default_config_path() {
        Some(path) if path.exists() => load_config_from_path(&path),
        _ => Ok(EngineConfig::default()),
    }
}
