//! Engine configuration.
//!
//! Loaded from TOML or built from defaults:
//!
//! ```toml
//! [retry]
//! max_attempts = 5
//! base_delay_ms = 10
//! max_delay_ms = 1000
//! jitter = true
//!
//! [synthesis]
//! max_passes = 64
//!
//! [query]
//! default_limit = 100
//! ```

use serde::Deserialize;
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid configuration value for {key}: {reason}")]
    InvalidValue { key: String, reason: String },
}

impl ConfigError {
    pub fn invalid_value(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            key: key.into(),
            reason: reason.into(),
        }
    }
}

/// Transaction retry settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts per operation, the first one included.
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub base_delay_ms: u64,
    /// Upper bound on any single delay.
    pub max_delay_ms: u64,
    /// Randomize each delay within `[0, computed]`.
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay_ms: 10,
            max_delay_ms: 1000,
            jitter: true,
        }
    }
}

/// Input-shape synthesis settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SynthesisConfig {
    /// Maximum fixed-point passes before giving up.
    pub max_passes: usize,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self { max_passes: 64 }
    }
}

/// Read-query settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    /// `$limit` emitted for list queries without pagination.
    pub default_limit: u64,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self { default_limit: 100 }
    }
}

/// Top-level engine configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub retry: RetryConfig,
    pub synthesis: SynthesisConfig,
    pub query: QueryConfig,
}

impl EngineConfig {
    /// Parse and validate a TOML document. Missing keys take their defaults.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the engine cannot operate with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::invalid_value(
                "retry.max_attempts",
                "must be at least 1",
            ));
        }
        if self.retry.base_delay_ms > self.retry.max_delay_ms {
            return Err(ConfigError::invalid_value(
                "retry.base_delay_ms",
                "must not exceed retry.max_delay_ms",
            ));
        }
        if self.synthesis.max_passes == 0 {
            return Err(ConfigError::invalid_value(
                "synthesis.max_passes",
                "must be at least 1",
            ));
        }
        if self.query.default_limit == 0 {
            return Err(ConfigError::invalid_value(
                "query.default_limit",
                "must be at least 1",
            ));
        }
        Ok(())
    }
}
