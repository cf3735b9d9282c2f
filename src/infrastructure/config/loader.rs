//! Hierarchical configuration loading for the selection engine.

use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use thiserror::Error;

use crate::domain::models::EngineConfig;

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid target_count: {0}. Must be at least 1")]
    InvalidTargetCount(usize),

    #[error("Invalid candidate_cap: {0}. Must be >= target_count ({1})")]
    InvalidCandidateCap(usize, usize),

    #[error("Backend chain is empty: at least one backend descriptor is required")]
    EmptyBackendChain,

    #[error("Backend '{0}' has max_tokens of 0")]
    InvalidBackendTokens(String),

    #[error("Invalid count_tolerance: {0}. Must be within [0, 1]")]
    InvalidTolerance(f64),

    #[error("Invalid min_selection_ratio: {0}. Must be within (0, 1]")]
    InvalidSelectionRatio(f64),

    #[error(
        "Invalid backoff configuration: initial_backoff_ms ({0}) must be <= max_backoff_ms ({1})"
    )]
    InvalidBackoff(u64, u64),

    #[error("Invalid worker_count: {0}. Must be at least 1")]
    InvalidWorkerCount(usize),

    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Invalid log format: {0}. Must be one of: json, pretty")]
    InvalidLogFormat(String),
}

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging.
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. warden.yaml (project config)
    /// 3. warden.local.yaml (local overrides, optional)
    /// 4. Environment variables (`WARDEN_*` prefix, highest priority)
    pub fn load() -> Result<EngineConfig> {
        let config: EngineConfig = Figment::new()
            .merge(Serialized::defaults(EngineConfig::default()))
            .merge(Yaml::file("warden.yaml"))
            .merge(Yaml::file("warden.local.yaml"))
            .merge(Env::prefixed("WARDEN_").split("__"))
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: impl AsRef<std::path::Path>) -> Result<EngineConfig> {
        let config: EngineConfig = Figment::new()
            .merge(Serialized::defaults(EngineConfig::default()))
            .merge(Yaml::file(path.as_ref()))
            .extract()
            .context(format!(
                "Failed to load config from {}",
                path.as_ref().display()
            ))?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Validate configuration after loading.
    ///
    /// A failure here is fatal: no partial pipeline run is attempted with a
    /// configuration that cannot be satisfied.
    pub fn validate(config: &EngineConfig) -> Result<(), ConfigError> {
        if config.target_count == 0 {
            return Err(ConfigError::InvalidTargetCount(config.target_count));
        }

        if config.candidate_cap < config.target_count {
            return Err(ConfigError::InvalidCandidateCap(
                config.candidate_cap,
                config.target_count,
            ));
        }

        if config.backends.is_empty() {
            return Err(ConfigError::EmptyBackendChain);
        }

        for backend in &config.backends {
            if backend.max_tokens == 0 {
                return Err(ConfigError::InvalidBackendTokens(backend.id.clone()));
            }
        }

        if !(0.0..=1.0).contains(&config.count_tolerance) {
            return Err(ConfigError::InvalidTolerance(config.count_tolerance));
        }

        if config.min_selection_ratio <= 0.0 || config.min_selection_ratio > 1.0 {
            return Err(ConfigError::InvalidSelectionRatio(
                config.min_selection_ratio,
            ));
        }

        if config.initial_backoff_ms > config.max_backoff_ms {
            return Err(ConfigError::InvalidBackoff(
                config.initial_backoff_ms,
                config.max_backoff_ms,
            ));
        }

        if config.worker_count == 0 {
            return Err(ConfigError::InvalidWorkerCount(config.worker_count));
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }

        let valid_log_formats = ["json", "pretty"];
        if !valid_log_formats.contains(&config.logging.format.as_str()) {
            return Err(ConfigError::InvalidLogFormat(config.logging.format.clone()));
        }

        Ok(())
    }
}
