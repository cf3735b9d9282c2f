//! Engine configuration, threaded explicitly through the orchestrator and
//! handed to each stage at construction.

use serde::{Deserialize, Serialize};

/// One reasoning backend in the fallback chain. The configured list order is
/// the fallback order; the first descriptor is the primary.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct BackendDescriptor {
    /// Identifier used in logs and the result manifest.
    pub id: String,

    /// Model name passed to the backend.
    pub model: String,

    /// Hard output-size ceiling for this backend; requests are clamped to it.
    #[serde(default = "default_backend_max_tokens")]
    pub max_tokens: u32,

    /// Sampling temperature.
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

const fn default_backend_max_tokens() -> u32 {
    4000
}

fn default_temperature() -> f32 {
    0.1
}

impl BackendDescriptor {
    pub fn new(id: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            model: model.into(),
            max_tokens: default_backend_max_tokens(),
            temperature: default_temperature(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format (json, pretty)
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

/// Main configuration for a selection run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct EngineConfig {
    /// Number of policies the final selection aims for.
    #[serde(default = "default_target_count")]
    pub target_count: usize,

    /// Accepted deviation from the target, as a fraction of it.
    #[serde(default = "default_count_tolerance")]
    pub count_tolerance: f64,

    /// Phase-1 candidate cap.
    #[serde(default = "default_candidate_cap")]
    pub candidate_cap: usize,

    /// Below this fraction of the target, a Phase-2 selection is treated as
    /// a soft failure and padded from the scored candidate order.
    #[serde(default = "default_min_selection_ratio")]
    pub min_selection_ratio: f64,

    /// Ordered backend fallback chain; the first entry is the primary.
    #[serde(default)]
    pub backends: Vec<BackendDescriptor>,

    /// Retry attempts per backend before advancing to the next.
    #[serde(default = "default_max_retry_attempts")]
    pub max_retry_attempts: u32,

    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,

    /// Timeout applied to each backend call.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Output-size limit for the Phase-1 confirmation call.
    #[serde(default = "default_phase_one_max_tokens")]
    pub phase_one_max_tokens: u32,

    /// Output-size limit for Phase-2 selection and repair calls.
    #[serde(default = "default_phase_two_max_tokens")]
    pub phase_two_max_tokens: u32,

    /// Whether Phase 1 may spend one backend call confirming borderline
    /// candidates when the raw count exceeds the cap.
    #[serde(default = "default_true")]
    pub phase_one_confirm: bool,

    /// Backend repair rounds per entry that fails validation.
    #[serde(default = "default_max_repair_rounds")]
    pub max_repair_rounds: u32,

    #[serde(default = "default_true")]
    pub ai_repair_enabled: bool,

    /// Whether rule-based emergency selection may replace Phase 2 when the
    /// backend chain exhausts.
    #[serde(default = "default_true")]
    pub emergency_enabled: bool,

    /// Width of the worker pool for per-entry customization/validation.
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,

    #[serde(default)]
    pub logging: LoggingConfig,
}

const fn default_target_count() -> usize {
    20
}

fn default_count_tolerance() -> f64 {
    0.2
}

const fn default_candidate_cap() -> usize {
    150
}

fn default_min_selection_ratio() -> f64 {
    0.5
}

const fn default_max_retry_attempts() -> u32 {
    3
}

const fn default_initial_backoff_ms() -> u64 {
    10_000
}

const fn default_max_backoff_ms() -> u64 {
    300_000
}

const fn default_request_timeout_secs() -> u64 {
    60
}

const fn default_phase_one_max_tokens() -> u32 {
    2000
}

const fn default_phase_two_max_tokens() -> u32 {
    4000
}

const fn default_max_repair_rounds() -> u32 {
    2
}

const fn default_worker_count() -> usize {
    4
}

const fn default_true() -> bool {
    true
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            target_count: default_target_count(),
            count_tolerance: default_count_tolerance(),
            candidate_cap: default_candidate_cap(),
            min_selection_ratio: default_min_selection_ratio(),
            backends: Vec::new(),
            max_retry_attempts: default_max_retry_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            request_timeout_secs: default_request_timeout_secs(),
            phase_one_max_tokens: default_phase_one_max_tokens(),
            phase_two_max_tokens: default_phase_two_max_tokens(),
            phase_one_confirm: default_true(),
            max_repair_rounds: default_max_repair_rounds(),
            ai_repair_enabled: default_true(),
            emergency_enabled: default_true(),
            worker_count: default_worker_count(),
            logging: LoggingConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Minimum selection size considered sufficient before padding kicks in.
    pub fn min_acceptable_count(&self) -> usize {
        ((self.target_count as f64) * self.min_selection_ratio).ceil() as usize
    }
}
