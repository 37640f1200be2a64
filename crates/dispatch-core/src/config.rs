//! On-disk dispatcher configuration.
//!
//! Every constructor knob the dispatcher exposes, plus the default policy
//! weights, collected into one serializable struct so they don't end up as
//! bare literals scattered through call sites. Nothing requires a file —
//! `DispatcherConfig::default()` is a complete, usable configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatcherConfig {
    #[serde(default = "default_telemetry_window")]
    pub telemetry_window: usize,
    #[serde(default = "default_circuit_failure_threshold")]
    pub circuit_failure_threshold: u32,
    #[serde(default = "default_circuit_cool_off_ms")]
    pub circuit_cool_off_ms: u64,
    #[serde(default = "default_per_call_timeout_ms")]
    pub per_call_timeout_ms: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default)]
    pub session_budget_usd: Option<f64>,

    #[serde(default = "default_prompt_length_threshold")]
    pub prompt_length_threshold: usize,
    #[serde(default = "default_json_bias_weight")]
    pub json_bias_weight: f64,
    #[serde(default = "default_latency_weight")]
    pub latency_weight: f64,
    #[serde(default = "default_failure_penalty")]
    pub failure_penalty: f64,
    #[serde(default = "default_exploration_epsilon")]
    pub exploration_epsilon: f64,
    #[serde(default = "default_cost_weight")]
    pub cost_weight: f64,
}

fn default_telemetry_window() -> usize {
    200
}
fn default_circuit_failure_threshold() -> u32 {
    3
}
fn default_circuit_cool_off_ms() -> u64 {
    60_000
}
fn default_per_call_timeout_ms() -> u64 {
    300_000
}
fn default_max_retries() -> u32 {
    2
}
fn default_prompt_length_threshold() -> usize {
    600
}
fn default_json_bias_weight() -> f64 {
    1.0
}
fn default_latency_weight() -> f64 {
    0.001
}
fn default_failure_penalty() -> f64 {
    2.0
}
fn default_exploration_epsilon() -> f64 {
    0.01
}
fn default_cost_weight() -> f64 {
    1.0
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            telemetry_window: default_telemetry_window(),
            circuit_failure_threshold: default_circuit_failure_threshold(),
            circuit_cool_off_ms: default_circuit_cool_off_ms(),
            per_call_timeout_ms: default_per_call_timeout_ms(),
            max_retries: default_max_retries(),
            session_budget_usd: None,
            prompt_length_threshold: default_prompt_length_threshold(),
            json_bias_weight: default_json_bias_weight(),
            latency_weight: default_latency_weight(),
            failure_penalty: default_failure_penalty(),
            exploration_epsilon: default_exploration_epsilon(),
            cost_weight: default_cost_weight(),
        }
    }
}

impl DispatcherConfig {
    /// Load from a TOML file, falling back to defaults for any field the
    /// file omits.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::Io(e.to_string()))?;
        Self::from_toml_str(&text)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("io: {0}")]
    Io(String),
    #[error("parse: {0}")]
    Parse(String),
}
