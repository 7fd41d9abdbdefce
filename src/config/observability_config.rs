//! Observability configuration parsing from environment variables.
//!
//! This module handles log verbosity and the metrics switch.

use std::env;

/// Observability environment configuration
#[derive(Debug, Clone)]
pub struct ObservabilityEnvConfig {
    pub log_level: String,
    pub metrics_enabled: bool,
}

impl Default for ObservabilityEnvConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: true,
        }
    }
}

impl ObservabilityEnvConfig {
    pub fn from_env() -> Self {
        Self {
            log_level: env::var("LOG_LEVEL")
                .map(|level| level.trim().to_lowercase())
                .ok()
                .filter(|level| !level.is_empty())
                .unwrap_or_else(|| "info".to_string()),
            metrics_enabled: env::var("METRICS_ENABLED")
                .unwrap_or_else(|_| "true".to_string())
                .parse::<bool>()
                .unwrap_or(true),
        }
    }
}
