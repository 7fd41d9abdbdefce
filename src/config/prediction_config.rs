//! Prediction configuration parsing from environment variables.
//!
//! This module handles the confidence threshold, per-predictor switches and
//! the optional lookup-table override file.

use anyhow::{Context, Result};
use std::env;
use std::path::PathBuf;

/// Prediction environment configuration
#[derive(Debug, Clone)]
pub struct PredictionEnvConfig {
    /// Batch results below this confidence are flagged.
    pub min_confidence_threshold: f64,
    pub enable_creative_fatigue: bool,
    pub enable_budget_optimization: bool,
    pub enable_customer_prediction: bool,
    pub enable_product_velocity: bool,
    pub enable_cross_merchant: bool,
    pub lookup_tables_path: Option<PathBuf>,
}

impl Default for PredictionEnvConfig {
    fn default() -> Self {
        Self {
            min_confidence_threshold: 0.3,
            enable_creative_fatigue: true,
            enable_budget_optimization: true,
            enable_customer_prediction: true,
            enable_product_velocity: true,
            enable_cross_merchant: true,
            lookup_tables_path: None,
        }
    }
}

impl PredictionEnvConfig {
    pub fn from_env() -> Result<Self> {
        let min_confidence_threshold = env::var("MIN_CONFIDENCE_THRESHOLD")
            .unwrap_or_else(|_| "0.3".to_string())
            .parse::<f64>()
            .context("Failed to parse MIN_CONFIDENCE_THRESHOLD")?;
        if !(0.0..=1.0).contains(&min_confidence_threshold) {
            anyhow::bail!(
                "MIN_CONFIDENCE_THRESHOLD must be between 0 and 1, got {}",
                min_confidence_threshold
            );
        }

        Ok(Self {
            min_confidence_threshold,
            enable_creative_fatigue: Self::parse_bool("ENABLE_CREATIVE_FATIGUE"),
            enable_budget_optimization: Self::parse_bool("ENABLE_BUDGET_OPTIMIZATION"),
            enable_customer_prediction: Self::parse_bool("ENABLE_CUSTOMER_PREDICTION"),
            enable_product_velocity: Self::parse_bool("ENABLE_PRODUCT_VELOCITY"),
            enable_cross_merchant: Self::parse_bool("ENABLE_CROSS_MERCHANT"),
            lookup_tables_path: env::var("LOOKUP_TABLES_PATH")
                .ok()
                .filter(|path| !path.trim().is_empty())
                .map(PathBuf::from),
        })
    }

    /// Switches default to on; only an explicit `false` disables a predictor.
    fn parse_bool(key: &str) -> bool {
        env::var(key)
            .unwrap_or_else(|_| "true".to_string())
            .to_lowercase()
            .parse::<bool>()
            .unwrap_or(true)
    }
}
