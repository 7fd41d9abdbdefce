//! Configuration module for Storecast.
//!
//! This module provides structured configuration loading from environment variables,
//! organized by concern: Model, Prediction, and Observability.

mod model_config;
mod observability_config;
mod prediction_config;

pub use model_config::ModelEnvConfig;
pub use observability_config::ObservabilityEnvConfig;
pub use prediction_config::PredictionEnvConfig;

use crate::domain::lookup::LookupTables;
use anyhow::{Context, Result};

/// Main application configuration.
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub model: ModelEnvConfig,
    pub prediction: PredictionEnvConfig,
    pub observability: ObservabilityEnvConfig,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// A `.env` file in the working directory is read first when present.
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv();

        let model = ModelEnvConfig::from_env().context("Failed to load model config")?;
        let prediction = PredictionEnvConfig::from_env().context("Failed to load prediction config")?;
        let observability = ObservabilityEnvConfig::from_env();

        Ok(Self {
            model,
            prediction,
            observability,
        })
    }

    /// Built-in lookup tables, or the override file when one is configured.
    pub fn lookup_tables(&self) -> Result<LookupTables> {
        match &self.prediction.lookup_tables_path {
            Some(path) => LookupTables::load(path),
            None => Ok(LookupTables::default()),
        }
    }
}
