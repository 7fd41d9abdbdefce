//! Model configuration parsing from environment variables.
//!
//! This module handles artifact storage and random-forest hyper-parameters.

use crate::application::ml::ForestParams;
use anyhow::{Context, Result};
use std::env;
use std::path::PathBuf;

/// Model environment configuration
#[derive(Debug, Clone)]
pub struct ModelEnvConfig {
    pub storage_path: PathBuf,
    pub n_trees: usize,
    pub max_depth: u16,
    pub min_samples_split: usize,
    /// Resolve persisted artifacts when the service starts.
    pub auto_load: bool,
}

impl Default for ModelEnvConfig {
    fn default() -> Self {
        let params = ForestParams::default();
        Self {
            storage_path: PathBuf::from("./models/"),
            n_trees: params.n_trees,
            max_depth: params.max_depth,
            min_samples_split: params.min_samples_split,
            auto_load: true,
        }
    }
}

impl ModelEnvConfig {
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        Ok(Self {
            storage_path: env::var("MODEL_STORAGE_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.storage_path),
            n_trees: Self::parse("MODEL_N_TREES", defaults.n_trees)?,
            max_depth: Self::parse("MODEL_MAX_DEPTH", defaults.max_depth)?,
            min_samples_split: Self::parse("MODEL_MIN_SAMPLES_SPLIT", defaults.min_samples_split)?,
            auto_load: env::var("MODEL_AUTO_LOAD")
                .unwrap_or_else(|_| "true".to_string())
                .parse::<bool>()
                .unwrap_or(true),
        })
    }

    pub fn forest_params(&self) -> ForestParams {
        ForestParams {
            n_trees: self.n_trees.max(1),
            max_depth: self.max_depth.max(1),
            min_samples_split: self.min_samples_split.max(2),
        }
    }

    fn parse<T>(key: &str, default: T) -> Result<T>
    where
        T: std::str::FromStr + ToString,
        T::Err: std::error::Error + Send + Sync + 'static,
    {
        env::var(key)
            .unwrap_or_else(|_| default.to_string())
            .parse::<T>()
            .context(format!("Failed to parse {}", key))
    }
}
