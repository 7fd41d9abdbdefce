// Normalization, statistics and confidence building blocks
pub mod analytics;

// Multi-predictor batch requests
pub mod batch;

// Tiered prediction engine and the forest model stack
pub mod ml;

// The five forecasting strategies
pub mod predictors;

// Service facade used by the binaries
pub mod service;
