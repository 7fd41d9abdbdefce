// Confidence formula shared by all predictors
pub mod confidence;

// Domain-specific error types
pub mod errors;

// Platform, category, archetype and segment tables
pub mod lookup;

// Feature contracts and persisted artifacts
pub mod ml;

// Improvement opportunities
pub mod opportunity;

// Port interfaces
pub mod ports;

// Prediction results
pub mod prediction;

// Input records
pub mod records;

// Input validation
pub mod validation;
