use serde::Serialize;
use thiserror::Error;

/// Stage of the prediction pipeline where a failure surfaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureStage {
    FeatureExtraction,
    Scaling,
    Inference,
    RuleEvaluation,
    /// A panic caught at the top of `predict`
    Internal,
}

impl std::fmt::Display for FailureStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            FailureStage::FeatureExtraction => "feature extraction",
            FailureStage::Scaling => "scaling",
            FailureStage::Inference => "inference",
            FailureStage::RuleEvaluation => "rule evaluation",
            FailureStage::Internal => "internal",
        };
        f.write_str(label)
    }
}

/// Degradation signals raised while producing a prediction.
///
/// None of these ever reach the caller as an `Err`: `InsufficientData` and
/// `ModelUnavailable` switch the pipeline to a cheaper branch, while
/// `PredictionFailure` selects the hardcoded fallback result. They are carried
/// on the returned prediction so callers and tests can tell the tiers apart.
#[derive(Debug, Clone, PartialEq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PredictionError {
    #[error("Insufficient data: {available} points < {required} required")]
    InsufficientData { available: usize, required: usize },

    #[error("Model unavailable for {predictor}")]
    ModelUnavailable { predictor: String },

    #[error("Prediction failed during {stage}: {reason}")]
    PredictionFailure { stage: FailureStage, reason: String },
}

impl PredictionError {
    pub fn failure(stage: FailureStage, reason: impl Into<String>) -> Self {
        PredictionError::PredictionFailure {
            stage,
            reason: reason.into(),
        }
    }
}

/// Errors returned by explicit training calls.
#[derive(Debug, Error)]
pub enum TrainingError {
    #[error("insufficient_data: {samples} usable samples < {required} required")]
    InsufficientData { samples: usize, required: usize },

    #[error("Training failed for {predictor}: {reason}")]
    Failed { predictor: String, reason: String },

    #[error("Failed to persist {predictor} artifact: {source}")]
    Persistence {
        predictor: String,
        #[source]
        source: ArtifactError,
    },
}

/// Errors raised by artifact stores.
#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("I/O error on artifact {key}: {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Corrupt artifact {key}: {reason}")]
    Corrupt { key: String, reason: String },
}
