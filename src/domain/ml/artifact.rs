use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Persisted envelope around a trained model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Artifact<M> {
    pub predictor: String,
    pub schema: String,
    pub trained_at: DateTime<Utc>,
    pub samples: usize,
    pub model: M,
}

/// Fixed-length feature vector plus how much history backed it.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector {
    pub values: Vec<f64>,
    /// History points the extractor saw.
    pub history_points: usize,
    /// `Some(required)` when extraction fell back to default features.
    pub defaulted_below: Option<usize>,
}

impl FeatureVector {
    pub fn from_history(values: Vec<f64>, history_points: usize) -> Self {
        Self {
            values,
            history_points,
            defaulted_below: None,
        }
    }

    pub fn defaults(values: Vec<f64>, history_points: usize, required: usize) -> Self {
        Self {
            values,
            history_points,
            defaulted_below: Some(required),
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn is_defaulted(&self) -> bool {
        self.defaulted_below.is_some()
    }

    pub fn get(&self, index: usize) -> f64 {
        self.values.get(index).copied().unwrap_or(0.0)
    }
}

/// Result of a successful training call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingReport {
    pub predictor: String,
    pub training_samples: usize,
    pub skipped_samples: usize,
    pub metrics: BTreeMap<String, f64>,
    pub model_saved: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feature_vector_get_out_of_range_is_zero() {
        let features = FeatureVector::from_history(vec![1.0, 2.0], 5);
        assert_eq!(features.get(1), 2.0);
        assert_eq!(features.get(9), 0.0);
        assert!(!features.is_defaulted());
    }

    #[test]
    fn test_default_features_record_requirement() {
        let features = FeatureVector::defaults(vec![0.0; 3], 1, 7);
        assert!(features.is_defaulted());
        assert_eq!(features.defaulted_below, Some(7));
    }
}
