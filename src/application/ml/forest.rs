//! Random-forest regressor with its fitted scaler.

use crate::application::ml::scaler::StandardScaler;
use crate::domain::errors::{FailureStage, PredictionError, TrainingError};
use serde::{Deserialize, Serialize};
use smartcore::ensemble::random_forest_regressor::{
    RandomForestRegressor, RandomForestRegressorParameters,
};
use smartcore::linalg::basic::matrix::DenseMatrix;
use std::collections::BTreeMap;

pub type Regressor = RandomForestRegressor<f64, f64, DenseMatrix<f64>, Vec<f64>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForestParams {
    pub n_trees: usize,
    pub max_depth: u16,
    pub min_samples_split: usize,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_trees: 100,
            max_depth: 10,
            min_samples_split: 5,
        }
    }
}

impl ForestParams {
    pub fn with_max_depth(self, max_depth: u16) -> Self {
        Self { max_depth, ..self }
    }
}

/// In-sample fit quality.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitMetrics {
    pub mae: f64,
    pub rmse: f64,
    pub r2: f64,
}

impl FitMetrics {
    fn compute(predicted: &[f64], actual: &[f64]) -> Self {
        let n = actual.len().max(1) as f64;
        let mae = predicted.iter().zip(actual).map(|(p, t)| (p - t).abs()).sum::<f64>() / n;
        let sq_err = predicted.iter().zip(actual).map(|(p, t)| (p - t).powi(2)).sum::<f64>();
        let rmse = (sq_err / n).sqrt();
        let mean_y = actual.iter().sum::<f64>() / n;
        let var_y = actual.iter().map(|t| (t - mean_y).powi(2)).sum::<f64>();
        let r2 = if var_y > 0.0 { 1.0 - sq_err / var_y } else { 0.0 };
        Self { mae, rmse, r2 }
    }

    pub fn insert_into(&self, prefix: &str, metrics: &mut BTreeMap<String, f64>) {
        metrics.insert(format!("{}mae", prefix), self.mae);
        metrics.insert(format!("{}rmse", prefix), self.rmse);
        metrics.insert(format!("{}r2", prefix), self.r2);
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ForestModel {
    scaler: StandardScaler,
    regressor: Regressor,
}

impl ForestModel {
    pub fn fit(
        predictor: &str,
        x: &[Vec<f64>],
        y: &[f64],
        params: &ForestParams,
    ) -> Result<(Self, FitMetrics), TrainingError> {
        let failed = |reason: String| TrainingError::Failed {
            predictor: predictor.to_string(),
            reason,
        };

        if x.len() != y.len() {
            return Err(failed(format!("{} feature rows for {} targets", x.len(), y.len())));
        }
        let scaler = StandardScaler::fit(x).ok_or_else(|| failed("empty or ragged feature matrix".to_string()))?;

        let scaled: Vec<Vec<f64>> = x
            .iter()
            .map(|row| scaler.transform(row))
            .collect::<Result<_, _>>()
            .map_err(|e| failed(e.to_string()))?;
        let x_matrix =
            DenseMatrix::from_2d_vec(&scaled).map_err(|e| failed(format!("Matrix error: {}", e)))?;
        let targets = y.to_vec();

        let forest_params = RandomForestRegressorParameters::default()
            .with_n_trees(params.n_trees)
            .with_max_depth(params.max_depth)
            .with_min_samples_split(params.min_samples_split);
        let regressor = RandomForestRegressor::fit(&x_matrix, &targets, forest_params)
            .map_err(|e| failed(format!("Fit error: {}", e)))?;

        let fitted = regressor
            .predict(&x_matrix)
            .map_err(|e| failed(format!("Prediction error: {}", e)))?;
        let metrics = FitMetrics::compute(&fitted, y);

        Ok((Self { scaler, regressor }, metrics))
    }

    pub fn n_features(&self) -> usize {
        self.scaler.n_features()
    }

    /// Scales `features` and returns the forest's point estimate.
    pub fn predict(&self, features: &[f64]) -> Result<f64, PredictionError> {
        let scaled = self.scaler.transform(features)?;
        let input = DenseMatrix::from_2d_vec(&vec![scaled]).map_err(|e| {
            PredictionError::failure(FailureStage::Inference, format!("Matrix creation failed: {}", e))
        })?;

        let predictions = self
            .regressor
            .predict(&input)
            .map_err(|e| PredictionError::failure(FailureStage::Inference, e.to_string()))?;

        match predictions.first() {
            Some(value) if value.is_finite() => Ok(*value),
            Some(value) => Err(PredictionError::failure(
                FailureStage::Inference,
                format!("non-finite prediction {}", value),
            )),
            None => Err(PredictionError::failure(
                FailureStage::Inference,
                "No prediction returned",
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn linear_data(n: usize) -> (Vec<Vec<f64>>, Vec<f64>) {
        let x: Vec<Vec<f64>> = (0..n).map(|i| vec![i as f64, (i % 5) as f64]).collect();
        let y: Vec<f64> = (0..n).map(|i| 2.0 * i as f64 + 1.0).collect();
        (x, y)
    }

    fn small_params() -> ForestParams {
        ForestParams {
            n_trees: 10,
            max_depth: 6,
            min_samples_split: 2,
        }
    }

    #[test]
    fn test_fit_and_predict_in_range() {
        let (x, y) = linear_data(40);
        let (model, metrics) = ForestModel::fit("test", &x, &y, &small_params()).unwrap();

        assert_eq!(model.n_features(), 2);
        assert!(metrics.mae.is_finite());
        let prediction = model.predict(&[20.0, 0.0]).unwrap();
        assert!(prediction > 1.0 && prediction < 80.0);
    }

    #[test]
    fn test_mismatched_targets_fail() {
        let (x, _) = linear_data(10);
        let result = ForestModel::fit("test", &x, &[1.0, 2.0], &small_params());
        assert!(matches!(result, Err(TrainingError::Failed { .. })));
    }

    #[test]
    fn test_wrong_feature_count_is_reported() {
        let (x, y) = linear_data(20);
        let (model, _) = ForestModel::fit("test", &x, &y, &small_params()).unwrap();
        assert!(model.predict(&[1.0]).is_err());
    }

    #[test]
    fn test_model_survives_json_roundtrip() {
        let (x, y) = linear_data(20);
        let (model, _) = ForestModel::fit("test", &x, &y, &small_params()).unwrap();
        let json = serde_json::to_string(&model).unwrap();
        let restored: ForestModel = serde_json::from_str(&json).unwrap();
        assert_eq!(
            model.predict(&[5.0, 0.0]).unwrap(),
            restored.predict(&[5.0, 0.0]).unwrap()
        );
    }
}
