use crate::domain::errors::{FailureStage, PredictionError};
use serde::{Deserialize, Serialize};

/// Per-feature standardization: `(x - mean) / std`, population std, with
/// constant columns scaled by 1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    means: Vec<f64>,
    scales: Vec<f64>,
}

impl StandardScaler {
    /// `None` for an empty or ragged matrix.
    pub fn fit(rows: &[Vec<f64>]) -> Option<Self> {
        let width = rows.first()?.len();
        if width == 0 || rows.iter().any(|row| row.len() != width) {
            return None;
        }

        let n = rows.len() as f64;
        let mut means = vec![0.0; width];
        for row in rows {
            for (acc, value) in means.iter_mut().zip(row) {
                *acc += value / n;
            }
        }

        let mut scales = vec![0.0; width];
        for row in rows {
            for ((acc, value), avg) in scales.iter_mut().zip(row).zip(&means) {
                *acc += (value - avg).powi(2) / n;
            }
        }
        for scale in scales.iter_mut() {
            let std = scale.sqrt();
            *scale = if std > 1e-12 && std.is_finite() { std } else { 1.0 };
        }

        Some(Self { means, scales })
    }

    pub fn n_features(&self) -> usize {
        self.means.len()
    }

    pub fn transform(&self, row: &[f64]) -> Result<Vec<f64>, PredictionError> {
        if row.len() != self.n_features() {
            return Err(PredictionError::failure(
                FailureStage::Scaling,
                format!("expected {} features, got {}", self.n_features(), row.len()),
            ));
        }
        Ok(row
            .iter()
            .zip(self.means.iter().zip(&self.scales))
            .map(|(value, (avg, scale))| (value - avg) / scale)
            .collect())
    }
}
