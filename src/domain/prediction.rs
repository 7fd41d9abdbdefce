//! Prediction result types shared by every predictor.

use crate::domain::errors::PredictionError;
use serde::{Deserialize, Serialize};

pub const MIN_CONFIDENCE: f64 = 0.1;
pub const MAX_CONFIDENCE: f64 = 0.95;
pub const FALLBACK_CONFIDENCE: f64 = 0.3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RiskLevel::Low => write!(f, "LOW"),
            RiskLevel::Medium => write!(f, "MEDIUM"),
            RiskLevel::High => write!(f, "HIGH"),
        }
    }
}

/// Which tier of the cascade produced a prediction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PredictionTier {
    Trained,
    RuleBased,
    Fallback,
}

impl PredictionTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            PredictionTier::Trained => "trained",
            PredictionTier::RuleBased => "rule_based",
            PredictionTier::Fallback => "fallback",
        }
    }
}

/// Raw output of one tier before the engine stamps provenance on it.
#[derive(Debug, Clone, PartialEq)]
pub struct Forecast<T> {
    pub value: T,
    pub confidence: f64,
    pub explanation: String,
    pub actions: Vec<String>,
}

impl<T> Forecast<T> {
    pub fn new(value: T, confidence: f64, explanation: impl Into<String>, actions: Vec<String>) -> Self {
        Self {
            value,
            confidence,
            explanation: explanation.into(),
            actions,
        }
    }
}

/// A finished prediction. The predictor-specific payload is flattened into the
/// serialized object next to the shared fields.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prediction<T> {
    #[serde(flatten)]
    pub value: T,
    pub confidence: f64,
    pub explanation: String,
    pub actions: Vec<String>,
    pub tier: PredictionTier,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub degradation: Vec<PredictionError>,
}

impl<T> Prediction<T> {
    /// Stamps a forecast with its tier. Confidence is clamped into
    /// [`MIN_CONFIDENCE`, `MAX_CONFIDENCE`] and non-finite values collapse to the floor.
    pub fn from_forecast(
        forecast: Forecast<T>,
        tier: PredictionTier,
        degradation: Vec<PredictionError>,
    ) -> Self {
        Self {
            value: forecast.value,
            confidence: clamp_confidence(forecast.confidence),
            explanation: forecast.explanation,
            actions: forecast.actions,
            tier,
            degradation,
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.tier != PredictionTier::Trained
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Prediction<U> {
        Prediction {
            value: f(self.value),
            confidence: self.confidence,
            explanation: self.explanation,
            actions: self.actions,
            tier: self.tier,
            degradation: self.degradation,
        }
    }
}

pub fn clamp_confidence(value: f64) -> f64 {
    if value.is_finite() {
        value.clamp(MIN_CONFIDENCE, MAX_CONFIDENCE)
    } else {
        MIN_CONFIDENCE
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Serialize;

    #[derive(Debug, Clone, PartialEq, Serialize)]
    struct Days {
        days: u32,
    }

    #[test]
    fn test_confidence_is_clamped() {
        let high = Prediction::from_forecast(
            Forecast::new(Days { days: 3 }, 1.7, "x", vec!["a".into()]),
            PredictionTier::Trained,
            vec![],
        );
        assert_eq!(high.confidence, MAX_CONFIDENCE);

        let low = Prediction::from_forecast(
            Forecast::new(Days { days: 3 }, 0.0, "x", vec!["a".into()]),
            PredictionTier::Trained,
            vec![],
        );
        assert_eq!(low.confidence, MIN_CONFIDENCE);

        assert_eq!(clamp_confidence(f64::NAN), MIN_CONFIDENCE);
    }

    #[test]
    fn test_payload_is_flattened() {
        let prediction = Prediction::from_forecast(
            Forecast::new(Days { days: 4 }, 0.65, "rule", vec!["Monitor".into()]),
            PredictionTier::RuleBased,
            vec![PredictionError::ModelUnavailable {
                predictor: "creative_fatigue".into(),
            }],
        );
        let json = serde_json::to_value(&prediction).unwrap();
        assert_eq!(json["days"], 4);
        assert_eq!(json["tier"], "rule_based");
        assert_eq!(json["degradation"][0]["kind"], "model_unavailable");
    }

    #[test]
    fn test_risk_level_serializes_uppercase() {
        assert_eq!(serde_json::to_string(&RiskLevel::High).unwrap(), "\"HIGH\"");
        assert_eq!(RiskLevel::Medium.to_string(), "MEDIUM");
    }
}
