//! Standalone confidence building blocks.
//!
//! Each scorer is a pure function; [`ConfidenceCalculator::overall`] combines
//! the three components into one value clamped to [0.1, 0.95].

use crate::application::analytics::data_processor::DataProcessor;
use crate::application::analytics::statistics::coefficient_of_variation;
use crate::domain::confidence::{ConfidenceProfile, SampleTier};
use crate::domain::prediction::{MAX_CONFIDENCE, clamp_confidence};
use crate::domain::records::{Metric, RawRecord};
use crate::domain::validation::non_negative_field;
use chrono::NaiveDate;

const REQUIRED_FIELDS: [&str; 4] = ["revenue", "orders", "spend", "conversion_rate"];

/// Component weights for data quality, historical and model confidence.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConfidenceWeights {
    pub data_quality: f64,
    pub historical: f64,
    pub model: f64,
}

impl Default for ConfidenceWeights {
    fn default() -> Self {
        Self {
            data_quality: 0.3,
            historical: 0.4,
            model: 0.3,
        }
    }
}

pub struct ConfidenceCalculator {
    history_profile: ConfidenceProfile,
}

impl Default for ConfidenceCalculator {
    fn default() -> Self {
        Self {
            history_profile: ConfidenceProfile::new(
                vec![
                    SampleTier::new(60, 0.95),
                    SampleTier::new(30, 0.85),
                    SampleTier::new(14, 0.7),
                    SampleTier::new(7, 0.55),
                ],
                0.3,
            ),
        }
    }
}

impl ConfidenceCalculator {
    /// Average of field completeness and cross-field consistency.
    pub fn data_quality(&self, data: &RawRecord) -> f64 {
        let present = REQUIRED_FIELDS
            .iter()
            .filter(|field| non_negative_field(data, field).is_some())
            .count();
        let completeness = present as f64 / REQUIRED_FIELDS.len() as f64;

        let mut consistency = 1.0;
        let revenue = non_negative_field(data, "revenue");
        let orders = non_negative_field(data, "orders");
        let spend = non_negative_field(data, "spend");
        let reported_aov = non_negative_field(data, "avg_order_value");

        if let (Some(revenue), Some(orders), Some(aov)) = (revenue, orders, reported_aov) {
            if orders > 0.0 && aov > 0.0 && revenue > 0.0 {
                let calculated = revenue / orders;
                consistency *= (calculated / aov).min(aov / calculated);
            }
        }

        if let (Some(revenue), Some(spend)) = (revenue, spend) {
            if spend > 0.0 {
                let roas = revenue / spend;
                if roas > 10.0 {
                    consistency *= 0.8;
                } else if roas < 0.5 {
                    consistency *= 0.9;
                }
            }
        }

        (completeness + consistency) / 2.0
    }

    /// Sample-count tier × variability penalty × freshness multiplier, capped.
    pub fn historical(&self, history: &[RawRecord], today: NaiveDate) -> f64 {
        if history.is_empty() {
            return 0.2;
        }

        let mut confidence = self.history_profile.base(history.len());
        let records = DataProcessor::normalize_history(history);

        if let Some(latest) = records.last() {
            let revenue = DataProcessor::series(&records, Metric::Revenue);
            let cv = coefficient_of_variation(&revenue).unwrap_or(1.0);
            if cv > 2.0 {
                confidence *= 0.7;
            } else if cv > 1.0 {
                confidence *= 0.85;
            }

            let age_days = (today - latest.date).num_days();
            confidence *= match age_days {
                d if d <= 1 => 1.1,
                d if d <= 7 => 1.0,
                d if d <= 30 => 0.9,
                _ => 0.8,
            };
        }

        confidence.min(MAX_CONFIDENCE)
    }

    /// Training accuracy (or 0.7) scaled by prediction-variance band.
    pub fn model(&self, prediction_variance: f64, training_accuracy: Option<f64>) -> f64 {
        let base = training_accuracy.unwrap_or(0.7);
        let factor = if prediction_variance < 0.1 {
            1.1
        } else if prediction_variance < 0.3 {
            1.0
        } else if prediction_variance < 0.5 {
            0.9
        } else {
            0.8
        };
        (base * factor).min(MAX_CONFIDENCE)
    }

    pub fn overall(&self, data_quality: f64, historical: f64, model: f64, weights: ConfidenceWeights) -> f64 {
        clamp_confidence(
            data_quality * weights.data_quality + historical * weights.historical + model * weights.model,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: serde_json::Value) -> RawRecord {
        value.as_object().cloned().unwrap()
    }

    fn steady_history(days: usize, last: NaiveDate) -> Vec<RawRecord> {
        (0..days)
            .map(|i| {
                let date = last - chrono::Duration::days((days - 1 - i) as i64);
                record(json!({"date": date.to_string(), "revenue": 100 + (i % 3) * 10}))
            })
            .collect()
    }

    fn day(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_data_quality_complete_and_consistent() {
        let calculator = ConfidenceCalculator::default();
        let score = calculator.data_quality(&record(json!({
            "revenue": 5000, "orders": 100, "spend": 1000,
            "conversion_rate": 0.03, "avg_order_value": 50
        })));
        assert!((score - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_data_quality_penalizes_inconsistency() {
        let calculator = ConfidenceCalculator::default();
        // AOV reported 100 vs calculated 50 -> 0.5; ROAS 20 -> x0.8
        let score = calculator.data_quality(&record(json!({
            "revenue": 5000, "orders": 100, "spend": 250,
            "avg_order_value": 100
        })));
        assert!((score - (0.75 + 0.4) / 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_historical_empty_is_low() {
        let calculator = ConfidenceCalculator::default();
        assert_eq!(calculator.historical(&[], day("2024-05-01")), 0.2);
    }

    #[test]
    fn test_historical_is_monotonic_in_sample_count() {
        let calculator = ConfidenceCalculator::default();
        let today = day("2024-05-01");
        let mut previous = 0.0;
        for days in 1..=90 {
            let score = calculator.historical(&steady_history(days, today), today);
            assert!(score >= previous, "dropped at {days} days");
            previous = score;
        }
        assert_eq!(previous, 0.95);
    }

    #[test]
    fn test_historical_stale_data_is_discounted() {
        let calculator = ConfidenceCalculator::default();
        let history = steady_history(30, day("2024-01-01"));
        let fresh = calculator.historical(&history, day("2024-01-01"));
        let stale = calculator.historical(&history, day("2024-06-01"));
        assert!(stale < fresh);
        assert!((stale - 0.85 * 0.8).abs() < 1e-12);
    }

    #[test]
    fn test_model_confidence_bands() {
        let calculator = ConfidenceCalculator::default();
        assert!((calculator.model(0.05, None) - 0.77).abs() < 1e-12);
        assert!((calculator.model(0.6, Some(0.9)) - 0.72).abs() < 1e-12);
        assert_eq!(calculator.model(0.0, Some(0.9)), 0.95);
    }

    #[test]
    fn test_overall_is_clamped() {
        let calculator = ConfidenceCalculator::default();
        let weights = ConfidenceWeights::default();
        assert_eq!(calculator.overall(0.0, 0.0, 0.0, weights), 0.1);
        assert_eq!(calculator.overall(1.0, 1.0, 1.0, weights), 0.95);
        assert!((calculator.overall(0.5, 0.5, 0.5, weights) - 0.5).abs() < 1e-12);
    }
}
