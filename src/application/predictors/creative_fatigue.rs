//! Creative fatigue: days until an ad creative stops performing.

use crate::application::analytics::data_processor::DataProcessor;
use crate::application::analytics::statistics::{mean, normalized_slope, sample_variance, tail};
use crate::application::ml::{ForecastStrategy, ForestModel, ForestParams, PredictContext, TieredPredictor, TrainingSet};
use crate::application::predictors::{LabeledRow, fit_regressor, whole_days};
use crate::domain::confidence::{ConfidenceProfile, SampleTier};
use crate::domain::errors::{PredictionError, TrainingError};
use crate::domain::lookup::{PlatformProfile, PlatformTable};
use crate::domain::ml::FeatureVector;
use crate::domain::ml::feature_registry::CREATIVE_FATIGUE_FEATURES;
use crate::domain::prediction::{Forecast, RiskLevel};
use crate::domain::records::{HistoricalRecord, Metric, RawRecord};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const MIN_HISTORY: usize = 3;
const TREND_WINDOW: usize = 7;
const RULE_CONFIDENCE: f64 = 0.65;
const DEFAULT_CTR: f64 = 0.02;
const DEFAULT_FREQUENCY: f64 = 2.0;

pub type CreativeFatiguePredictor = TieredPredictor<CreativeFatigueStrategy>;

/// Latest metrics reported for a creative. Everything is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CreativeMetrics {
    #[serde(default)]
    pub ctr: Option<f64>,
    #[serde(default)]
    pub cpm: Option<f64>,
    #[serde(default)]
    pub frequency: Option<f64>,
    #[serde(default)]
    pub days_running: Option<f64>,
    #[serde(default)]
    pub impressions: Option<f64>,
    #[serde(default)]
    pub spend: Option<f64>,
    #[serde(default)]
    pub creative_type_factor: Option<f64>,
    #[serde(default)]
    pub audience_size: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CreativeFatigueRequest {
    #[serde(default)]
    pub creative_id: String,
    #[serde(default)]
    pub platform: String,
    #[serde(default)]
    pub current_metrics: CreativeMetrics,
    #[serde(default)]
    pub historical_data: Vec<RawRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FatigueForecast {
    pub creative_id: String,
    pub platform: String,
    pub days_to_fatigue: u32,
    pub risk_level: RiskLevel,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreativeFatigueSample {
    #[serde(default)]
    pub platform: String,
    #[serde(default)]
    pub current_metrics: CreativeMetrics,
    #[serde(default)]
    pub historical_data: Vec<RawRecord>,
    pub actual_fatigue_days: f64,
}

pub struct CreativeFatigueStrategy {
    platforms: PlatformTable,
    confidence: ConfidenceProfile,
}

impl Default for CreativeFatigueStrategy {
    fn default() -> Self {
        Self::new(PlatformTable::default())
    }
}

impl CreativeFatigueStrategy {
    pub fn new(platforms: PlatformTable) -> Self {
        Self {
            platforms,
            confidence: ConfidenceProfile::new(
                vec![
                    SampleTier::new(30, 0.9),
                    SampleTier::new(14, 0.75),
                    SampleTier::new(7, 0.6),
                    SampleTier::new(3, 0.45),
                ],
                0.4,
            ),
        }
    }

    fn platform_name(request: &CreativeFatigueRequest) -> String {
        let name = request.platform.trim().to_lowercase();
        if name.is_empty() { "unknown".to_string() } else { name }
    }

    fn profile(&self, request: &CreativeFatigueRequest) -> &PlatformProfile {
        self.platforms.get(&request.platform)
    }

    fn features_for(&self, request: &CreativeFatigueRequest, history: &[HistoricalRecord]) -> FeatureVector {
        let metrics = &request.current_metrics;
        let profile = self.profile(request);
        let creative_type = metrics.creative_type_factor.unwrap_or(1.0);
        let audience = metrics.audience_size.unwrap_or(100_000.0);

        if history.len() < MIN_HISTORY {
            return FeatureVector::defaults(
                vec![
                    -0.001,
                    0.05,
                    -0.005,
                    metrics.frequency.unwrap_or(DEFAULT_FREQUENCY),
                    metrics.days_running.unwrap_or(3.0),
                    metrics.impressions.unwrap_or(10_000.0),
                    metrics.spend.unwrap_or(500.0),
                    profile.fatigue_factor,
                    1.0,
                    100_000.0,
                ],
                history.len(),
                MIN_HISTORY,
            );
        }

        let ctr = DataProcessor::series(history, Metric::Ctr);
        let cpm = DataProcessor::series(history, Metric::Cpm);
        let engagement_trend = if history.iter().any(|r| r.engagement_rate.is_some()) {
            let engagement: Vec<f64> = history.iter().map(|r| r.engagement_rate.unwrap_or(0.0)).collect();
            normalized_slope(tail(&engagement, TREND_WINDOW))
        } else {
            0.0
        };

        let frequencies: Vec<f64> = history.iter().filter_map(|r| r.frequency).collect();
        let frequency_avg = if frequencies.is_empty() {
            metrics.frequency.unwrap_or(DEFAULT_FREQUENCY)
        } else {
            mean(&frequencies)
        };

        FeatureVector::from_history(
            vec![
                normalized_slope(tail(&ctr, TREND_WINDOW)),
                normalized_slope(tail(&cpm, TREND_WINDOW)),
                engagement_trend,
                frequency_avg,
                history.len() as f64,
                DataProcessor::series(history, Metric::Impressions).iter().sum(),
                DataProcessor::series(history, Metric::Spend).iter().sum(),
                profile.fatigue_factor,
                creative_type,
                audience,
            ],
            history.len(),
        )
    }

    fn risk_level(days: u32) -> RiskLevel {
        match days {
            0..=2 => RiskLevel::High,
            3..=5 => RiskLevel::Medium,
            _ => RiskLevel::Low,
        }
    }

    fn actions(
        &self,
        days: u32,
        request: &CreativeFatigueRequest,
        history: &[HistoricalRecord],
        frequency: f64,
    ) -> Vec<String> {
        let band: &[&str] = match days {
            0..=2 => &[
                "URGENT: Pause creative immediately",
                "Launch fresh creative variations",
                "Reduce frequency to extend lifespan",
                "Test new audiences with existing creative",
            ],
            3..=5 => &[
                "Prepare new creative variations",
                "Begin A/B testing fresh concepts",
                "Consider reducing budget allocation",
                "Monitor performance daily",
            ],
            _ => &[
                "Continue monitoring performance",
                "Prepare backup creatives",
                "Test minor creative variations",
                "Optimize targeting while performance is strong",
            ],
        };
        let mut actions: Vec<String> = band.iter().map(|a| a.to_string()).collect();

        let profile = self.profile(request);
        let platform = Self::platform_name(request);

        if let Some(ctr) = request.current_metrics.ctr {
            if ctr < profile.ctr_warning_threshold {
                actions.push(format!(
                    "CTR of {:.2}% is below the {} benchmark of {:.2}%: refresh the opening hook",
                    ctr * 100.0,
                    platform,
                    profile.ctr_warning_threshold * 100.0
                ));
            }
        }

        if frequency > profile.optimal_frequency {
            actions.push(format!(
                "Frequency {:.1} exceeds the {} optimum of {:.1}: broaden the audience",
                frequency, platform, profile.optimal_frequency
            ));
        }

        let cpm = DataProcessor::series(history, Metric::Cpm);
        if let Some(latest) = cpm.last() {
            let average = mean(&cpm);
            if average > 0.0 && *latest > average * profile.cpm_warning_multiplier {
                actions.push(format!(
                    "CPM spiked to {:.2} against an average of {:.2}: check auction pressure",
                    latest, average
                ));
            }
        }

        actions
    }

    fn current_frequency(request: &CreativeFatigueRequest, features: &FeatureVector) -> f64 {
        request.current_metrics.frequency.unwrap_or_else(|| features.get(3))
    }

    fn forecast(
        &self,
        request: &CreativeFatigueRequest,
        days: u32,
        confidence: f64,
        explanation: String,
        actions: Vec<String>,
    ) -> Forecast<FatigueForecast> {
        Forecast::new(
            FatigueForecast {
                creative_id: request.creative_id.clone(),
                platform: Self::platform_name(request),
                days_to_fatigue: days,
                risk_level: Self::risk_level(days),
            },
            confidence,
            explanation,
            actions,
        )
    }
}

impl ForecastStrategy for CreativeFatigueStrategy {
    type Input = CreativeFatigueRequest;
    type Output = FatigueForecast;
    type Model = ForestModel;
    type Sample = CreativeFatigueSample;
    type Row = LabeledRow;

    const NAME: &'static str = "creative_fatigue";
    const MIN_TRAINING_SAMPLES: usize = 10;

    fn feature_names(&self) -> &'static [&'static str] {
        CREATIVE_FATIGUE_FEATURES
    }

    fn subject(&self, input: &CreativeFatigueRequest) -> String {
        input.creative_id.clone()
    }

    fn extract_features(
        &self,
        input: &CreativeFatigueRequest,
        _ctx: &PredictContext,
    ) -> Result<FeatureVector, PredictionError> {
        let history = DataProcessor::normalize_history(&input.historical_data);
        Ok(self.features_for(input, &history))
    }

    fn rule_based(
        &self,
        input: &CreativeFatigueRequest,
        features: &FeatureVector,
        _ctx: &PredictContext,
    ) -> Result<Forecast<FatigueForecast>, PredictionError> {
        let profile = self.profile(input);
        let ctr = input.current_metrics.ctr.unwrap_or(DEFAULT_CTR);
        let frequency = Self::current_frequency(input, features);

        // Higher frequency and lower CTR both shorten the cycle
        let frequency_factor = (2.0 - (frequency - 1.0) * 0.3).max(0.5);
        let ctr_factor = (ctr / DEFAULT_CTR).clamp(0.3, 2.0);
        let days = whole_days(profile.fatigue_cycle_days as f64 * frequency_factor * ctr_factor);

        let history = DataProcessor::normalize_history(&input.historical_data);
        let actions = self.actions(days, input, &history, frequency);
        let explanation = format!(
            "Based on {} typical cycles and current metrics",
            Self::platform_name(input)
        );
        Ok(self.forecast(input, days, RULE_CONFIDENCE, explanation, actions))
    }

    fn trained(
        &self,
        model: &ForestModel,
        input: &CreativeFatigueRequest,
        features: &FeatureVector,
        _ctx: &PredictContext,
    ) -> Result<Forecast<FatigueForecast>, PredictionError> {
        let days = whole_days(model.predict(&features.values)?);

        let history = DataProcessor::normalize_history(&input.historical_data);
        let ctr_variance = sample_variance(&DataProcessor::series(&history, Metric::Ctr));
        let confidence = self.confidence.score(history.len(), ctr_variance * 1000.0, 1.0);

        let platform = Self::platform_name(input);
        let explanation = match days {
            0..=2 => format!(
                "Creative showing strong fatigue signals on {}. CTR declining and CPM rising rapidly.",
                platform
            ),
            3..=5 => format!(
                "Creative approaching fatigue on {}. Performance trends indicate declining effectiveness.",
                platform
            ),
            _ => format!(
                "Creative still performing well on {}. Expected to maintain effectiveness for several more days.",
                platform
            ),
        };

        let frequency = Self::current_frequency(input, features);
        let actions = self.actions(days, input, &history, frequency);
        Ok(self.forecast(input, days, confidence, explanation, actions))
    }

    fn fallback(&self, input: &CreativeFatigueRequest) -> Forecast<FatigueForecast> {
        let platform = Self::platform_name(input);
        Forecast::new(
            FatigueForecast {
                creative_id: input.creative_id.clone(),
                platform: platform.clone(),
                days_to_fatigue: 5,
                risk_level: RiskLevel::Medium,
            },
            0.3,
            format!("Limited data available. Using {} platform averages.", platform),
            vec![
                "Collect more performance data".to_string(),
                "Monitor closely over next 48 hours".to_string(),
                "Prepare backup creatives".to_string(),
            ],
        )
    }

    fn prepare_training(
        &self,
        samples: &[CreativeFatigueSample],
        _ctx: &PredictContext,
    ) -> TrainingSet<LabeledRow> {
        samples
            .iter()
            .map(|sample| {
                if !sample.actual_fatigue_days.is_finite() || sample.actual_fatigue_days < 0.0 {
                    return None;
                }
                let request = CreativeFatigueRequest {
                    creative_id: String::new(),
                    platform: sample.platform.clone(),
                    current_metrics: sample.current_metrics.clone(),
                    historical_data: sample.historical_data.clone(),
                };
                let history = DataProcessor::normalize_history(&request.historical_data);
                let features = self.features_for(&request, &history);
                features
                    .values
                    .iter()
                    .all(|v| v.is_finite())
                    .then_some((features.values, sample.actual_fatigue_days))
            })
            .collect()
    }

    fn fit(
        &self,
        rows: &[LabeledRow],
        params: &ForestParams,
    ) -> Result<(ForestModel, BTreeMap<String, f64>), TrainingError> {
        fit_regressor(Self::NAME, rows, params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::prediction::PredictionTier;
    use crate::infrastructure::clock::FixedClock;
    use crate::infrastructure::persistence::InMemoryArtifactStore;
    use chrono::NaiveDate;
    use serde_json::json;
    use std::sync::Arc;

    fn predictor() -> CreativeFatiguePredictor {
        TieredPredictor::new(
            CreativeFatigueStrategy::default(),
            Arc::new(InMemoryArtifactStore::new()),
            Arc::new(FixedClock::at_date(NaiveDate::from_ymd_opt(2024, 6, 1).unwrap())),
        )
    }

    fn request(platform: &str, ctr: f64, frequency: f64) -> CreativeFatigueRequest {
        CreativeFatigueRequest {
            creative_id: "cr-1".to_string(),
            platform: platform.to_string(),
            current_metrics: CreativeMetrics {
                ctr: Some(ctr),
                frequency: Some(frequency),
                ..Default::default()
            },
            historical_data: vec![],
        }
    }

    fn history(days: usize) -> Vec<RawRecord> {
        (0..days)
            .map(|i| {
                json!({
                    "date": format!("2024-05-{:02}", i + 1),
                    "ctr": 0.03 - i as f64 * 0.001,
                    "cpm": 10.0 + i as f64,
                    "impressions": 1000,
                    "spend": 50,
                    "frequency": 2.5,
                })
                .as_object()
                .cloned()
                .unwrap()
            })
            .collect()
    }

    #[test]
    fn test_tiktok_low_ctr_high_frequency_is_high_risk() {
        let prediction = predictor().predict(&request("tiktok", 0.008, 4.5));

        assert_eq!(prediction.tier, PredictionTier::RuleBased);
        assert_eq!(prediction.value.days_to_fatigue, 1);
        assert_eq!(prediction.value.risk_level, RiskLevel::High);
        assert_eq!(prediction.confidence, 0.65);
        assert!(prediction.actions[0].starts_with("URGENT"));
        // CTR below 1% and frequency above 4.0 both warn
        assert!(prediction.actions.iter().any(|a| a.contains("benchmark")));
        assert!(prediction.actions.iter().any(|a| a.contains("optimum")));
    }

    #[test]
    fn test_google_healthy_creative_is_low_risk() {
        let prediction = predictor().predict(&request("google", 0.03, 1.5));
        // 14 * 1.85 * 1.5 = 38.85
        assert_eq!(prediction.value.days_to_fatigue, 38);
        assert_eq!(prediction.value.risk_level, RiskLevel::Low);
        assert_eq!(prediction.explanation, "Based on google typical cycles and current metrics");
    }

    #[test]
    fn test_unknown_platform_uses_default_cycle() {
        let prediction = predictor().predict(&request("snapchat", 0.02, 2.0));
        // 7 * 1.7 * 1.0 = 11.9
        assert_eq!(prediction.value.days_to_fatigue, 11);
    }

    #[test]
    fn test_features_from_history() {
        let strategy = CreativeFatigueStrategy::default();
        let mut req = request("facebook", 0.02, 2.0);
        req.historical_data = history(10);
        let ctx = PredictContext {
            now: chrono::Utc::now(),
        };

        let features = strategy.extract_features(&req, &ctx).unwrap();
        assert_eq!(features.len(), CREATIVE_FATIGUE_FEATURES.len());
        assert!(!features.is_defaulted());
        assert!(features.get(0) < 0.0, "ctr declining");
        assert!(features.get(1) > 0.0, "cpm rising");
        assert_eq!(features.get(3), 2.5);
        assert_eq!(features.get(4), 10.0);
        assert_eq!(features.get(5), 10_000.0);
    }

    #[test]
    fn test_short_history_uses_defaults() {
        let strategy = CreativeFatigueStrategy::default();
        let mut req = request("instagram", 0.02, 3.0);
        req.historical_data = history(2);
        let ctx = PredictContext {
            now: chrono::Utc::now(),
        };

        let features = strategy.extract_features(&req, &ctx).unwrap();
        assert!(features.is_defaulted());
        assert_eq!(features.get(0), -0.001);
        assert_eq!(features.get(3), 3.0);
        assert_eq!(features.get(7), 1.2);
    }

    #[test]
    fn test_fallback_shape() {
        let forecast = CreativeFatigueStrategy::default().fallback(&request("facebook", 0.0, 0.0));
        assert_eq!(forecast.value.days_to_fatigue, 5);
        assert_eq!(forecast.value.risk_level, RiskLevel::Medium);
        assert_eq!(forecast.actions.len(), 3);
    }

    #[test]
    fn test_training_skips_bad_targets() {
        let strategy = CreativeFatigueStrategy::default();
        let ctx = PredictContext {
            now: chrono::Utc::now(),
        };
        let samples = vec![
            CreativeFatigueSample {
                platform: "facebook".to_string(),
                current_metrics: CreativeMetrics::default(),
                historical_data: history(5),
                actual_fatigue_days: 6.0,
            },
            CreativeFatigueSample {
                platform: "facebook".to_string(),
                current_metrics: CreativeMetrics::default(),
                historical_data: vec![],
                actual_fatigue_days: -1.0,
            },
        ];
        let set = strategy.prepare_training(&samples, &ctx);
        assert_eq!(set.len(), 1);
        assert_eq!(set.skipped, 1);
    }
}
