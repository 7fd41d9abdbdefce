//! Customer purchase timing: when a customer buys next, and how likely that is.

use crate::application::analytics::data_processor::DataProcessor;
use crate::application::analytics::statistics::{mean, normalized_slope, population_std, tail};
use crate::application::ml::{ForecastStrategy, ForestModel, ForestParams, PredictContext, TieredPredictor, TrainingSet};
use crate::application::predictors::{title_case, whole_days};
use crate::domain::confidence::{ConfidenceProfile, SampleTier};
use crate::domain::errors::{FailureStage, PredictionError, TrainingError};
use crate::domain::lookup::{SegmentProfile, SegmentTable};
use crate::domain::ml::FeatureVector;
use crate::domain::ml::feature_registry::CUSTOMER_FEATURES;
use crate::domain::prediction::{Forecast, Prediction, RiskLevel};
use crate::domain::records::{HistoricalRecord, RawRecord};
use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

const RULE_CONFIDENCE: f64 = 0.65;
const COLD_START_CONFIDENCE: f64 = 0.4;
const RECENT_WINDOW_DAYS: i64 = 30;

pub type CustomerPurchasePredictor = TieredPredictor<CustomerPurchaseStrategy>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BehaviorData {
    #[serde(default)]
    pub email_opens_30d: f64,
    #[serde(default)]
    pub website_visits_30d: f64,
    #[serde(default)]
    pub product_views_30d: f64,
    #[serde(default)]
    pub cart_abandonment_rate: f64,
}

impl BehaviorData {
    fn signals(&self) -> [f64; 4] {
        [
            self.email_opens_30d,
            self.website_visits_30d,
            self.product_views_30d,
            self.cart_abandonment_rate,
        ]
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PurchaseRequest {
    #[serde(default)]
    pub customer_id: String,
    #[serde(default)]
    pub purchase_history: Vec<RawRecord>,
    #[serde(default)]
    pub behavior_data: Option<BehaviorData>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PurchaseForecast {
    pub customer_id: String,
    pub days_to_purchase: u32,
    pub purchase_probability: f64,
    pub segment: String,
    pub urgency_level: RiskLevel,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PurchaseSample {
    #[serde(default)]
    pub purchase_history: Vec<RawRecord>,
    #[serde(default)]
    pub behavior_data: Option<BehaviorData>,
    pub actual_days_to_next_purchase: f64,
    pub did_purchase: bool,
}

/// Timing regressor plus a purchase-probability forest fitted on 0/1 labels.
#[derive(Debug, Serialize, Deserialize)]
pub struct CustomerModel {
    timing: ForestModel,
    purchase: ForestModel,
}

/// Features, timing target, purchase label.
pub type PurchaseRow = (Vec<f64>, f64, f64);

/// Purchase history reduced to what the formulas need.
struct PurchaseProfile {
    purchases: Vec<HistoricalRecord>,
    intervals: Vec<f64>,
    recency: f64,
    lifetime_value: f64,
}

impl PurchaseProfile {
    fn from_history(history: &[RawRecord], today: NaiveDate) -> Self {
        let purchases = DataProcessor::normalize_history(history);
        let intervals = purchases
            .windows(2)
            .map(|pair| (pair[1].date - pair[0].date).num_days() as f64)
            .collect();
        let recency = purchases
            .last()
            .map(|last| (today - last.date).num_days().max(0) as f64)
            .unwrap_or(0.0);
        let lifetime_value = purchases.iter().map(|p| p.amount).sum();

        Self {
            purchases,
            intervals,
            recency,
            lifetime_value,
        }
    }

    fn amounts(&self) -> Vec<f64> {
        self.purchases.iter().map(|p| p.amount).collect()
    }
}

pub struct CustomerPurchaseStrategy {
    segments: SegmentTable,
    confidence: ConfidenceProfile,
}

impl Default for CustomerPurchaseStrategy {
    fn default() -> Self {
        Self::new(SegmentTable::default())
    }
}

impl CustomerPurchaseStrategy {
    pub fn new(segments: SegmentTable) -> Self {
        Self {
            segments,
            confidence: ConfidenceProfile::new(
                vec![
                    SampleTier::new(5, 0.9),
                    SampleTier::new(3, 0.75),
                    SampleTier::new(2, 0.6),
                ],
                0.5,
            ),
        }
    }

    fn segment(&self, profile: &PurchaseProfile) -> Result<&SegmentProfile, PredictionError> {
        self.segments
            .classify(profile.lifetime_value, profile.purchases.len())
            .ok_or_else(|| PredictionError::failure(FailureStage::RuleEvaluation, "no customer segments configured"))
    }

    fn features_for(&self, profile: &PurchaseProfile, behavior: Option<&BehaviorData>, today: NaiveDate) -> Vec<f64> {
        let amounts = profile.amounts();
        let avg_days_between = if profile.intervals.is_empty() { 30.0 } else { mean(&profile.intervals) };
        let std_days_between = if profile.intervals.len() > 1 {
            population_std(&profile.intervals)
        } else {
            15.0
        };

        let months: BTreeSet<u32> = profile.purchases.iter().map(|p| p.date.month()).collect();
        let since = today - Duration::days(RECENT_WINDOW_DAYS);
        let recent: Vec<&HistoricalRecord> = profile.purchases.iter().filter(|p| p.date >= since).collect();
        let recent_trend = if amounts.len() >= 3 {
            normalized_slope(tail(&amounts, 3))
        } else {
            0.0
        };

        let mut features = vec![
            profile.recency,
            profile.purchases.len() as f64,
            profile.lifetime_value,
            mean(&amounts),
            avg_days_between,
            std_days_between,
            months.len() as f64 / 12.0,
            recent.len() as f64,
            recent.iter().map(|p| p.amount).sum(),
            recent_trend,
        ];
        features.extend(behavior.copied().unwrap_or_default().signals());
        features
    }

    fn urgency(days: f64, probability: f64) -> RiskLevel {
        let score = probability / (days / 7.0).max(1.0);
        if score > 0.3 {
            RiskLevel::High
        } else if score > 0.15 {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }

    fn actions(days: f64, probability: f64, segment: &str) -> Vec<String> {
        let band: &[&str] = if days <= 3.0 && probability > 0.6 {
            &[
                "HIGH PRIORITY: Send purchase reminder email",
                "Offer limited-time discount to trigger purchase",
                "Show personalized product recommendations",
                "Consider SMS reminder if opted in",
            ]
        } else if days <= 7.0 && probability > 0.5 {
            &[
                "Send nurturing email sequence",
                "Show retargeting ads with favorite products",
                "Offer free shipping incentive",
                "Share customer reviews and social proof",
            ]
        } else if days <= 14.0 {
            &[
                "Include in weekly newsletter",
                "Show educational content about products",
                "Highlight new arrivals that match preferences",
                "Send seasonal promotion",
            ]
        } else {
            &[
                "Add to long-term nurture campaign",
                "Send monthly check-in email",
                "Track engagement and adjust strategy",
                "Focus on brand awareness content",
            ]
        };
        let mut actions: Vec<String> = band.iter().map(|a| a.to_string()).collect();

        match segment {
            "high_value" => {
                actions.push("Offer VIP customer exclusive access".to_string());
                actions.push("Provide dedicated customer service".to_string());
            }
            "new" => {
                actions.push("Send welcome series and educational content".to_string());
                actions.push("Offer first-time buyer incentives".to_string());
            }
            _ => {}
        }
        actions
    }

    fn forecast(
        input: &PurchaseRequest,
        days: f64,
        probability: f64,
        segment: &str,
        confidence: f64,
        explanation: String,
    ) -> Forecast<PurchaseForecast> {
        Forecast::new(
            PurchaseForecast {
                customer_id: input.customer_id.clone(),
                days_to_purchase: whole_days(days),
                purchase_probability: probability,
                segment: segment.to_string(),
                urgency_level: Self::urgency(days, probability),
            },
            confidence,
            explanation,
            Self::actions(days, probability, segment),
        )
    }
}

impl ForecastStrategy for CustomerPurchaseStrategy {
    type Input = PurchaseRequest;
    type Output = PurchaseForecast;
    type Model = CustomerModel;
    type Sample = PurchaseSample;
    type Row = PurchaseRow;

    const NAME: &'static str = "customer_purchase";
    const MIN_TRAINING_SAMPLES: usize = 20;

    fn feature_names(&self) -> &'static [&'static str] {
        CUSTOMER_FEATURES
    }

    fn subject(&self, input: &PurchaseRequest) -> String {
        input.customer_id.clone()
    }

    fn cold_start(
        &self,
        input: &PurchaseRequest,
        _ctx: &PredictContext,
    ) -> Option<(Forecast<PurchaseForecast>, PredictionError)> {
        if !DataProcessor::normalize_history(&input.purchase_history).is_empty() {
            return None;
        }

        let forecast = Forecast::new(
            PurchaseForecast {
                customer_id: input.customer_id.clone(),
                days_to_purchase: 45,
                purchase_probability: 0.25,
                segment: "new".to_string(),
                urgency_level: RiskLevel::Low,
            },
            COLD_START_CONFIDENCE,
            "New customer with no purchase history. Using platform averages.",
            vec![
                "Send welcome email series".to_string(),
                "Offer new customer discount".to_string(),
                "Show popular products and reviews".to_string(),
                "Track engagement for future predictions".to_string(),
            ],
        );
        Some((
            forecast,
            PredictionError::InsufficientData {
                available: 0,
                required: 1,
            },
        ))
    }

    fn extract_features(&self, input: &PurchaseRequest, ctx: &PredictContext) -> Result<FeatureVector, PredictionError> {
        let profile = PurchaseProfile::from_history(&input.purchase_history, ctx.today());
        let points = profile.purchases.len();
        Ok(FeatureVector::from_history(
            self.features_for(&profile, input.behavior_data.as_ref(), ctx.today()),
            points,
        ))
    }

    fn rule_based(
        &self,
        input: &PurchaseRequest,
        _features: &FeatureVector,
        ctx: &PredictContext,
    ) -> Result<Forecast<PurchaseForecast>, PredictionError> {
        let profile = PurchaseProfile::from_history(&input.purchase_history, ctx.today());
        let segment = self.segment(&profile)?;

        let cycle = if profile.intervals.is_empty() {
            segment.default_cycle_days
        } else {
            mean(&profile.intervals)
        };
        let days = (cycle - profile.recency).max(1.0) * segment.timing_multiplier;

        let cycle_position = if cycle > 0.0 { profile.recency / cycle } else { 0.0 };
        let probability = if cycle_position > 1.2 {
            0.8
        } else if cycle_position > 0.8 {
            0.6
        } else {
            0.3
        };

        let explanation = format!(
            "Based on {} customer patterns and {:.0}-day cycle",
            segment.name, cycle
        );
        Ok(Self::forecast(input, days, probability, &segment.name, RULE_CONFIDENCE, explanation))
    }

    fn trained(
        &self,
        model: &CustomerModel,
        input: &PurchaseRequest,
        features: &FeatureVector,
        ctx: &PredictContext,
    ) -> Result<Forecast<PurchaseForecast>, PredictionError> {
        let profile = PurchaseProfile::from_history(&input.purchase_history, ctx.today());
        let segment = self.segment(&profile)?;

        let days = model.timing.predict(&features.values)?;
        let probability = model.purchase.predict(&features.values)?.clamp(0.0, 1.0);

        let timing_variability = if profile.purchases.len() >= 3 && profile.intervals.len() > 1 {
            let avg = mean(&profile.intervals);
            if avg > 0.0 { population_std(&profile.intervals) / avg } else { 1.0 }
        } else {
            0.0
        };
        let confidence = self.confidence.score(
            profile.purchases.len(),
            timing_variability,
            segment.confidence_multiplier,
        );

        let timing = match days {
            d if d <= 3.0 => "very soon".to_string(),
            d if d <= 7.0 => "within a week".to_string(),
            d if d <= 14.0 => "in the next 2 weeks".to_string(),
            d => format!("in about {} days", whole_days(d)),
        };
        let likelihood = if probability > 0.7 {
            "high"
        } else if probability > 0.4 {
            "moderate"
        } else {
            "low"
        };
        let last_purchase = if profile.purchases.len() > 1 {
            format!(" Last purchase was {} days ago.", profile.recency)
        } else {
            String::new()
        };
        let explanation = format!(
            "{} customer with {} probability of purchasing {}.{}",
            title_case(&segment.name),
            likelihood,
            timing,
            last_purchase
        );

        Ok(Self::forecast(input, days, probability, &segment.name, confidence, explanation))
    }

    fn fallback(&self, input: &PurchaseRequest) -> Forecast<PurchaseForecast> {
        Forecast::new(
            PurchaseForecast {
                customer_id: input.customer_id.clone(),
                days_to_purchase: 30,
                purchase_probability: 0.4,
                segment: "unknown".to_string(),
                urgency_level: RiskLevel::Medium,
            },
            0.3,
            "Limited data available. Using general estimates.",
            vec![
                "Collect more customer data".to_string(),
                "Send general marketing content".to_string(),
                "Monitor customer behavior".to_string(),
            ],
        )
    }

    fn prepare_training(&self, samples: &[PurchaseSample], ctx: &PredictContext) -> TrainingSet<PurchaseRow> {
        samples
            .iter()
            .map(|sample| {
                let target = sample.actual_days_to_next_purchase;
                if !target.is_finite() || target < 0.0 {
                    return None;
                }
                let profile = PurchaseProfile::from_history(&sample.purchase_history, ctx.today());
                if profile.purchases.is_empty() {
                    return None;
                }
                let features = self.features_for(&profile, sample.behavior_data.as_ref(), ctx.today());
                let label = if sample.did_purchase { 1.0 } else { 0.0 };
                features
                    .iter()
                    .all(|v| v.is_finite())
                    .then_some((features, target, label))
            })
            .collect()
    }

    fn fit(&self, rows: &[PurchaseRow], params: &ForestParams) -> Result<(CustomerModel, BTreeMap<String, f64>), TrainingError> {
        let x: Vec<Vec<f64>> = rows.iter().map(|(features, _, _)| features.clone()).collect();
        let days: Vec<f64> = rows.iter().map(|(_, days, _)| *days).collect();
        let labels: Vec<f64> = rows.iter().map(|(_, _, label)| *label).collect();

        let (timing, timing_fit) = ForestModel::fit(Self::NAME, &x, &days, params)?;
        let (purchase, purchase_fit) = ForestModel::fit(Self::NAME, &x, &labels, params)?;

        let mut metrics = BTreeMap::new();
        timing_fit.insert_into("timing_", &mut metrics);
        purchase_fit.insert_into("purchase_", &mut metrics);
        Ok((CustomerModel { timing, purchase }, metrics))
    }
}

impl CustomerPurchasePredictor {
    /// Predicts every customer independently; one bad record never affects the others.
    pub fn batch_predict(&self, customers: &[PurchaseRequest]) -> Vec<Prediction<PurchaseForecast>> {
        self.predict_batch(customers)
    }
}
