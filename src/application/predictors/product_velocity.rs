//! Product velocity: where a product's demand is heading and how fast.

use crate::application::analytics::data_processor::DataProcessor;
use crate::application::analytics::statistics::{coefficient_of_variation, mean, normalized_slope, sample_variance, tail};
use crate::application::ml::{ForecastStrategy, ForestModel, ForestParams, PredictContext, TieredPredictor, TrainingSet};
use crate::application::predictors::{LabeledRow, fit_regressor, title_case};
use crate::domain::confidence::{ConfidenceProfile, SampleTier};
use crate::domain::errors::{PredictionError, TrainingError};
use crate::domain::lookup::{CategoryProfile, CategoryTable};
use crate::domain::ml::FeatureVector;
use crate::domain::ml::feature_registry::VELOCITY_FEATURES;
use crate::domain::opportunity::{Difficulty, Opportunity, rank_opportunities};
use crate::domain::prediction::{Forecast, Prediction, RiskLevel};
use crate::domain::records::{HistoricalRecord, Metric, RawRecord};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const MIN_HISTORY: usize = 7;
const SEASONAL_MIN_HISTORY: usize = 30;
const TREND_WINDOW: usize = 14;
const RULE_CONFIDENCE: f64 = 0.6;
const DIRECTION_THRESHOLD: f64 = 0.05;
const MARKET_SIGNALS: [&str; 4] = [
    "search_volume_change",
    "social_mentions_change",
    "competitor_price_change",
    "market_demand_change",
];

pub type ProductVelocityPredictor = TieredPredictor<ProductVelocityStrategy>;

fn default_category() -> String {
    "general".to_string()
}

fn default_days_since_launch() -> f64 {
    365.0
}

fn default_price_percentile() -> f64 {
    0.5
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductData {
    #[serde(default = "default_category")]
    pub category: String,
    #[serde(default)]
    pub units_sold_30d: f64,
    #[serde(default)]
    pub price: f64,
    #[serde(default)]
    pub inventory: f64,
    #[serde(default = "default_days_since_launch")]
    pub days_since_launch: f64,
    #[serde(default)]
    pub competitive_products: f64,
    #[serde(default = "default_price_percentile")]
    pub price_percentile: f64,
    #[serde(default)]
    pub sales_history: Vec<RawRecord>,
}

impl Default for ProductData {
    fn default() -> Self {
        Self {
            category: default_category(),
            units_sold_30d: 0.0,
            price: 0.0,
            inventory: 0.0,
            days_since_launch: default_days_since_launch(),
            competitive_products: 0.0,
            price_percentile: default_price_percentile(),
            sales_history: Vec::new(),
        }
    }
}

impl ProductData {
    fn category_key(&self) -> String {
        let key = self.category.trim().to_lowercase();
        if key.is_empty() { default_category() } else { key }
    }

    fn units_30d(&self) -> f64 {
        self.units_sold_30d.max(0.0)
    }

    fn inventory(&self) -> f64 {
        self.inventory.max(0.0)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VelocityRequest {
    #[serde(default)]
    pub product_id: String,
    #[serde(default)]
    pub product_data: ProductData,
    #[serde(default)]
    pub market_data: Option<Vec<RawRecord>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Upward,
    Downward,
    Stable,
}

impl Direction {
    pub fn from_change(change: f64) -> Self {
        if change > DIRECTION_THRESHOLD {
            Direction::Upward
        } else if change < -DIRECTION_THRESHOLD {
            Direction::Downward
        } else {
            Direction::Stable
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VelocityForecast {
    pub product_id: String,
    pub velocity_change: f64,
    pub direction: Direction,
    pub magnitude: f64,
    pub timeframe: String,
    pub risk_level: RiskLevel,
    pub top_opportunity: Option<Opportunity>,
    pub opportunities: Vec<Opportunity>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VelocitySample {
    #[serde(default)]
    pub product_data: ProductData,
    #[serde(default)]
    pub market_data: Option<Vec<RawRecord>>,
    pub actual_velocity_change: f64,
}

pub struct ProductVelocityStrategy {
    categories: CategoryTable,
    confidence: ConfidenceProfile,
}

impl Default for ProductVelocityStrategy {
    fn default() -> Self {
        Self::new(CategoryTable::default())
    }
}

impl ProductVelocityStrategy {
    pub fn new(categories: CategoryTable) -> Self {
        Self {
            categories,
            confidence: ConfidenceProfile::new(
                vec![
                    SampleTier::new(60, 0.9),
                    SampleTier::new(30, 0.75),
                    SampleTier::new(14, 0.6),
                ],
                0.5,
            ),
        }
    }

    fn category(&self, product: &ProductData) -> &CategoryProfile {
        self.categories.get(&product.category_key())
    }

    /// Mean units sold in the current month relative to the overall mean.
    fn seasonal_factor(history: &[HistoricalRecord], units: &[f64], today: NaiveDate) -> f64 {
        if history.len() < SEASONAL_MIN_HISTORY {
            return 1.0;
        }
        let this_month: Vec<f64> = history
            .iter()
            .filter(|r| r.date.month() == today.month())
            .map(|r| r.units_sold)
            .collect();
        let overall = mean(units);
        if this_month.is_empty() || overall <= 0.0 {
            return 1.0;
        }
        mean(&this_month) / overall
    }

    fn market_signals(market_data: Option<&Vec<RawRecord>>) -> [f64; 4] {
        let Some(latest) = market_data.and_then(|rows| rows.last()) else {
            return [0.0; 4];
        };
        MARKET_SIGNALS.map(|field| DataProcessor::signed_field(latest, field).unwrap_or(0.0))
    }

    fn features_for(&self, product: &ProductData, market_data: Option<&Vec<RawRecord>>, today: NaiveDate) -> FeatureVector {
        let category = self.category(product);
        let current_velocity = product.units_30d() / 30.0;
        let history = DataProcessor::normalize_history(&product.sales_history);

        let (recent_trend, velocity_variance, seasonal_factor) = if history.len() >= MIN_HISTORY {
            let units = DataProcessor::series(&history, Metric::UnitsSold);
            (
                normalized_slope(tail(&units, TREND_WINDOW)),
                sample_variance(&units),
                Self::seasonal_factor(&history, &units, today),
            )
        } else {
            (0.0, 1.0, 1.0)
        };

        let lifecycle_position = if category.lifecycle_days > 0.0 {
            (product.days_since_launch.max(0.0) / category.lifecycle_days).min(1.0)
        } else {
            1.0
        };
        let monthly_units = current_velocity * 30.0;
        let denominator = if monthly_units > 0.0 { monthly_units } else { 1.0 };
        let inventory_pressure = (product.inventory() / denominator).clamp(0.0, 1.0);

        let mut values = vec![
            current_velocity,
            recent_trend,
            velocity_variance,
            seasonal_factor,
            lifecycle_position,
            inventory_pressure,
            product.price_percentile,
            product.competitive_products,
            category.seasonality,
            category.trend_sensitivity,
        ];
        values.extend(Self::market_signals(market_data));

        if history.len() >= MIN_HISTORY {
            FeatureVector::from_history(values, history.len())
        } else {
            FeatureVector::defaults(values, history.len(), MIN_HISTORY)
        }
    }

    fn risk_level(change: f64, confidence: f64) -> RiskLevel {
        let magnitude = change.abs();
        if magnitude > 0.3 || confidence < 0.5 {
            RiskLevel::High
        } else if magnitude > 0.15 || confidence < 0.7 {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }

    fn actions(direction: Direction, magnitude: f64, product: &ProductData) -> Vec<String> {
        let band: &[&str] = match direction {
            Direction::Upward if magnitude > 0.2 => &[
                "OPPORTUNITY: Increase inventory levels immediately",
                "Scale up marketing spend for this product",
                "Consider raising price if demand outstrips supply",
                "Prepare for potential stockouts",
                "Bundle with related products to maximize revenue",
            ],
            Direction::Upward if magnitude > 0.1 => &[
                "Increase marketing budget allocation",
                "Monitor inventory levels closely",
                "Prepare for increased demand",
                "Consider promotional campaigns to capitalize on trend",
            ],
            Direction::Downward if magnitude > 0.2 => &[
                "WARNING: Significant demand decline expected",
                "Reduce inventory orders immediately",
                "Implement clearance pricing strategy",
                "Shift marketing budget to better-performing products",
                "Analyze customer feedback for improvement opportunities",
            ],
            Direction::Downward if magnitude > 0.1 => &[
                "Monitor performance closely",
                "Consider promotional discounts to maintain velocity",
                "Reduce marketing spend gradually",
                "Investigate causes of decline",
            ],
            _ => &[
                "Maintain current strategy",
                "Continue monitoring performance",
                "Look for optimization opportunities",
                "Consider testing new marketing approaches",
            ],
        };
        let mut actions: Vec<String> = band.iter().map(|a| a.to_string()).collect();

        let monthly = product.units_30d();
        if product.inventory() < monthly * 0.5 {
            actions.push("URGENT: Restock immediately - low inventory risk".to_string());
        } else if product.inventory() > monthly * 2.0 {
            actions.push("Consider reducing inventory levels - overstocked".to_string());
        }
        actions
    }

    fn opportunities(direction: Direction, magnitude: f64, product: &ProductData) -> Vec<Opportunity> {
        let mut opportunities = Vec::new();
        let monthly = product.units_30d();
        let inventory = product.inventory();

        if monthly > 0.0 && inventory < monthly * 0.5 {
            let impact = (monthly - inventory) / monthly;
            opportunities.push(Opportunity::new(
                "Restock",
                "inventory",
                impact,
                Difficulty::from_impact(impact),
                format!("Only {:.0} units on hand against {:.0} sold in the last 30 days", inventory, monthly),
            ));
        } else if inventory > monthly * 2.0 && inventory > 0.0 {
            let impact = ((inventory - monthly * 2.0) / inventory).min(1.0);
            opportunities.push(Opportunity::new(
                "Reduce Overstock",
                "inventory",
                impact,
                Difficulty::from_impact(impact),
                format!("{:.0} units on hand covers more than two months of sales", inventory),
            ));
        }

        match direction {
            Direction::Upward if magnitude > 0.1 => opportunities.push(Opportunity::new(
                "Scale Marketing",
                "velocity",
                magnitude,
                Difficulty::from_impact(magnitude),
                format!("Demand is rising {:.0}%; put more budget behind this product", magnitude * 100.0),
            )),
            Direction::Downward if magnitude > 0.2 => opportunities.push(Opportunity::new(
                "Clearance Pricing",
                "velocity",
                magnitude,
                Difficulty::Easy,
                format!("Demand is falling {:.0}%; clear stock before it ages", magnitude * 100.0),
            )),
            _ => {}
        }

        opportunities
    }

    fn forecast(
        &self,
        input: &VelocityRequest,
        change: f64,
        confidence: f64,
        explanation: String,
    ) -> Forecast<VelocityForecast> {
        let product = &input.product_data;
        let direction = Direction::from_change(change);
        let magnitude = change.abs();
        let (top_opportunity, opportunities) = rank_opportunities(Self::opportunities(direction, magnitude, product));

        Forecast::new(
            VelocityForecast {
                product_id: input.product_id.clone(),
                velocity_change: change,
                direction,
                magnitude,
                timeframe: self.category(product).timeframes.for_magnitude(magnitude).to_string(),
                risk_level: Self::risk_level(change, confidence),
                top_opportunity,
                opportunities,
            },
            confidence,
            explanation,
            Self::actions(direction, magnitude, product),
        )
    }

    fn trained_explanation(change: f64, product: &ProductData) -> String {
        let magnitude = change.abs();
        let degree = if magnitude > 0.3 {
            "significantly"
        } else if magnitude > 0.15 {
            "moderately"
        } else {
            "slightly"
        };
        let trend = match Direction::from_change(change) {
            Direction::Upward => format!("demand increasing {}", degree),
            Direction::Downward => format!("demand declining {}", degree),
            Direction::Stable => "demand remaining stable".to_string(),
        };

        let mut context = Vec::new();
        if product.days_since_launch < 30.0 {
            context.push("new product launch momentum");
        } else if product.days_since_launch > 365.0 {
            context.push("mature product lifecycle");
        }
        if product.inventory() < product.units_30d() {
            context.push("low inventory levels");
        }
        let drivers = if context.is_empty() {
            String::new()
        } else {
            format!(" driven by {}", context.join(", "))
        };

        format!("{} product showing {}{}.", title_case(&product.category_key()), trend, drivers)
    }
}

impl ForecastStrategy for ProductVelocityStrategy {
    type Input = VelocityRequest;
    type Output = VelocityForecast;
    type Model = ForestModel;
    type Sample = VelocitySample;
    type Row = LabeledRow;

    const NAME: &'static str = "product_velocity";
    const MIN_TRAINING_SAMPLES: usize = 20;

    fn feature_names(&self) -> &'static [&'static str] {
        VELOCITY_FEATURES
    }

    fn subject(&self, input: &VelocityRequest) -> String {
        input.product_id.clone()
    }

    fn extract_features(&self, input: &VelocityRequest, ctx: &PredictContext) -> Result<FeatureVector, PredictionError> {
        Ok(self.features_for(&input.product_data, input.market_data.as_ref(), ctx.today()))
    }

    fn rule_based(
        &self,
        input: &VelocityRequest,
        features: &FeatureVector,
        _ctx: &PredictContext,
    ) -> Result<Forecast<VelocityForecast>, PredictionError> {
        let product = &input.product_data;
        let category = self.category(product);

        let mut change = features.get(1) * 0.5;
        let lifecycle_position = features.get(4);
        if lifecycle_position > 0.8 {
            change *= 0.7;
        } else if lifecycle_position < 0.3 {
            change *= 1.3;
        }
        change *= features.get(3);
        change *= category.volatility_multiplier;

        let timeframe = category.timeframes.for_magnitude(change.abs());
        let explanation = format!(
            "Based on {} category patterns and recent {} trends",
            product.category_key(),
            timeframe
        );
        Ok(self.forecast(input, change, RULE_CONFIDENCE, explanation))
    }

    fn trained(
        &self,
        model: &ForestModel,
        input: &VelocityRequest,
        features: &FeatureVector,
        _ctx: &PredictContext,
    ) -> Result<Forecast<VelocityForecast>, PredictionError> {
        let product = &input.product_data;
        let change = model.predict(&features.values)?;

        let history = DataProcessor::normalize_history(&product.sales_history);
        let units = DataProcessor::series(&history, Metric::UnitsSold);
        let variability = coefficient_of_variation(&units).unwrap_or(0.0);

        let mut multiplier = 1.0;
        if input.market_data.as_ref().is_some_and(|rows| !rows.is_empty()) {
            multiplier *= 1.1;
        }
        if product.days_since_launch > 180.0 {
            multiplier *= 1.1;
        } else if product.days_since_launch < 30.0 {
            multiplier *= 0.8;
        }
        let confidence = self.confidence.score(history.len(), variability, multiplier);

        Ok(self.forecast(input, change, confidence, Self::trained_explanation(change, product)))
    }

    fn fallback(&self, input: &VelocityRequest) -> Forecast<VelocityForecast> {
        Forecast::new(
            VelocityForecast {
                product_id: input.product_id.clone(),
                velocity_change: 0.0,
                direction: Direction::Stable,
                magnitude: 0.0,
                timeframe: "2 weeks".to_string(),
                risk_level: RiskLevel::Medium,
                top_opportunity: None,
                opportunities: Vec::new(),
            },
            0.3,
            "Limited data available. Using stable demand assumption.",
            vec![
                "Collect more product performance data".to_string(),
                "Monitor sales trends closely".to_string(),
                "Maintain current inventory levels".to_string(),
            ],
        )
    }

    fn prepare_training(&self, samples: &[VelocitySample], ctx: &PredictContext) -> TrainingSet<LabeledRow> {
        samples
            .iter()
            .map(|sample| {
                let target = sample.actual_velocity_change;
                if !target.is_finite() {
                    return None;
                }
                let features = self.features_for(&sample.product_data, sample.market_data.as_ref(), ctx.today());
                features
                    .values
                    .iter()
                    .all(|v| v.is_finite())
                    .then_some((features.values, target))
            })
            .collect()
    }

    fn fit(&self, rows: &[LabeledRow], params: &ForestParams) -> Result<(ForestModel, BTreeMap<String, f64>), TrainingError> {
        fit_regressor(Self::NAME, rows, params)
    }
}

impl ProductVelocityPredictor {
    /// Predicts every product independently, in input order.
    pub fn batch_predict(&self, products: &[VelocityRequest]) -> Vec<Prediction<VelocityForecast>> {
        self.predict_batch(products)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::prediction::PredictionTier;
    use crate::infrastructure::clock::FixedClock;
    use crate::infrastructure::persistence::InMemoryArtifactStore;
    use chrono::Duration;
    use serde_json::json;
    use std::sync::Arc;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 10).unwrap()
    }

    fn ctx() -> PredictContext {
        PredictContext {
            now: FixedClock::at_date(today()).0,
        }
    }

    fn predictor() -> ProductVelocityPredictor {
        TieredPredictor::new(
            ProductVelocityStrategy::default(),
            Arc::new(InMemoryArtifactStore::new()),
            Arc::new(FixedClock::at_date(today())),
        )
    }

    /// Consecutive daily rows ending today.
    fn sales(units: &[f64]) -> Vec<RawRecord> {
        let start = today() - Duration::days(units.len() as i64 - 1);
        units
            .iter()
            .enumerate()
            .map(|(i, u)| {
                let date = start + Duration::days(i as i64);
                json!({"date": date.to_string(), "units_sold": u}).as_object().cloned().unwrap()
            })
            .collect()
    }

    fn rising_fashion() -> VelocityRequest {
        let units: Vec<f64> = (1..=14).map(|i| i as f64 * 5.0).collect();
        VelocityRequest {
            product_id: "sku-1".to_string(),
            product_data: ProductData {
                category: "fashion".to_string(),
                units_sold_30d: 100.0,
                inventory: 150.0,
                days_since_launch: 20.0,
                sales_history: sales(&units),
                ..Default::default()
            },
            market_data: None,
        }
    }

    #[test]
    fn test_rising_new_product_is_upward() {
        let prediction = predictor().predict(&rising_fashion());

        assert_eq!(prediction.tier, PredictionTier::RuleBased);
        // slope 5 / mean 37.5, halved, x1.3 new product, x1.2 fashion
        assert!((prediction.value.velocity_change - 0.104).abs() < 1e-9);
        assert_eq!(prediction.value.direction, Direction::Upward);
        assert_eq!(prediction.value.timeframe, "1 month");
        assert_eq!(prediction.value.risk_level, RiskLevel::Medium);
        assert_eq!(prediction.confidence, 0.6);
        assert_eq!(prediction.actions[0], "Increase marketing budget allocation");
        assert_eq!(
            prediction.explanation,
            "Based on fashion category patterns and recent 1 month trends"
        );
        assert_eq!(prediction.value.top_opportunity.unwrap().name, "Scale Marketing");
    }

    #[test]
    fn test_short_history_uses_default_features() {
        let mut request = rising_fashion();
        request.product_data.sales_history = sales(&[5.0, 6.0, 7.0]);

        let features = ProductVelocityStrategy::default()
            .extract_features(&request, &ctx())
            .unwrap();
        assert_eq!(features.len(), VELOCITY_FEATURES.len());
        assert_eq!(features.defaulted_below, Some(MIN_HISTORY));
        assert_eq!(features.get(1), 0.0);
        assert_eq!(features.get(2), 1.0);
        assert_eq!(features.get(3), 1.0);

        let prediction = predictor().predict(&request);
        assert_eq!(prediction.value.direction, Direction::Stable);
        assert!(matches!(
            prediction.degradation[0],
            PredictionError::InsufficientData { available: 3, required: 7 }
        ));
    }

    #[test]
    fn test_zero_sales_does_not_divide_by_zero() {
        let request = VelocityRequest {
            product_id: "sku-0".to_string(),
            product_data: ProductData {
                inventory: 40.0,
                ..Default::default()
            },
            market_data: None,
        };
        let features = ProductVelocityStrategy::default()
            .extract_features(&request, &ctx())
            .unwrap();
        assert_eq!(features.get(0), 0.0);
        assert_eq!(features.get(5), 1.0);

        let prediction = predictor().predict(&request);
        assert_eq!(prediction.tier, PredictionTier::RuleBased);
        assert!(prediction.actions.iter().any(|a| a.contains("overstocked")));
    }

    #[test]
    fn test_seasonal_factor_uses_current_month() {
        let mut units = vec![10.0; 31];
        units.extend(vec![20.0; 10]);
        let mut request = rising_fashion();
        request.product_data.sales_history = sales(&units);

        let features = ProductVelocityStrategy::default()
            .extract_features(&request, &ctx())
            .unwrap();
        let expected = 20.0 / (510.0 / 41.0);
        assert!((features.get(3) - expected).abs() < 1e-9);
    }

    #[test]
    fn test_market_signals_use_latest_entry() {
        let mut request = rising_fashion();
        request.market_data = Some(vec![
            json!({"search_volume_change": 0.5}).as_object().cloned().unwrap(),
            json!({"search_volume_change": -0.2, "market_demand_change": "0.1"})
                .as_object()
                .cloned()
                .unwrap(),
        ]);

        let features = ProductVelocityStrategy::default()
            .extract_features(&request, &ctx())
            .unwrap();
        assert_eq!(features.get(10), -0.2);
        assert_eq!(features.get(11), 0.0);
        assert_eq!(features.get(13), 0.1);
    }

    #[test]
    fn test_low_inventory_adds_restock() {
        let mut request = rising_fashion();
        request.product_data.inventory = 10.0;

        let prediction = predictor().predict(&request);
        assert!(prediction.actions.iter().any(|a| a.starts_with("URGENT: Restock")));
        let names: Vec<_> = prediction.value.opportunities.iter().map(|o| o.name.as_str()).collect();
        assert_eq!(names, vec!["Restock", "Scale Marketing"]);
    }

    #[test]
    fn test_risk_levels() {
        assert_eq!(ProductVelocityStrategy::risk_level(0.4, 0.9), RiskLevel::High);
        assert_eq!(ProductVelocityStrategy::risk_level(0.0, 0.4), RiskLevel::High);
        assert_eq!(ProductVelocityStrategy::risk_level(0.2, 0.9), RiskLevel::Medium);
        assert_eq!(ProductVelocityStrategy::risk_level(0.01, 0.8), RiskLevel::Low);
    }

    #[test]
    fn test_trained_explanation_context() {
        let product = ProductData {
            category: "electronics".to_string(),
            units_sold_30d: 50.0,
            inventory: 20.0,
            days_since_launch: 400.0,
            ..Default::default()
        };
        assert_eq!(
            ProductVelocityStrategy::trained_explanation(-0.2, &product),
            "Electronics product showing demand declining moderately driven by mature product lifecycle, low inventory levels."
        );
    }

    #[test]
    fn test_fallback_is_stable() {
        let forecast = ProductVelocityStrategy::default().fallback(&rising_fashion());
        assert_eq!(forecast.value.direction, Direction::Stable);
        assert_eq!(forecast.value.timeframe, "2 weeks");
        assert_eq!(forecast.value.risk_level, RiskLevel::Medium);
    }
}
