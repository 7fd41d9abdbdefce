//! Budget optimization: the spend level that maximizes return.

use crate::application::analytics::data_processor::DataProcessor;
use crate::application::analytics::statistics::{mean, normalized_slope, sample_variance, tail};
use crate::application::ml::{ForecastStrategy, ForestModel, ForestParams, PredictContext, TieredPredictor, TrainingSet};
use crate::application::predictors::{LabeledRow, fit_regressor};
use crate::domain::confidence::{ConfidenceProfile, SampleTier};
use crate::domain::errors::{PredictionError, TrainingError};
use crate::domain::lookup::PlatformTable;
use crate::domain::ml::FeatureVector;
use crate::domain::ml::feature_registry::BUDGET_FEATURES;
use crate::domain::opportunity::{Difficulty, Opportunity, rank_opportunities};
use crate::domain::prediction::{Forecast, RiskLevel};
use crate::domain::records::{HistoricalRecord, Metric, RawRecord};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const MIN_HISTORY: usize = 7;
const TREND_WINDOW: usize = 14;
const RULE_CONFIDENCE: f64 = 0.6;
/// Monday..Sunday demand multipliers
const WEEKDAY_SEASONALITY: [f64; 7] = [1.0, 1.05, 1.1, 1.15, 1.2, 0.9, 0.8];
const SEARCH_ITERATIONS: usize = 60;

pub type BudgetOptimizer = TieredPredictor<BudgetStrategy>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BudgetConstraints {
    #[serde(default)]
    pub min_spend: Option<f64>,
    #[serde(default)]
    pub max_spend: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BudgetRequest {
    #[serde(default)]
    pub merchant_id: String,
    #[serde(default)]
    pub current_spend: f64,
    #[serde(default)]
    pub current_revenue: f64,
    #[serde(default)]
    pub historical_performance: Vec<RawRecord>,
    #[serde(default)]
    pub constraints: Option<BudgetConstraints>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BudgetForecast {
    pub current_spend: f64,
    pub optimal_spend: f64,
    pub budget_change: f64,
    pub current_revenue: f64,
    pub expected_revenue: f64,
    pub revenue_increase: f64,
    pub current_roi: f64,
    pub expected_roi: f64,
    pub risk_level: RiskLevel,
    pub top_opportunity: Option<Opportunity>,
    pub opportunities: Vec<Opportunity>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BudgetSample {
    pub spend: f64,
    pub revenue: f64,
    #[serde(default)]
    pub historical_data: Vec<RawRecord>,
    /// Realized ROI at `spend`
    pub roi: f64,
}

pub struct BudgetStrategy {
    platforms: PlatformTable,
    confidence: ConfidenceProfile,
}

impl Default for BudgetStrategy {
    fn default() -> Self {
        Self::new(PlatformTable::default())
    }
}

fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator > 0.0 { numerator / denominator } else { 0.0 }
}

/// Maximizes `f` on `[lo, hi]` by golden-section search.
fn golden_section_max<E>(
    lo: f64,
    hi: f64,
    mut f: impl FnMut(f64) -> Result<f64, E>,
) -> Result<(f64, f64), E> {
    if hi - lo <= f64::EPSILON {
        return Ok((lo, f(lo)?));
    }

    let inv_phi = (5f64.sqrt() - 1.0) / 2.0;
    let (mut a, mut b) = (lo, hi);
    let mut c = b - inv_phi * (b - a);
    let mut d = a + inv_phi * (b - a);
    let (mut fc, mut fd) = (f(c)?, f(d)?);

    for _ in 0..SEARCH_ITERATIONS {
        if fc >= fd {
            b = d;
            d = c;
            fd = fc;
            c = b - inv_phi * (b - a);
            fc = f(c)?;
        } else {
            a = c;
            c = d;
            fc = fd;
            d = a + inv_phi * (b - a);
            fd = f(d)?;
        }
    }

    Ok(if fc >= fd { (c, fc) } else { (d, fd) })
}

impl BudgetStrategy {
    pub fn new(platforms: PlatformTable) -> Self {
        Self {
            platforms,
            confidence: ConfidenceProfile::new(
                vec![
                    SampleTier::new(30, 0.9),
                    SampleTier::new(14, 0.75),
                    SampleTier::new(7, 0.6),
                ],
                0.4,
            ),
        }
    }

    fn seasonality(today: NaiveDate) -> f64 {
        WEEKDAY_SEASONALITY[today.weekday().num_days_from_monday() as usize]
    }

    /// Spend-weighted ROI across platforms, scaled by platform efficiency.
    fn platform_performance(&self, history: &[HistoricalRecord]) -> f64 {
        let mut by_platform: BTreeMap<&str, (Vec<f64>, f64)> = BTreeMap::new();
        for record in history {
            if let Some(platform) = record.platform.as_deref() {
                let entry = by_platform.entry(platform).or_default();
                entry.0.push(record.roas());
                entry.1 += record.spend;
            }
        }

        let mut total_performance = 0.0;
        let mut total_spend = 0.0;
        for (platform, (rois, spend)) in &by_platform {
            let efficiency = self.platforms.get(platform).budget_efficiency;
            total_performance += mean(rois) * efficiency * spend;
            total_spend += spend;
        }

        if total_spend > 0.0 { total_performance / total_spend } else { 1.0 }
    }

    fn features_for(
        &self,
        spend: f64,
        revenue: f64,
        history: &[HistoricalRecord],
        today: NaiveDate,
    ) -> FeatureVector {
        let current_roi = ratio(revenue, spend);
        let seasonality = Self::seasonality(today);

        if history.len() < MIN_HISTORY {
            return FeatureVector::defaults(
                vec![spend, revenue, current_roi, 1.0, 0.0, seasonality, 1.0, history.len() as f64, 0.0, 0.0],
                history.len(),
                MIN_HISTORY,
            );
        }

        let rois = DataProcessor::series(history, Metric::Roas);
        let avg_roi = mean(&rois);
        let efficiency = if avg_roi > 0.0 { current_roi / avg_roi } else { 1.0 };
        let recent = tail(&rois, TREND_WINDOW);
        let roi_trend = if recent.len() >= 3 { normalized_slope(recent) } else { 0.0 };

        FeatureVector::from_history(
            vec![
                spend,
                revenue,
                current_roi,
                efficiency,
                roi_trend,
                seasonality,
                self.platform_performance(history),
                history.len() as f64,
                sample_variance(&DataProcessor::series(history, Metric::Spend)),
                sample_variance(&rois),
            ],
            history.len(),
        )
    }

    fn risk_level(change_percent: f64, confidence: f64) -> RiskLevel {
        if change_percent > 0.5 || confidence < 0.5 {
            RiskLevel::High
        } else if change_percent > 0.25 || confidence < 0.7 {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }

    fn explanation(change_percent: f64, current_roi: f64, expected_roi: f64) -> String {
        let pct = (change_percent.abs() * 100.0).round();
        if change_percent > 0.1 {
            format!(
                "Increasing budget by {:.0}% should improve ROI from {:.1}x to {:.1}x based on performance curves.",
                pct, current_roi, expected_roi
            )
        } else if change_percent < -0.1 {
            format!(
                "Reducing budget by {:.0}% should improve efficiency. Current spend may be hitting diminishing returns.",
                pct
            )
        } else {
            format!(
                "Current budget is near optimal. Minor adjustment of {:.0}% recommended for fine-tuning.",
                (change_percent * 100.0).round()
            )
        }
    }

    fn actions(budget_change: f64, revenue_increase: f64, risk: RiskLevel) -> Vec<String> {
        let mut actions = Vec::new();

        if budget_change.abs() < 50.0 {
            actions.push("Current budget is well-optimized".to_string());
            actions.push("Monitor performance and make minor adjustments".to_string());
        } else if budget_change > 0.0 {
            if risk == RiskLevel::High {
                actions.push(format!(
                    "CAUTION: Large budget increase recommended (+${:.0})",
                    budget_change
                ));
                actions.push("Test increase gradually in 25% increments".to_string());
                actions.push("Monitor ROI closely for first 7 days".to_string());
                actions.push("Have rollback plan ready".to_string());
            } else {
                actions.push(format!("Increase budget by ${:.0}", budget_change));
                actions.push(format!(
                    "Expected revenue increase: {:.0}%",
                    revenue_increase * 100.0
                ));
                actions.push("Monitor performance over next 3-5 days".to_string());
                actions.push("Scale further if results are positive".to_string());
            }
        } else {
            actions.push(format!("Reduce budget by ${:.0}", budget_change.abs()));
            actions.push("Hitting diminishing returns at current spend level".to_string());
            actions.push("Focus on improving creative performance".to_string());
            actions.push("Reallocate savings to testing new audiences".to_string());
        }

        actions.push("Review performance by platform and time of day".to_string());
        actions.push("Consider dayparting optimizations".to_string());
        actions.push("Test budget allocation across different campaigns".to_string());
        actions
    }

    fn opportunities(
        &self,
        spend: f64,
        budget_change: f64,
        revenue_increase: f64,
        roi_trend: f64,
        history: &[HistoricalRecord],
    ) -> Vec<Opportunity> {
        let mut opportunities = Vec::new();
        let change_percent = ratio(budget_change.abs(), spend);

        if budget_change > 0.0 && revenue_increase > 0.0 {
            opportunities.push(Opportunity::new(
                "Scale Budget",
                "spend",
                revenue_increase,
                Difficulty::from_impact(change_percent),
                format!("Raise spend by ${:.0} while returns hold", budget_change),
            ));
        } else if budget_change < 0.0 {
            opportunities.push(Opportunity::new(
                "Trim Spend",
                "spend",
                change_percent,
                Difficulty::Easy,
                format!("Cut ${:.0} of spend that is past the point of diminishing returns", budget_change.abs()),
            ));
        }

        if roi_trend < -0.01 {
            let impact = (roi_trend.abs() * 7.0).min(1.0);
            opportunities.push(Opportunity::new(
                "Refresh Creative",
                "roi",
                impact,
                Difficulty::from_impact(impact),
                format!(
                    "ROI is falling {:.1}% per day; rotate creatives before scaling",
                    roi_trend.abs() * 100.0
                ),
            ));
        }

        let mut platform_roas: BTreeMap<&str, (f64, f64)> = BTreeMap::new();
        for record in history {
            if let Some(platform) = record.platform.as_deref() {
                let entry = platform_roas.entry(platform).or_default();
                entry.0 += record.revenue;
                entry.1 += record.spend;
            }
        }
        let ranked: Vec<(&str, f64)> = platform_roas
            .iter()
            .filter(|(_, (_, spent))| *spent > 0.0)
            .map(|(platform, (revenue, spent))| (*platform, revenue / spent))
            .collect();
        let best = ranked.iter().copied().max_by(|a, b| a.1.total_cmp(&b.1));
        let worst = ranked.iter().copied().min_by(|a, b| a.1.total_cmp(&b.1));
        if let (Some(best), Some(worst)) = (best, worst) {
            if best.0 != worst.0 && best.1 > 0.0 {
                let impact = (best.1 - worst.1) / best.1;
                opportunities.push(Opportunity::new(
                    "Rebalance Platforms",
                    "roas",
                    impact,
                    Difficulty::from_impact(impact),
                    format!(
                        "Shift budget from {} ({:.1}x) to {} ({:.1}x)",
                        worst.0, worst.1, best.0, best.1
                    ),
                ));
            }
        }

        opportunities.push(Opportunity::new(
            "Dayparting",
            "spend",
            0.05,
            Difficulty::Easy,
            "Concentrate spend in the hours and weekdays that convert best",
        ));

        opportunities
    }

    fn build(
        &self,
        input: &BudgetRequest,
        features: &FeatureVector,
        optimal_spend: f64,
        expected_revenue: f64,
        confidence: f64,
    ) -> Forecast<BudgetForecast> {
        let spend = input.current_spend.max(0.0);
        let revenue = input.current_revenue.max(0.0);
        let current_roi = ratio(revenue, spend);
        let expected_roi = ratio(expected_revenue, optimal_spend);

        let budget_change = optimal_spend - spend;
        let revenue_increase = ratio(expected_revenue - revenue, revenue);
        let change_percent = ratio(budget_change, spend);
        let risk_level = Self::risk_level(change_percent.abs(), confidence);

        let history = DataProcessor::normalize_history(&input.historical_performance);
        let (top_opportunity, opportunities) = rank_opportunities(self.opportunities(
            spend,
            budget_change,
            revenue_increase,
            features.get(4),
            &history,
        ));

        Forecast::new(
            BudgetForecast {
                current_spend: spend,
                optimal_spend,
                budget_change,
                current_revenue: revenue,
                expected_revenue,
                revenue_increase,
                current_roi,
                expected_roi,
                risk_level,
                top_opportunity,
                opportunities,
            },
            confidence,
            Self::explanation(change_percent, current_roi, expected_roi),
            Self::actions(budget_change, revenue_increase, risk_level),
        )
    }
}

impl ForecastStrategy for BudgetStrategy {
    type Input = BudgetRequest;
    type Output = BudgetForecast;
    type Model = ForestModel;
    type Sample = BudgetSample;
    type Row = LabeledRow;

    const NAME: &'static str = "budget_optimizer";
    const MIN_TRAINING_SAMPLES: usize = 20;

    fn feature_names(&self) -> &'static [&'static str] {
        BUDGET_FEATURES
    }

    fn subject(&self, input: &BudgetRequest) -> String {
        if input.merchant_id.is_empty() {
            format!("spend={}", input.current_spend)
        } else {
            input.merchant_id.clone()
        }
    }

    fn extract_features(&self, input: &BudgetRequest, ctx: &PredictContext) -> Result<FeatureVector, PredictionError> {
        let history = DataProcessor::normalize_history(&input.historical_performance);
        Ok(self.features_for(
            input.current_spend.max(0.0),
            input.current_revenue.max(0.0),
            &history,
            ctx.today(),
        ))
    }

    fn rule_based(
        &self,
        input: &BudgetRequest,
        features: &FeatureVector,
        _ctx: &PredictContext,
    ) -> Result<Forecast<BudgetForecast>, PredictionError> {
        let spend = input.current_spend.max(0.0);
        let current_roi = ratio(input.current_revenue.max(0.0), spend);

        let multiplier = if current_roi > 3.0 {
            1.4
        } else if current_roi > 2.0 {
            1.2
        } else if current_roi > 1.0 {
            1.1
        } else {
            0.9
        };

        let mut optimal_spend = spend * multiplier;
        if let Some(constraints) = &input.constraints {
            if let Some(min) = constraints.min_spend {
                optimal_spend = optimal_spend.max(min);
            }
            if let Some(max) = constraints.max_spend {
                optimal_spend = optimal_spend.min(max);
            }
        }

        // Slight diminishing returns at the new level
        let expected_roi = current_roi * 0.95;
        Ok(self.build(input, features, optimal_spend, expected_roi * optimal_spend, RULE_CONFIDENCE))
    }

    fn trained(
        &self,
        model: &ForestModel,
        input: &BudgetRequest,
        features: &FeatureVector,
        _ctx: &PredictContext,
    ) -> Result<Forecast<BudgetForecast>, PredictionError> {
        let spend = input.current_spend.max(0.0);
        let constraints = input.constraints.unwrap_or_default();
        let lo = constraints.min_spend.unwrap_or(spend * 0.5).max(0.0);
        let hi = constraints.max_spend.unwrap_or(spend * 3.0).max(lo);

        let mut candidate = features.values.clone();
        let (optimal_spend, expected_roi) = golden_section_max(lo, hi, |level| {
            candidate[0] = level;
            model.predict(&candidate)
        })?;
        let expected_roi = expected_roi.max(0.0);

        let history = DataProcessor::normalize_history(&input.historical_performance);
        let variance_metric = if history.len() >= MIN_HISTORY {
            let spend_variance = sample_variance(&DataProcessor::series(&history, Metric::Spend));
            if spend_variance > 0.0 {
                sample_variance(&DataProcessor::series(&history, Metric::Revenue)) / spend_variance
            } else {
                1.0
            }
        } else {
            0.0
        };
        let confidence = self.confidence.score(history.len(), variance_metric, 1.0);

        Ok(self.build(input, features, optimal_spend, expected_roi * optimal_spend, confidence))
    }

    fn fallback(&self, input: &BudgetRequest) -> Forecast<BudgetForecast> {
        let spend = input.current_spend.max(0.0);
        let revenue = input.current_revenue.max(0.0);
        let current_roi = ratio(revenue, spend);

        Forecast::new(
            BudgetForecast {
                current_spend: spend,
                optimal_spend: spend * 1.1,
                budget_change: spend * 0.1,
                current_revenue: revenue,
                expected_revenue: revenue * 1.05,
                revenue_increase: 0.05,
                current_roi,
                expected_roi: current_roi * 0.95,
                risk_level: RiskLevel::Medium,
                top_opportunity: None,
                opportunities: vec![],
            },
            0.3,
            "Limited data available. Using conservative optimization strategy.",
            vec![
                "Collect more performance data for better optimization".to_string(),
                "Test small budget increases gradually".to_string(),
                "Monitor ROI closely".to_string(),
            ],
        )
    }

    fn prepare_training(&self, samples: &[BudgetSample], ctx: &PredictContext) -> TrainingSet<LabeledRow> {
        samples
            .iter()
            .map(|sample| {
                if !sample.roi.is_finite() {
                    return None;
                }
                let history = DataProcessor::normalize_history(&sample.historical_data);
                let features = self.features_for(sample.spend.max(0.0), sample.revenue.max(0.0), &history, ctx.today());
                features
                    .values
                    .iter()
                    .all(|v| v.is_finite())
                    .then_some((features.values, sample.roi))
            })
            .collect()
    }

    fn fit(&self, rows: &[LabeledRow], params: &ForestParams) -> Result<(ForestModel, BTreeMap<String, f64>), TrainingError> {
        fit_regressor(Self::NAME, rows, params)
    }
}
