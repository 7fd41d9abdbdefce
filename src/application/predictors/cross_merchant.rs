//! Cross-merchant benchmarking: where a merchant stands against its peers.
//!
//! The rule-based tier compares against the built-in archetype baselines. A
//! trained [`PeerBaseline`] replaces those averages with statistics fitted from
//! real peer profiles.

use crate::application::analytics::statistics::{coefficient_of_variation, mean};
use crate::application::ml::{ForecastStrategy, ForestParams, PredictContext, TieredPredictor, TrainingSet};
use crate::application::predictors::title_case;
use crate::domain::confidence::{ConfidenceProfile, SampleTier};
use crate::domain::errors::{FailureStage, PredictionError, TrainingError};
use crate::domain::lookup::{ArchetypeProfile, ArchetypeTable, BaselineMetrics, BenchmarkGrades};
use crate::domain::ml::FeatureVector;
use crate::domain::ml::feature_registry::MERCHANT_PROFILE_FEATURES;
use crate::domain::opportunity::{Difficulty, Opportunity, rank_opportunities};
use crate::domain::prediction::Forecast;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const RULE_CONFIDENCE: f64 = 0.6;
const BENCHMARK_METRICS: [&str; 5] = ["conversion_rate", "aov", "customer_retention", "roas", "lifetime_value"];
const COMPLETENESS_FIELDS: usize = 4;

pub type CrossMerchantPredictor = TieredPredictor<CrossMerchantStrategy>;

/// A merchant's business metrics. Any field may be missing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MerchantProfile {
    #[serde(default)]
    pub merchant_id: Option<String>,
    #[serde(default)]
    pub monthly_orders: Option<f64>,
    #[serde(default, alias = "aov")]
    pub avg_order_value: Option<f64>,
    #[serde(default)]
    pub profit_margin: Option<f64>,
    #[serde(default)]
    pub conversion_rate: Option<f64>,
    #[serde(default)]
    pub customer_retention: Option<f64>,
    #[serde(default)]
    pub roas: Option<f64>,
    #[serde(default)]
    pub lifetime_value: Option<f64>,
}

impl MerchantProfile {
    pub fn metric(&self, name: &str) -> Option<f64> {
        let value = match name {
            "monthly_orders" => self.monthly_orders,
            "aov" | "avg_order_value" => self.avg_order_value,
            "profit_margin" => self.profit_margin,
            "conversion_rate" => self.conversion_rate,
            "customer_retention" => self.customer_retention,
            "roas" => self.roas,
            "lifetime_value" => self.lifetime_value,
            _ => None,
        }?;
        value.is_finite().then_some(value)
    }

    fn archetype_in<'a>(&self, table: &'a ArchetypeTable) -> &'a str {
        table.classify(
            self.metric("monthly_orders"),
            self.metric("avg_order_value"),
            self.metric("profit_margin"),
        )
    }

    fn completeness(&self) -> f64 {
        let present = ["monthly_orders", "avg_order_value", "conversion_rate", "roas"]
            .iter()
            .filter(|field| self.metric(field).is_some())
            .count();
        present as f64 / COMPLETENESS_FIELDS as f64
    }
}

fn baseline_value(baseline: &BaselineMetrics, metric: &str) -> Option<f64> {
    match metric {
        "conversion_rate" => Some(baseline.conversion_rate),
        "aov" | "avg_order_value" => Some(baseline.aov),
        "customer_retention" => Some(baseline.customer_retention),
        "roas" => Some(baseline.roas),
        "lifetime_value" => Some(baseline.lifetime_value),
        _ => None,
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InsightsRequest {
    #[serde(default)]
    pub merchant_profile: MerchantProfile,
    /// Metrics to benchmark; empty means all of them.
    #[serde(default)]
    pub benchmark_categories: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PerformanceLevel {
    Excellent,
    Good,
    Average,
    BelowAverage,
}

impl PerformanceLevel {
    pub fn from_ratio(ratio: f64) -> Self {
        if ratio >= 1.2 {
            PerformanceLevel::Excellent
        } else if ratio >= 1.1 {
            PerformanceLevel::Good
        } else if ratio >= 0.9 {
            PerformanceLevel::Average
        } else {
            PerformanceLevel::BelowAverage
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BenchmarkResult {
    pub current_value: f64,
    pub benchmark_value: f64,
    pub performance_ratio: f64,
    pub performance_level: PerformanceLevel,
    pub gap_description: String,
    pub improvement_potential: f64,
}

impl BenchmarkResult {
    fn new(current_value: f64, benchmark_value: f64) -> Self {
        let ratio = current_value / benchmark_value;
        let level = PerformanceLevel::from_ratio(ratio);
        let gap_description = match level {
            PerformanceLevel::Excellent | PerformanceLevel::Good => {
                format!("+{:.0}% above average", (ratio - 1.0) * 100.0)
            }
            PerformanceLevel::Average => "near average".to_string(),
            PerformanceLevel::BelowAverage => format!("{:.0}% below average", (1.0 - ratio) * 100.0),
        };

        Self {
            current_value,
            benchmark_value,
            performance_ratio: ratio,
            performance_level: level,
            gap_description,
            improvement_potential: (benchmark_value - current_value).max(0.0),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MerchantInsights {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub merchant_id: Option<String>,
    pub merchant_archetype: String,
    pub similar_merchants_count: usize,
    pub benchmark_results: BTreeMap<String, BenchmarkResult>,
    pub opportunities: Vec<Opportunity>,
    pub top_opportunity: Opportunity,
    pub opportunity_metric: String,
}

/// Peer statistics for one archetype.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeerStats {
    pub merchant_count: usize,
    /// Mean of every benchmark metric at least one peer reported.
    pub averages: BTreeMap<String, f64>,
    /// Mean coefficient of variation across the reported metrics.
    pub dispersion: f64,
}

/// Benchmarks fitted from real peer profiles, keyed by archetype.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PeerBaseline {
    pub archetypes: BTreeMap<String, PeerStats>,
}

/// One classified peer: archetype plus its benchmark metrics.
pub type PeerRow = (String, [Option<f64>; 5]);

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BenchmarkReport {
    pub archetype: String,
    pub merchant_count: usize,
    pub characteristics: Vec<String>,
    pub average_metrics: BTreeMap<String, f64>,
    pub benchmarks: BTreeMap<String, BenchmarkGrades>,
}

/// Where the comparison numbers for one archetype come from.
struct Peers<'a> {
    merchant_count: usize,
    averages: BTreeMap<String, f64>,
    profile: &'a ArchetypeProfile,
}

pub struct CrossMerchantStrategy {
    archetypes: ArchetypeTable,
    confidence: ConfidenceProfile,
}

impl Default for CrossMerchantStrategy {
    fn default() -> Self {
        Self::new(ArchetypeTable::default())
    }
}

impl CrossMerchantStrategy {
    pub fn new(archetypes: ArchetypeTable) -> Self {
        Self {
            archetypes,
            confidence: ConfidenceProfile::new(
                vec![
                    SampleTier::new(8, 0.9),
                    SampleTier::new(5, 0.8),
                    SampleTier::new(3, 0.7),
                ],
                0.6,
            ),
        }
    }

    fn profile(&self, archetype: &str) -> Result<&ArchetypeProfile, PredictionError> {
        self.archetypes.get(archetype).ok_or_else(|| {
            PredictionError::failure(
                FailureStage::RuleEvaluation,
                format!("archetype {} has no profile", archetype),
            )
        })
    }

    fn built_in_peers<'a>(profile: &'a ArchetypeProfile) -> Peers<'a> {
        let averages = BENCHMARK_METRICS
            .iter()
            .filter_map(|metric| baseline_value(&profile.baseline, metric).map(|v| (metric.to_string(), v)))
            .collect();
        Peers {
            merchant_count: profile.baseline.merchant_count,
            averages,
            profile,
        }
    }

    /// Fitted statistics where available, built-in averages for the rest.
    fn fitted_peers<'a>(profile: &'a ArchetypeProfile, stats: Option<&PeerStats>) -> Peers<'a> {
        let mut peers = Self::built_in_peers(profile);
        if let Some(stats) = stats {
            peers.merchant_count = stats.merchant_count;
            for (metric, value) in &stats.averages {
                peers.averages.insert(metric.clone(), *value);
            }
        }
        peers
    }

    fn categories(request: &InsightsRequest) -> Vec<String> {
        if request.benchmark_categories.is_empty() {
            BENCHMARK_METRICS.iter().map(|m| m.to_string()).collect()
        } else {
            request.benchmark_categories.clone()
        }
    }

    fn benchmark(request: &InsightsRequest, peers: &Peers) -> BTreeMap<String, BenchmarkResult> {
        let profile = &request.merchant_profile;
        Self::categories(request)
            .into_iter()
            .filter_map(|category| {
                let current = profile.metric(&category)?;
                let benchmark = *peers.averages.get(&category)?;
                (benchmark > 0.0).then(|| (category, BenchmarkResult::new(current, benchmark)))
            })
            .collect()
    }

    fn description(metric: &str, impact: f64) -> String {
        let percent = impact * 100.0;
        match metric {
            "conversion_rate" => format!(
                "Optimize checkout flow and product pages to increase conversions by {:.0}%",
                percent
            ),
            "roas" => format!(
                "Improve ad targeting and creative performance to boost ROAS by {:.0}%",
                percent
            ),
            "customer_retention" => format!(
                "Implement retention campaigns to improve repeat purchase rate by {:.0}%",
                percent
            ),
            "aov" | "avg_order_value" => format!(
                "Use upselling and bundling strategies to increase AOV by {:.0}%",
                percent
            ),
            "lifetime_value" => format!(
                "Focus on customer experience and retention to grow LTV by {:.0}%",
                percent
            ),
            other => format!("Improve {} by {:.0}% through strategic optimization", other, percent),
        }
    }

    fn opportunities(results: &BTreeMap<String, BenchmarkResult>) -> Vec<Opportunity> {
        results
            .iter()
            .filter(|(_, result)| {
                matches!(
                    result.performance_level,
                    PerformanceLevel::Average | PerformanceLevel::BelowAverage
                )
            })
            .filter(|(_, result)| result.improvement_potential > 0.0 && result.current_value > 0.0)
            .map(|(metric, result)| {
                let impact = result.improvement_potential / result.current_value;
                Opportunity::new(
                    format!("Improve {}", title_case(metric)),
                    metric.clone(),
                    impact,
                    Difficulty::from_impact(impact),
                    Self::description(metric, impact),
                )
            })
            .collect()
    }

    fn data_collection(impact: f64) -> Opportunity {
        Opportunity::new(
            "Data Collection",
            "analytics",
            impact,
            Difficulty::Easy,
            "Focus on collecting more performance data for better insights",
        )
    }

    fn explanation(
        description: &str,
        results: &BTreeMap<String, BenchmarkResult>,
        top: &Opportunity,
    ) -> String {
        let worst = results
            .iter()
            .filter(|(_, result)| result.performance_ratio < 1.0)
            .map(|(metric, result)| (metric, 1.0 - result.performance_ratio))
            .fold(None::<(&String, f64)>, |worst, candidate| match worst {
                Some(current) if current.1 >= candidate.1 => Some(current),
                _ => Some(candidate),
            });

        match worst {
            Some((metric, gap)) => format!(
                "Compared to {} businesses, your {} is {:.0}% below average. {}",
                description,
                metric.replace('_', " "),
                gap * 100.0,
                top.description
            ),
            None => format!(
                "Your {} business is performing well across key metrics. Focus on {} for continued growth.",
                description,
                top.name.to_lowercase()
            ),
        }
    }

    fn actions(opportunities: &[Opportunity], profile: &ArchetypeProfile) -> Vec<String> {
        let mut actions: Vec<String> = opportunities
            .iter()
            .take(3)
            .map(|opportunity| {
                let prefix = if opportunity.difficulty == Difficulty::Easy {
                    "QUICK WIN: "
                } else if opportunity.impact > 0.3 {
                    "HIGH IMPACT: "
                } else {
                    ""
                };
                format!("{}{}", prefix, opportunity.description)
            })
            .collect();
        actions.extend(profile.actions.iter().take(2).cloned());
        actions
    }

    fn insights(
        &self,
        request: &InsightsRequest,
        archetype: &str,
        peers: &Peers,
        confidence: f64,
    ) -> Forecast<MerchantInsights> {
        let results = Self::benchmark(request, peers);
        let (top, opportunities) = rank_opportunities(Self::opportunities(&results));
        let top = top.unwrap_or_else(|| Self::data_collection(0.1));

        let explanation = Self::explanation(&peers.profile.description, &results, &top);
        let actions = Self::actions(&opportunities, peers.profile);

        Forecast::new(
            MerchantInsights {
                merchant_id: request.merchant_profile.merchant_id.clone(),
                merchant_archetype: archetype.to_string(),
                similar_merchants_count: peers.merchant_count,
                benchmark_results: results,
                opportunity_metric: format!("+{:.0}% {}", top.impact * 100.0, top.metric),
                top_opportunity: top,
                opportunities,
            },
            confidence,
            explanation,
            actions,
        )
    }

    /// Peer averages and grading thresholds for one archetype.
    pub fn benchmark_report(&self, archetype: &str, fitted: Option<&PeerBaseline>) -> Option<BenchmarkReport> {
        let profile = self.archetypes.get(archetype)?;
        let peers = Self::fitted_peers(profile, fitted.and_then(|b| b.archetypes.get(archetype)));

        let benchmarks = self
            .archetypes
            .grades
            .iter()
            .filter(|(metric, _)| peers.averages.contains_key(metric.as_str()))
            .map(|(metric, grades)| (metric.clone(), grades.clone()))
            .collect();

        Some(BenchmarkReport {
            archetype: archetype.to_string(),
            merchant_count: peers.merchant_count,
            characteristics: profile.characteristics.clone(),
            average_metrics: peers.averages,
            benchmarks,
        })
    }
}

impl ForecastStrategy for CrossMerchantStrategy {
    type Input = InsightsRequest;
    type Output = MerchantInsights;
    type Model = PeerBaseline;
    type Sample = MerchantProfile;
    type Row = PeerRow;

    const NAME: &'static str = "cross_merchant";
    const MIN_TRAINING_SAMPLES: usize = 25;

    fn feature_names(&self) -> &'static [&'static str] {
        MERCHANT_PROFILE_FEATURES
    }

    fn subject(&self, input: &InsightsRequest) -> String {
        input
            .merchant_profile
            .merchant_id
            .clone()
            .unwrap_or_else(|| "unknown".to_string())
    }

    fn extract_features(&self, input: &InsightsRequest, _ctx: &PredictContext) -> Result<FeatureVector, PredictionError> {
        let profile = &input.merchant_profile;
        let present = MERCHANT_PROFILE_FEATURES
            .iter()
            .filter(|name| profile.metric(name).is_some())
            .count();
        let values = MERCHANT_PROFILE_FEATURES
            .iter()
            .map(|name| profile.metric(name).unwrap_or(0.0))
            .collect();
        Ok(FeatureVector::from_history(values, present))
    }

    fn rule_based(
        &self,
        input: &InsightsRequest,
        _features: &FeatureVector,
        _ctx: &PredictContext,
    ) -> Result<Forecast<MerchantInsights>, PredictionError> {
        let archetype = input.merchant_profile.archetype_in(&self.archetypes);
        let profile = self.profile(archetype)?;
        let peers = Self::built_in_peers(profile);
        Ok(self.insights(input, archetype, &peers, RULE_CONFIDENCE))
    }

    fn trained(
        &self,
        model: &PeerBaseline,
        input: &InsightsRequest,
        _features: &FeatureVector,
        _ctx: &PredictContext,
    ) -> Result<Forecast<MerchantInsights>, PredictionError> {
        let archetype = input.merchant_profile.archetype_in(&self.archetypes);
        let profile = self.profile(archetype)?;
        let stats = model.archetypes.get(archetype);
        let peers = Self::fitted_peers(profile, stats);

        let dispersion = stats.map(|s| s.dispersion).unwrap_or(0.0);
        let multiplier = input.merchant_profile.completeness() * profile.confidence_multiplier;
        let confidence = self.confidence.score(peers.merchant_count, dispersion, multiplier);

        Ok(self.insights(input, archetype, &peers, confidence))
    }

    fn fallback(&self, input: &InsightsRequest) -> Forecast<MerchantInsights> {
        Forecast::new(
            MerchantInsights {
                merchant_id: input.merchant_profile.merchant_id.clone(),
                merchant_archetype: "unknown".to_string(),
                similar_merchants_count: 0,
                benchmark_results: BTreeMap::new(),
                opportunities: Vec::new(),
                top_opportunity: Self::data_collection(0.15),
                opportunity_metric: "+15% analytics improvement".to_string(),
            },
            0.3,
            "Limited data available for merchant comparison. Focus on data collection and baseline establishment.",
            vec![
                "Implement comprehensive analytics tracking".to_string(),
                "Collect customer behavior data".to_string(),
                "Establish performance baselines".to_string(),
                "Connect all marketing channels for data integration".to_string(),
            ],
        )
    }

    fn prepare_training(&self, samples: &[MerchantProfile], _ctx: &PredictContext) -> TrainingSet<PeerRow> {
        samples
            .iter()
            .map(|peer| {
                let metrics = BENCHMARK_METRICS.map(|metric| peer.metric(metric).filter(|v| *v >= 0.0));
                if metrics.iter().all(Option::is_none) {
                    return None;
                }
                Some((peer.archetype_in(&self.archetypes).to_string(), metrics))
            })
            .collect()
    }

    fn fit(&self, rows: &[PeerRow], _params: &ForestParams) -> Result<(PeerBaseline, BTreeMap<String, f64>), TrainingError> {
        let mut grouped: BTreeMap<&str, Vec<&[Option<f64>; 5]>> = BTreeMap::new();
        for (archetype, metrics) in rows {
            grouped.entry(archetype.as_str()).or_default().push(metrics);
        }

        let mut baseline = PeerBaseline::default();
        for (archetype, peers) in grouped {
            let mut averages = BTreeMap::new();
            let mut variations = Vec::new();
            for (index, metric) in BENCHMARK_METRICS.iter().enumerate() {
                let values: Vec<f64> = peers.iter().filter_map(|m| m[index]).collect();
                if values.is_empty() {
                    continue;
                }
                averages.insert(metric.to_string(), mean(&values));
                if let Some(cv) = coefficient_of_variation(&values) {
                    variations.push(cv);
                }
            }
            baseline.archetypes.insert(
                archetype.to_string(),
                PeerStats {
                    merchant_count: peers.len(),
                    averages,
                    dispersion: mean(&variations),
                },
            );
        }

        if baseline.archetypes.is_empty() {
            return Err(TrainingError::Failed {
                predictor: Self::NAME.to_string(),
                reason: "no peer metrics to aggregate".to_string(),
            });
        }

        let mut metrics = BTreeMap::new();
        metrics.insert("archetypes".to_string(), baseline.archetypes.len() as f64);
        metrics.insert("peers".to_string(), rows.len() as f64);
        let mean_dispersion: Vec<f64> = baseline.archetypes.values().map(|s| s.dispersion).collect();
        metrics.insert("mean_dispersion".to_string(), mean(&mean_dispersion));
        Ok((baseline, metrics))
    }
}

impl CrossMerchantPredictor {
    /// Benchmark report for `archetype`, using fitted peers once trained.
    pub fn get_benchmark_report(&self, archetype: &str) -> Option<BenchmarkReport> {
        let fitted = self.state().artifact().map(|artifact| &artifact.model);
        self.strategy().benchmark_report(archetype, fitted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::prediction::PredictionTier;
    use crate::infrastructure::clock::FixedClock;
    use crate::infrastructure::persistence::InMemoryArtifactStore;
    use chrono::NaiveDate;
    use std::sync::Arc;

    fn predictor() -> CrossMerchantPredictor {
        TieredPredictor::new(
            CrossMerchantStrategy::default(),
            Arc::new(InMemoryArtifactStore::new()),
            Arc::new(FixedClock::at_date(NaiveDate::from_ymd_opt(2024, 6, 1).unwrap())),
        )
    }

    fn mid_market_merchant() -> InsightsRequest {
        InsightsRequest {
            merchant_profile: MerchantProfile {
                merchant_id: Some("m-7".to_string()),
                monthly_orders: Some(300.0),
                avg_order_value: Some(60.0),
                profit_margin: Some(0.2),
                conversion_rate: Some(0.02),
                customer_retention: Some(0.33),
                roas: Some(3.6),
                lifetime_value: None,
            },
            benchmark_categories: vec![],
        }
    }

    fn peer(conversion: f64) -> MerchantProfile {
        MerchantProfile {
            monthly_orders: Some(400.0),
            avg_order_value: Some(90.0),
            profit_margin: Some(0.25),
            conversion_rate: Some(conversion),
            ..Default::default()
        }
    }

    #[test]
    fn test_empty_profile_is_mid_market() {
        let prediction = predictor().predict(&InsightsRequest::default());

        assert_eq!(prediction.tier, PredictionTier::RuleBased);
        assert_eq!(prediction.value.merchant_archetype, "mid_market");
        assert!(prediction.value.benchmark_results.is_empty());
        assert_eq!(prediction.value.top_opportunity.name, "Data Collection");
        assert_eq!(
            prediction.explanation,
            "Your balanced growth-oriented business is performing well across key metrics. Focus on data collection for continued growth."
        );
        assert_eq!(prediction.actions.len(), 2);
    }

    #[test]
    fn test_benchmarks_and_opportunities() {
        let prediction = predictor().predict(&mid_market_merchant());
        let insights = &prediction.value;

        assert_eq!(insights.merchant_archetype, "mid_market");
        assert_eq!(insights.similar_merchants_count, 25);
        assert_eq!(prediction.confidence, 0.6);

        let results = &insights.benchmark_results;
        assert_eq!(results.len(), 4);
        assert_eq!(results["roas"].performance_level, PerformanceLevel::Excellent);
        assert_eq!(results["roas"].gap_description, "+20% above average");
        assert_eq!(results["customer_retention"].performance_level, PerformanceLevel::Average);
        assert_eq!(results["aov"].performance_level, PerformanceLevel::BelowAverage);
        assert_eq!(results["conversion_rate"].gap_description, "33% below average");

        let names: Vec<_> = insights.opportunities.iter().map(|o| o.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["Improve Conversion Rate", "Improve Aov", "Improve Customer Retention"]
        );
        assert_eq!(insights.top_opportunity.name, "Improve Conversion Rate");
        assert_eq!(insights.opportunity_metric, "+50% conversion_rate");

        assert!(prediction.explanation.starts_with(
            "Compared to balanced growth-oriented businesses, your conversion rate is 33% below average."
        ));
        assert!(prediction.actions[0].starts_with("HIGH IMPACT: Optimize checkout flow"));
        assert!(prediction.actions[2].starts_with("QUICK WIN: Implement retention campaigns"));
        assert_eq!(prediction.actions.len(), 5);
    }

    #[test]
    fn test_requested_categories_limit_benchmarks() {
        let mut request = mid_market_merchant();
        request.benchmark_categories = vec!["roas".to_string(), "lifetime_value".to_string()];

        let prediction = predictor().predict(&request);
        let keys: Vec<_> = prediction.value.benchmark_results.keys().cloned().collect();
        assert_eq!(keys, vec!["roas".to_string()]);
    }

    #[test]
    fn test_aov_alias_deserializes() {
        let profile: MerchantProfile = serde_json::from_str(r#"{"aov": 120, "monthly_orders": 100}"#).unwrap();
        assert_eq!(profile.avg_order_value, Some(120.0));
        assert_eq!(profile.metric("aov"), Some(120.0));
    }

    #[test]
    fn test_trained_peers_replace_built_in_averages() {
        let mut predictor = predictor();
        let peers: Vec<MerchantProfile> = (0..30).map(|i| peer(0.04 + (i % 2) as f64 * 0.01)).collect();

        let report = predictor.train(&peers).unwrap();
        assert_eq!(report.training_samples, 30);
        assert_eq!(report.metrics["archetypes"], 1.0);

        let prediction = predictor.predict(&mid_market_merchant());
        assert_eq!(prediction.tier, PredictionTier::Trained);
        assert_eq!(prediction.value.similar_merchants_count, 30);
        let conversion = &prediction.value.benchmark_results["conversion_rate"];
        assert!((conversion.benchmark_value - 0.045).abs() < 1e-12);
        // Peers reported no ROAS, so the built-in average stays
        assert_eq!(prediction.value.benchmark_results["roas"].benchmark_value, 3.0);

        let fitted = predictor.get_benchmark_report("mid_market").unwrap();
        assert_eq!(fitted.merchant_count, 30);
        assert!(fitted.benchmarks.contains_key("conversion_rate"));
    }

    #[test]
    fn test_too_few_peers_is_rejected() {
        let mut predictor = predictor();
        let peers: Vec<MerchantProfile> = (0..10).map(|_| peer(0.04)).collect();
        assert!(matches!(
            predictor.train(&peers),
            Err(TrainingError::InsufficientData { samples: 10, required: 25 })
        ));
    }

    #[test]
    fn test_benchmark_report_for_unknown_archetype() {
        assert!(predictor().get_benchmark_report("galactic").is_none());
        let report = predictor().get_benchmark_report("premium_brand").unwrap();
        assert_eq!(report.merchant_count, 8);
        assert_eq!(report.average_metrics["aov"], 180.0);
        assert_eq!(report.benchmarks.len(), 4);
    }

    #[test]
    fn test_fallback_insights() {
        let forecast = CrossMerchantStrategy::default().fallback(&InsightsRequest::default());
        assert_eq!(forecast.value.merchant_archetype, "unknown");
        assert_eq!(forecast.value.top_opportunity.name, "Data Collection");
        assert_eq!(forecast.actions.len(), 4);
    }
}
