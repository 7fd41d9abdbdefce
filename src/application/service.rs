//! Service facade owning the five predictors.
//!
//! Built once from [`Config`] and [`LookupTables`]; every forecasting and
//! training entry point of the binaries goes through here.

use crate::application::predictors::budget_optimizer::BudgetSample;
use crate::application::predictors::creative_fatigue::CreativeFatigueSample;
use crate::application::predictors::cross_merchant::BenchmarkReport;
use crate::application::predictors::customer_purchase::PurchaseSample;
use crate::application::predictors::product_velocity::VelocitySample;
use crate::application::predictors::{
    BudgetForecast, BudgetOptimizer, BudgetRequest, BudgetStrategy, CreativeFatiguePredictor,
    CreativeFatigueRequest, CreativeFatigueStrategy, CrossMerchantPredictor, CrossMerchantStrategy,
    CustomerPurchasePredictor, CustomerPurchaseStrategy, FatigueForecast, InsightsRequest, MerchantInsights,
    MerchantProfile, ProductVelocityPredictor, ProductVelocityStrategy, PurchaseForecast, PurchaseRequest,
    VelocityForecast, VelocityRequest,
};
use crate::application::ml::{ForecastStrategy, ForestParams, TieredPredictor};
use crate::config::{Config, PredictionEnvConfig};
use crate::domain::errors::TrainingError;
use crate::domain::lookup::LookupTables;
use crate::domain::ml::TrainingReport;
use crate::domain::ports::{ArtifactStore, Clock};
use crate::domain::prediction::Prediction;
use crate::infrastructure::observability::Metrics;
use crate::infrastructure::{FileArtifactStore, SystemClock};
use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PredictorKind {
    CreativeFatigue,
    BudgetOptimizer,
    CustomerPurchase,
    ProductVelocity,
    CrossMerchant,
}

impl PredictorKind {
    pub const ALL: [PredictorKind; 5] = [
        PredictorKind::CreativeFatigue,
        PredictorKind::BudgetOptimizer,
        PredictorKind::CustomerPurchase,
        PredictorKind::ProductVelocity,
        PredictorKind::CrossMerchant,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PredictorKind::CreativeFatigue => CreativeFatigueStrategy::NAME,
            PredictorKind::BudgetOptimizer => BudgetStrategy::NAME,
            PredictorKind::CustomerPurchase => CustomerPurchaseStrategy::NAME,
            PredictorKind::ProductVelocity => ProductVelocityStrategy::NAME,
            PredictorKind::CrossMerchant => CrossMerchantStrategy::NAME,
        }
    }
}

impl fmt::Display for PredictorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PredictorKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "creative_fatigue" | "creative" => Ok(PredictorKind::CreativeFatigue),
            "budget_optimizer" | "budget_optimization" | "budget" => Ok(PredictorKind::BudgetOptimizer),
            "customer_purchase" | "customer_prediction" | "customer" => Ok(PredictorKind::CustomerPurchase),
            "product_velocity" | "velocity" => Ok(PredictorKind::ProductVelocity),
            "cross_merchant" | "insights" => Ok(PredictorKind::CrossMerchant),
            _ => anyhow::bail!(
                "Invalid predictor: {}. Must be one of creative_fatigue, budget_optimizer, customer_purchase, product_velocity, cross_merchant",
                s
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictorHealth {
    pub enabled: bool,
    pub ready: bool,
    pub state: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthReport {
    pub status: &'static str,
    pub timestamp: DateTime<Utc>,
    pub artifact_store: String,
    pub models_loaded: BTreeMap<&'static str, PredictorHealth>,
}

pub struct ForecastService {
    creative: CreativeFatiguePredictor,
    budget: BudgetOptimizer,
    customer: CustomerPurchasePredictor,
    velocity: ProductVelocityPredictor,
    merchant: CrossMerchantPredictor,
    settings: PredictionEnvConfig,
    store: Arc<dyn ArtifactStore>,
    clock: Arc<dyn Clock>,
    metrics: Option<Metrics>,
}

impl ForecastService {
    pub fn new(
        config: &Config,
        tables: LookupTables,
        store: Arc<dyn ArtifactStore>,
        clock: Arc<dyn Clock>,
        metrics: Option<Metrics>,
    ) -> Self {
        let params = config.model.forest_params();
        let LookupTables {
            platforms,
            categories,
            archetypes,
            segments,
        } = tables;

        let mut service = Self {
            creative: Self::build(CreativeFatigueStrategy::new(platforms.clone()), &store, &clock, &metrics, params),
            budget: Self::build(BudgetStrategy::new(platforms), &store, &clock, &metrics, params),
            customer: Self::build(CustomerPurchaseStrategy::new(segments), &store, &clock, &metrics, params),
            velocity: Self::build(ProductVelocityStrategy::new(categories), &store, &clock, &metrics, params),
            merchant: Self::build(CrossMerchantStrategy::new(archetypes), &store, &clock, &metrics, params),
            settings: config.prediction.clone(),
            store,
            clock,
            metrics,
        };

        if config.model.auto_load {
            service.ensure_ready();
        }
        service
    }

    /// Production wiring: file-backed artifacts, wall clock, optional metrics.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let tables = config.lookup_tables().context("Failed to load lookup tables")?;
        let metrics = if config.observability.metrics_enabled {
            Some(Metrics::new().context("Failed to create metrics registry")?)
        } else {
            None
        };
        let store: Arc<dyn ArtifactStore> = Arc::new(FileArtifactStore::new(&config.model.storage_path));

        info!(
            "ForecastService: artifacts at {}, metrics {}",
            store.describe(),
            if metrics.is_some() { "enabled" } else { "disabled" }
        );
        Ok(Self::new(config, tables, store, Arc::new(SystemClock), metrics))
    }

    fn build<S: ForecastStrategy>(
        strategy: S,
        store: &Arc<dyn ArtifactStore>,
        clock: &Arc<dyn Clock>,
        metrics: &Option<Metrics>,
        params: ForestParams,
    ) -> TieredPredictor<S> {
        let predictor = TieredPredictor::new(strategy, store.clone(), clock.clone()).with_params(params);
        match metrics {
            Some(metrics) => predictor.with_metrics(metrics.clone()),
            None => predictor,
        }
    }

    pub fn settings(&self) -> &PredictionEnvConfig {
        &self.settings
    }

    pub fn metrics(&self) -> Option<&Metrics> {
        self.metrics.as_ref()
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn is_enabled(&self, kind: PredictorKind) -> bool {
        match kind {
            PredictorKind::CreativeFatigue => self.settings.enable_creative_fatigue,
            PredictorKind::BudgetOptimizer => self.settings.enable_budget_optimization,
            PredictorKind::CustomerPurchase => self.settings.enable_customer_prediction,
            PredictorKind::ProductVelocity => self.settings.enable_product_velocity,
            PredictorKind::CrossMerchant => self.settings.enable_cross_merchant,
        }
    }

    fn is_ready(&self, kind: PredictorKind) -> bool {
        match kind {
            PredictorKind::CreativeFatigue => self.creative.is_ready(),
            PredictorKind::BudgetOptimizer => self.budget.is_ready(),
            PredictorKind::CustomerPurchase => self.customer.is_ready(),
            PredictorKind::ProductVelocity => self.velocity.is_ready(),
            PredictorKind::CrossMerchant => self.merchant.is_ready(),
        }
    }

    fn state_label(&self, kind: PredictorKind) -> &'static str {
        match kind {
            PredictorKind::CreativeFatigue => self.creative.state().label(),
            PredictorKind::BudgetOptimizer => self.budget.state().label(),
            PredictorKind::CustomerPurchase => self.customer.state().label(),
            PredictorKind::ProductVelocity => self.velocity.state().label(),
            PredictorKind::CrossMerchant => self.merchant.state().label(),
        }
    }

    /// Resolves every predictor's artifact once. Returns how many are ready.
    pub fn ensure_ready(&mut self) -> usize {
        let ready = [
            self.creative.ensure_ready(),
            self.budget.ensure_ready(),
            self.customer.ensure_ready(),
            self.velocity.ensure_ready(),
            self.merchant.ensure_ready(),
        ]
        .into_iter()
        .filter(|ready| *ready)
        .count();
        self.update_ready_gauge();
        ready
    }

    fn update_ready_gauge(&self) {
        if let Some(metrics) = &self.metrics {
            let ready = PredictorKind::ALL.iter().filter(|kind| self.is_ready(**kind)).count();
            metrics.set_models_ready(ready);
        }
    }

    pub fn health(&self) -> HealthReport {
        let models_loaded = PredictorKind::ALL
            .iter()
            .map(|kind| {
                (
                    kind.as_str(),
                    PredictorHealth {
                        enabled: self.is_enabled(*kind),
                        ready: self.is_ready(*kind),
                        state: self.state_label(*kind),
                    },
                )
            })
            .collect();

        HealthReport {
            status: "healthy",
            timestamp: self.clock.now(),
            artifact_store: self.store.describe(),
            models_loaded,
        }
    }

    pub fn predict_creative_fatigue(&self, request: &CreativeFatigueRequest) -> Prediction<FatigueForecast> {
        self.creative.predict(request)
    }

    pub fn optimize_budget(&self, request: &BudgetRequest) -> Prediction<BudgetForecast> {
        self.budget.predict(request)
    }

    pub fn predict_next_purchase(&self, request: &PurchaseRequest) -> Prediction<PurchaseForecast> {
        self.customer.predict(request)
    }

    pub fn predict_customers(&self, requests: &[PurchaseRequest]) -> Vec<Prediction<PurchaseForecast>> {
        self.customer.batch_predict(requests)
    }

    pub fn predict_velocity(&self, request: &VelocityRequest) -> Prediction<VelocityForecast> {
        self.velocity.predict(request)
    }

    pub fn predict_products(&self, requests: &[VelocityRequest]) -> Vec<Prediction<VelocityForecast>> {
        self.velocity.batch_predict(requests)
    }

    pub fn get_insights(&self, request: &InsightsRequest) -> Prediction<MerchantInsights> {
        self.merchant.predict(request)
    }

    pub fn benchmark_report(&self, archetype: &str) -> Option<BenchmarkReport> {
        self.merchant.get_benchmark_report(archetype)
    }

    pub fn train_creative_fatigue(&mut self, samples: &[CreativeFatigueSample]) -> Result<TrainingReport, TrainingError> {
        let report = self.creative.train(samples);
        self.update_ready_gauge();
        report
    }

    pub fn train_budget_optimizer(&mut self, samples: &[BudgetSample]) -> Result<TrainingReport, TrainingError> {
        let report = self.budget.train(samples);
        self.update_ready_gauge();
        report
    }

    pub fn train_customer_purchase(&mut self, samples: &[PurchaseSample]) -> Result<TrainingReport, TrainingError> {
        let report = self.customer.train(samples);
        self.update_ready_gauge();
        report
    }

    pub fn train_product_velocity(&mut self, samples: &[VelocitySample]) -> Result<TrainingReport, TrainingError> {
        let report = self.velocity.train(samples);
        self.update_ready_gauge();
        report
    }

    pub fn train_cross_merchant(&mut self, samples: &[MerchantProfile]) -> Result<TrainingReport, TrainingError> {
        let report = self.merchant.train(samples);
        self.update_ready_gauge();
        report
    }

    /// Trains `kind` from a JSON array of that predictor's samples.
    pub fn train_json(&mut self, kind: PredictorKind, samples: serde_json::Value) -> Result<TrainingReport, TrainingError> {
        match kind {
            PredictorKind::CreativeFatigue => {
                let samples: Vec<CreativeFatigueSample> = Self::samples(kind, samples)?;
                self.train_creative_fatigue(&samples)
            }
            PredictorKind::BudgetOptimizer => {
                let samples: Vec<BudgetSample> = Self::samples(kind, samples)?;
                self.train_budget_optimizer(&samples)
            }
            PredictorKind::CustomerPurchase => {
                let samples: Vec<PurchaseSample> = Self::samples(kind, samples)?;
                self.train_customer_purchase(&samples)
            }
            PredictorKind::ProductVelocity => {
                let samples: Vec<VelocitySample> = Self::samples(kind, samples)?;
                self.train_product_velocity(&samples)
            }
            PredictorKind::CrossMerchant => {
                let samples: Vec<MerchantProfile> = Self::samples(kind, samples)?;
                self.train_cross_merchant(&samples)
            }
        }
    }

    fn samples<T: DeserializeOwned>(kind: PredictorKind, value: serde_json::Value) -> Result<Vec<T>, TrainingError> {
        serde_json::from_value(value).map_err(|e| TrainingError::Failed {
            predictor: kind.to_string(),
            reason: format!("invalid training samples: {}", e),
        })
    }
}
