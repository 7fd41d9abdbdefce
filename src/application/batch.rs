//! Multi-predictor batch requests for one merchant payload.

use crate::application::predictors::{
    BudgetForecast, BudgetRequest, CreativeFatigueRequest, FatigueForecast, InsightsRequest, MerchantInsights,
    MerchantProfile, PurchaseForecast, PurchaseRequest, VelocityForecast, VelocityRequest,
};
use crate::application::service::{ForecastService, PredictorKind};
use crate::domain::prediction::Prediction;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BatchRequest {
    #[serde(default)]
    pub merchant_id: Option<String>,
    #[serde(default)]
    pub creative_data: Option<CreativeFatigueRequest>,
    #[serde(default)]
    pub budget_data: Option<BudgetRequest>,
    #[serde(default)]
    pub customer_data: Option<Vec<PurchaseRequest>>,
    #[serde(default)]
    pub product_data: Option<Vec<VelocityRequest>>,
    #[serde(default)]
    pub merchant_profile: Option<MerchantProfile>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchPredictions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub creative_fatigue: Option<Prediction<FatigueForecast>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub budget_optimization: Option<Prediction<BudgetForecast>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_predictions: Option<Vec<Prediction<PurchaseForecast>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product_velocity: Option<Vec<Prediction<VelocityForecast>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cross_merchant: Option<Prediction<MerchantInsights>>,
}

impl BatchPredictions {
    pub fn type_count(&self) -> usize {
        [
            self.creative_fatigue.is_some(),
            self.budget_optimization.is_some(),
            self.customer_predictions.is_some(),
            self.product_velocity.is_some(),
            self.cross_merchant.is_some(),
        ]
        .into_iter()
        .filter(|present| *present)
        .count()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub merchant_id: Option<String>,
    pub predictions: BatchPredictions,
    pub generated_at: DateTime<Utc>,
    pub summary: String,
    /// Predictions whose confidence fell below the configured threshold,
    /// e.g. `customer_predictions[3]`.
    pub low_confidence: Vec<String>,
}

struct LowConfidence {
    threshold: f64,
    flagged: Vec<String>,
}

impl LowConfidence {
    fn check<T>(&mut self, label: impl FnOnce() -> String, prediction: &Prediction<T>) {
        if prediction.confidence < self.threshold {
            self.flagged.push(label());
        }
    }
}

impl ForecastService {
    /// Runs every enabled predictor the request carries data for.
    pub fn run_batch(&self, request: &BatchRequest) -> BatchResponse {
        let mut predictions = BatchPredictions::default();
        let mut low = LowConfidence {
            threshold: self.settings().min_confidence_threshold,
            flagged: Vec::new(),
        };

        if let Some(creative) = &request.creative_data {
            if self.is_enabled(PredictorKind::CreativeFatigue) {
                let prediction = self.predict_creative_fatigue(creative);
                low.check(|| "creative_fatigue".to_string(), &prediction);
                predictions.creative_fatigue = Some(prediction);
            } else {
                debug!("Batch: creative_fatigue disabled, skipping");
            }
        }

        if let Some(budget) = &request.budget_data {
            if self.is_enabled(PredictorKind::BudgetOptimizer) {
                let prediction = self.optimize_budget(budget);
                low.check(|| "budget_optimization".to_string(), &prediction);
                predictions.budget_optimization = Some(prediction);
            } else {
                debug!("Batch: budget_optimizer disabled, skipping");
            }
        }

        if let Some(customers) = &request.customer_data {
            if self.is_enabled(PredictorKind::CustomerPurchase) {
                let results = self.predict_customers(customers);
                for (index, prediction) in results.iter().enumerate() {
                    low.check(|| format!("customer_predictions[{}]", index), prediction);
                }
                predictions.customer_predictions = Some(results);
            } else {
                debug!("Batch: customer_purchase disabled, skipping");
            }
        }

        if let Some(products) = &request.product_data {
            if self.is_enabled(PredictorKind::ProductVelocity) {
                let results = self.predict_products(products);
                for (index, prediction) in results.iter().enumerate() {
                    low.check(|| format!("product_velocity[{}]", index), prediction);
                }
                predictions.product_velocity = Some(results);
            } else {
                debug!("Batch: product_velocity disabled, skipping");
            }
        }

        if let Some(profile) = &request.merchant_profile {
            if self.is_enabled(PredictorKind::CrossMerchant) {
                let prediction = self.get_insights(&InsightsRequest {
                    merchant_profile: profile.clone(),
                    benchmark_categories: Vec::new(),
                });
                low.check(|| "cross_merchant".to_string(), &prediction);
                predictions.cross_merchant = Some(prediction);
            } else {
                debug!("Batch: cross_merchant disabled, skipping");
            }
        }

        let types = predictions.type_count();
        info!(
            "Batch for {}: {} prediction types, {} below confidence threshold",
            request.merchant_id.as_deref().unwrap_or("unknown merchant"),
            types,
            low.flagged.len()
        );

        BatchResponse {
            merchant_id: request.merchant_id.clone(),
            predictions,
            generated_at: self.now(),
            summary: format!("Generated {} prediction types", types),
            low_confidence: low.flagged,
        }
    }
}
