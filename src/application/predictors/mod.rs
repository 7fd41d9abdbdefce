//! The five forecasting strategies.
//!
//! Each module defines its request/response types, a [`ForecastStrategy`]
//! implementation and a `TieredPredictor` alias. Shared helpers for
//! forest-backed strategies live here.
//!
//! [`ForecastStrategy`]: crate::application::ml::ForecastStrategy

pub mod budget_optimizer;
pub mod creative_fatigue;
pub mod cross_merchant;
pub mod customer_purchase;
pub mod product_velocity;

pub use budget_optimizer::{BudgetForecast, BudgetOptimizer, BudgetRequest, BudgetStrategy};
pub use creative_fatigue::{CreativeFatiguePredictor, CreativeFatigueRequest, CreativeFatigueStrategy, FatigueForecast};
pub use cross_merchant::{CrossMerchantPredictor, CrossMerchantStrategy, InsightsRequest, MerchantInsights, MerchantProfile};
pub use customer_purchase::{CustomerPurchasePredictor, CustomerPurchaseStrategy, PurchaseForecast, PurchaseRequest};
pub use product_velocity::{ProductVelocityPredictor, ProductVelocityStrategy, VelocityForecast, VelocityRequest};

use crate::application::ml::{ForestModel, ForestParams};
use crate::domain::errors::TrainingError;
use std::collections::BTreeMap;

/// One supervised training row: features and target.
pub type LabeledRow = (Vec<f64>, f64);

pub(crate) fn fit_regressor(
    predictor: &str,
    rows: &[LabeledRow],
    params: &ForestParams,
) -> Result<(ForestModel, BTreeMap<String, f64>), TrainingError> {
    let x: Vec<Vec<f64>> = rows.iter().map(|(features, _)| features.clone()).collect();
    let y: Vec<f64> = rows.iter().map(|(_, target)| *target).collect();

    let (model, fit) = ForestModel::fit(predictor, &x, &y, params)?;
    let mut metrics = BTreeMap::new();
    fit.insert_into("", &mut metrics);
    Ok((model, metrics))
}

/// Truncates a day estimate to a whole number of days, at least 1.
pub(crate) fn whole_days(value: f64) -> u32 {
    if !value.is_finite() || value < 1.0 {
        return 1;
    }
    value.trunc().min(u32::MAX as f64) as u32
}

/// `high_value` -> `High Value`.
pub(crate) fn title_case(name: &str) -> String {
    name.split('_')
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
