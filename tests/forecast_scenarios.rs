use chrono::NaiveDate;
use serde_json::json;
use std::sync::Arc;
use storecast::application::predictors::{
    BudgetRequest, CreativeFatigueRequest, InsightsRequest, PurchaseRequest, VelocityRequest,
};
use storecast::application::service::ForecastService;
use storecast::config::Config;
use storecast::domain::errors::PredictionError;
use storecast::domain::lookup::LookupTables;
use storecast::domain::prediction::{PredictionTier, RiskLevel};
use storecast::infrastructure::{FixedClock, InMemoryArtifactStore};

fn service() -> ForecastService {
    ForecastService::new(
        &Config::default(),
        LookupTables::default(),
        Arc::new(InMemoryArtifactStore::new()),
        Arc::new(FixedClock::at_date(NaiveDate::from_ymd_opt(2024, 6, 1).unwrap())),
        None,
    )
}

fn within_bounds(confidence: f64) -> bool {
    (0.1..=0.95).contains(&confidence)
}

#[test]
fn test_tiktok_creative_without_history_fatigues_fast() {
    let request: CreativeFatigueRequest = serde_json::from_value(json!({
        "creative_id": "ad-7",
        "platform": "tiktok",
        "current_metrics": {"ctr": 0.008, "frequency": 4.5},
        "historical_data": []
    }))
    .unwrap();

    let prediction = service().predict_creative_fatigue(&request);
    assert_eq!(prediction.tier, PredictionTier::RuleBased);
    assert_eq!(prediction.value.risk_level, RiskLevel::High);
    assert!(prediction.value.days_to_fatigue <= 3);
    assert!(within_bounds(prediction.confidence));
    assert!(
        prediction
            .degradation
            .iter()
            .any(|e| matches!(e, PredictionError::ModelUnavailable { .. }))
    );
}

#[test]
fn test_budget_with_high_roas_scales_up() {
    let request: BudgetRequest = serde_json::from_value(json!({
        "merchant_id": "m-1",
        "current_spend": 1000,
        "current_revenue": 4500
    }))
    .unwrap();

    let prediction = service().optimize_budget(&request);
    assert!((prediction.value.optimal_spend - 1400.0).abs() < 1e-6);
    assert!(within_bounds(prediction.confidence));
    assert!(!prediction.actions.is_empty());
}

#[test]
fn test_new_customer_gets_defaults() {
    let request: PurchaseRequest =
        serde_json::from_value(json!({"customer_id": "c-9", "purchase_history": []})).unwrap();

    let prediction = service().predict_next_purchase(&request);
    assert_eq!(prediction.value.days_to_purchase, 45);
    assert_eq!(prediction.value.purchase_probability, 0.25);
    assert_eq!(prediction.value.segment, "new");
    assert_eq!(prediction.value.customer_id, "c-9");
}

#[test]
fn test_empty_merchant_profile_is_mid_market() {
    let prediction = service().get_insights(&InsightsRequest::default());
    assert_eq!(prediction.value.merchant_archetype, "mid_market");
    assert!(within_bounds(prediction.confidence));
}

#[test]
fn test_predictions_are_idempotent() {
    let service = service();
    let request: VelocityRequest = serde_json::from_value(json!({
        "product_id": "p-3",
        "product_data": {
            "category": "fashion",
            "units_sold_30d": 120,
            "inventory": 40,
            "sales_history": (1..=20)
                .map(|d| json!({"date": format!("2024-05-{:02}", d), "units_sold": 3 + d % 4}))
                .collect::<Vec<_>>()
        }
    }))
    .unwrap();

    let first = service.predict_velocity(&request);
    let second = service.predict_velocity(&request);
    assert_eq!(first, second);
    assert!(within_bounds(first.confidence));
}

#[test]
fn test_garbage_inputs_never_escape_the_cascade() {
    let service = service();

    let creative: CreativeFatigueRequest = serde_json::from_value(json!({
        "platform": "myspace",
        "current_metrics": {"ctr": -5.0, "frequency": 1e308},
        "historical_data": [{"date": "not a date", "ctr": "abc"}]
    }))
    .unwrap();
    let prediction = service.predict_creative_fatigue(&creative);
    assert!(within_bounds(prediction.confidence));
    assert!(!prediction.actions.is_empty());

    let budget = BudgetRequest {
        current_spend: f64::NAN,
        current_revenue: -10.0,
        ..BudgetRequest::default()
    };
    let prediction = service.optimize_budget(&budget);
    assert!(within_bounds(prediction.confidence));
    assert!(prediction.value.optimal_spend.is_finite());
}

#[test]
fn test_batch_of_customers_preserves_order() {
    let service = service();
    let requests: Vec<PurchaseRequest> = (0..8)
        .map(|i| PurchaseRequest {
            customer_id: format!("c-{}", i),
            ..PurchaseRequest::default()
        })
        .collect();

    let predictions = service.predict_customers(&requests);
    let ids: Vec<_> = predictions.iter().map(|p| p.value.customer_id.as_str()).collect();
    assert_eq!(ids, ["c-0", "c-1", "c-2", "c-3", "c-4", "c-5", "c-6", "c-7"]);
}

#[test]
fn test_serialized_prediction_flattens_payload() {
    let prediction = service().predict_next_purchase(&PurchaseRequest::default());
    let value = serde_json::to_value(&prediction).unwrap();

    assert_eq!(value["days_to_purchase"], 45);
    assert_eq!(value["tier"], "rule_based");
    assert_eq!(value["urgency_level"], "LOW");
    assert!(value["confidence"].is_number());
}
