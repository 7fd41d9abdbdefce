use chrono::{Duration, NaiveDate};
use serde_json::{Value, json};
use std::path::PathBuf;
use std::sync::Arc;
use storecast::application::predictors::PurchaseRequest;
use storecast::application::service::{ForecastService, PredictorKind};
use storecast::config::Config;
use storecast::domain::errors::TrainingError;
use storecast::domain::lookup::LookupTables;
use storecast::domain::prediction::PredictionTier;
use storecast::infrastructure::{FileArtifactStore, FixedClock};

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
}

fn temp_storage(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("storecast-{}-{}", name, std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    dir
}

fn config(storage: &PathBuf) -> Config {
    let mut config = Config::default();
    config.model.storage_path = storage.clone();
    config.model.n_trees = 10;
    config.model.max_depth = 5;
    config
}

fn service(config: &Config) -> ForecastService {
    ForecastService::new(
        config,
        LookupTables::default(),
        Arc::new(FileArtifactStore::new(&config.model.storage_path)),
        Arc::new(FixedClock::at_date(today())),
        None,
    )
}

fn history(interval: i64, purchases: i64, last_days_ago: i64) -> Vec<Value> {
    (0..purchases)
        .map(|i| {
            let date = today() - Duration::days(last_days_ago + (purchases - 1 - i) * interval);
            json!({"date": date.to_string(), "amount": 40 + interval * 3})
        })
        .collect()
}

fn purchase_samples(count: usize) -> Value {
    let samples: Vec<Value> = (0..count)
        .map(|i| {
            let interval = 5 + (i % 10) as i64;
            json!({
                "purchase_history": history(interval, 3 + (i % 4) as i64, 2 + (i % 7) as i64),
                "actual_days_to_next_purchase": interval as f64,
                "did_purchase": i % 3 != 0
            })
        })
        .collect();
    Value::Array(samples)
}

fn customer() -> PurchaseRequest {
    serde_json::from_value(json!({
        "customer_id": "c-1",
        "purchase_history": history(10, 4, 3)
    }))
    .unwrap()
}

#[test]
fn test_trained_model_survives_a_restart() {
    let storage = temp_storage("restart");
    let config = config(&storage);

    let mut first = service(&config);
    assert_eq!(first.predict_next_purchase(&customer()).tier, PredictionTier::RuleBased);

    let report = first
        .train_json(PredictorKind::CustomerPurchase, purchase_samples(30))
        .unwrap();
    assert_eq!(report.predictor, "customer_purchase");
    assert_eq!(report.training_samples, 30);
    assert!(report.model_saved);
    assert!(report.metrics.keys().any(|k| k.starts_with("timing_")));
    assert!(storage.join("customer_purchase.json").exists());

    let restarted = service(&config);
    let health = restarted.health();
    assert_eq!(health.models_loaded["customer_purchase"].state, "loaded");

    let prediction = restarted.predict_next_purchase(&customer());
    assert_eq!(prediction.tier, PredictionTier::Trained);
    assert!(prediction.value.days_to_purchase >= 1);
    assert!((0.0..=1.0).contains(&prediction.value.purchase_probability));
    assert!((0.1..=0.95).contains(&prediction.confidence));

    let _ = std::fs::remove_dir_all(&storage);
}

#[test]
fn test_schema_mismatch_is_treated_as_untrained() {
    let storage = temp_storage("schema");
    let config = config(&storage);

    service(&config)
        .train_json(PredictorKind::CustomerPurchase, purchase_samples(24))
        .unwrap();

    let path = storage.join("customer_purchase.json");
    let mut artifact: Value = serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
    artifact["schema"] = json!("customer_purchase/v0:something_else");
    std::fs::write(&path, serde_json::to_vec(&artifact).unwrap()).unwrap();

    let restarted = service(&config);
    assert_eq!(restarted.health().models_loaded["customer_purchase"].state, "missing");
    assert_eq!(restarted.predict_next_purchase(&customer()).tier, PredictionTier::RuleBased);

    let _ = std::fs::remove_dir_all(&storage);
}

#[test]
fn test_insufficient_samples_leave_predictor_untrained() {
    let storage = temp_storage("insufficient");
    let config = config(&storage);
    let mut service = service(&config);

    let result = service.train_json(PredictorKind::CustomerPurchase, purchase_samples(5));
    match result {
        Err(TrainingError::InsufficientData { samples, required }) => {
            assert_eq!(samples, 5);
            assert_eq!(required, 20);
        }
        other => panic!("expected insufficient data, got {:?}", other),
    }
    assert!(!service.health().models_loaded["customer_purchase"].ready);
    assert!(!storage.join("customer_purchase.json").exists());
}

#[test]
fn test_unusable_samples_are_skipped() {
    let storage = temp_storage("skipped");
    let config = config(&storage);
    let mut service = service(&config);

    let mut samples = purchase_samples(22);
    if let Value::Array(items) = &mut samples {
        items.push(json!({"purchase_history": [], "actual_days_to_next_purchase": 4.0, "did_purchase": true}));
        items.push(json!({"purchase_history": history(7, 3, 1), "actual_days_to_next_purchase": -3.0, "did_purchase": false}));
    }

    let report = service.train_json(PredictorKind::CustomerPurchase, samples).unwrap();
    assert_eq!(report.training_samples, 22);
    assert_eq!(report.skipped_samples, 2);

    let _ = std::fs::remove_dir_all(&storage);
}
