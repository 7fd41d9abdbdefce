use crate::config::Config;
use std::env;
use std::sync::Mutex;
use std::sync::OnceLock;

// Global lock to prevent race conditions when modifying environment variables in tests
static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

fn get_env_lock() -> &'static Mutex<()> {
    ENV_LOCK.get_or_init(|| Mutex::new(()))
}

fn set(key: &str, value: &str) {
    unsafe { env::set_var(key, value) };
}

fn clear(key: &str) {
    unsafe { env::remove_var(key) };
}

#[test]
fn test_config_defaults() {
    let _guard = get_env_lock().lock().unwrap();
    for key in ["MODEL_N_TREES", "MIN_CONFIDENCE_THRESHOLD", "ENABLE_PRODUCT_VELOCITY", "MODEL_STORAGE_PATH"] {
        clear(key);
    }

    let config = Config::from_env().unwrap();

    assert_eq!(config.model.n_trees, 100);
    assert_eq!(config.model.max_depth, 10);
    assert_eq!(config.model.min_samples_split, 5);
    assert!(config.prediction.enable_product_velocity);
    assert!((config.prediction.min_confidence_threshold - 0.3).abs() < 1e-12);
}

#[test]
fn test_config_overrides() {
    let _guard = get_env_lock().lock().unwrap();
    set("MODEL_N_TREES", "25");
    set("MODEL_STORAGE_PATH", "/tmp/storecast-models");
    set("ENABLE_PRODUCT_VELOCITY", "false");
    set("MIN_CONFIDENCE_THRESHOLD", "0.5");

    let config = Config::from_env().unwrap();

    assert_eq!(config.model.n_trees, 25);
    assert_eq!(config.model.storage_path.to_str(), Some("/tmp/storecast-models"));
    assert!(!config.prediction.enable_product_velocity);
    assert!(config.prediction.enable_budget_optimization);
    assert!((config.prediction.min_confidence_threshold - 0.5).abs() < 1e-12);

    clear("MODEL_N_TREES");
    clear("MODEL_STORAGE_PATH");
    clear("ENABLE_PRODUCT_VELOCITY");
    clear("MIN_CONFIDENCE_THRESHOLD");
}

#[test]
fn test_invalid_values_are_rejected() {
    let _guard = get_env_lock().lock().unwrap();
    set("MODEL_MAX_DEPTH", "deep");
    assert!(Config::from_env().is_err());
    clear("MODEL_MAX_DEPTH");

    set("MIN_CONFIDENCE_THRESHOLD", "1.5");
    assert!(Config::from_env().is_err());
    clear("MIN_CONFIDENCE_THRESHOLD");
}
