//! Prometheus metrics definitions for Storecast
//!
//! All metrics use the `storecast_` prefix and are read-only.

use prometheus::{
    CounterVec, Gauge, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder,
    core::{AtomicF64, GenericGauge},
};
use std::sync::Arc;

/// Prometheus metrics for the forecasting engine
#[derive(Clone)]
pub struct Metrics {
    registry: Arc<Registry>,
    /// Predictions served, by predictor and tier
    pub predictions_total: CounterVec,
    /// Confidence of served predictions
    pub prediction_confidence: HistogramVec,
    /// Training runs by predictor and outcome
    pub training_runs_total: CounterVec,
    /// Predictors currently backed by a trained model
    pub models_ready: GenericGauge<AtomicF64>,
}

impl Metrics {
    /// Create a new Metrics instance with all counters registered
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let predictions_total = CounterVec::new(
            Opts::new(
                "storecast_predictions_total",
                "Predictions served by predictor and tier",
            ),
            &["predictor", "tier"],
        )?;
        registry.register(Box::new(predictions_total.clone()))?;

        let prediction_confidence = HistogramVec::new(
            HistogramOpts::new(
                "storecast_prediction_confidence",
                "Confidence of served predictions",
            )
            .buckets(vec![0.1, 0.2, 0.3, 0.4, 0.5, 0.6, 0.7, 0.8, 0.9, 0.95]),
            &["predictor"],
        )?;
        registry.register(Box::new(prediction_confidence.clone()))?;

        let training_runs_total = CounterVec::new(
            Opts::new(
                "storecast_training_runs_total",
                "Training runs by predictor and outcome",
            ),
            &["predictor", "outcome"],
        )?;
        registry.register(Box::new(training_runs_total.clone()))?;

        let models_ready = Gauge::with_opts(Opts::new(
            "storecast_models_ready",
            "Number of predictors backed by a trained model",
        ))?;
        registry.register(Box::new(models_ready.clone()))?;

        Ok(Self {
            registry: Arc::new(registry),
            predictions_total,
            prediction_confidence,
            training_runs_total,
            models_ready,
        })
    }

    /// Render all metrics in Prometheus text format
    pub fn render(&self) -> String {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        encoder
            .encode_to_string(&metric_families)
            .unwrap_or_default()
    }

    /// Record one served prediction
    pub fn observe_prediction(&self, predictor: &str, tier: &str, confidence: f64) {
        self.predictions_total
            .with_label_values(&[predictor, tier])
            .inc();
        self.prediction_confidence
            .with_label_values(&[predictor])
            .observe(confidence);
    }

    /// Increment training runs
    pub fn inc_training(&self, predictor: &str, outcome: &str) {
        self.training_runs_total
            .with_label_values(&[predictor, outcome])
            .inc();
    }

    pub fn set_models_ready(&self, count: usize) {
        self.models_ready.set(count as f64);
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new().expect("Failed to create default Metrics")
    }
}
