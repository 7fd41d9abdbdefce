//! The three-tier prediction cascade shared by every predictor.
//!
//! ```text
//! cold start? ──yes──▶ rule-based answer (InsufficientData)
//!     │no
//! extract features ──err──┐
//!     │                   │
//! model ready? ──no──▶ rule_based ──err──┤
//!     │yes                │              ├──▶ fallback (PredictionFailure)
//! trained ──err───────────┘              │
//!     (any panic) ───────────────────────┘
//! ```

use crate::application::ml::forest::ForestParams;
use crate::application::ml::predictor::{ForecastStrategy, PredictContext};
use crate::application::ml::state::PredictorState;
use crate::domain::errors::{FailureStage, PredictionError, TrainingError};
use crate::domain::ml::feature_registry::schema_fingerprint;
use crate::domain::ml::{Artifact, FeatureVector, TrainingReport};
use crate::domain::ports::{ArtifactStore, Clock};
use crate::domain::prediction::{Prediction, PredictionTier};
use crate::infrastructure::observability::Metrics;
use rayon::prelude::*;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

pub struct TieredPredictor<S: ForecastStrategy> {
    strategy: S,
    state: PredictorState<S::Model>,
    store: Arc<dyn ArtifactStore>,
    clock: Arc<dyn Clock>,
    metrics: Option<Metrics>,
    params: ForestParams,
}

impl<S: ForecastStrategy> TieredPredictor<S> {
    pub fn new(strategy: S, store: Arc<dyn ArtifactStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            strategy,
            state: PredictorState::Unresolved,
            store,
            clock,
            metrics: None,
            params: ForestParams::default(),
        }
    }

    pub fn with_metrics(mut self, metrics: Metrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn with_params(mut self, params: ForestParams) -> Self {
        self.params = params;
        self
    }

    pub fn name(&self) -> &'static str {
        S::NAME
    }

    pub fn strategy(&self) -> &S {
        &self.strategy
    }

    pub fn state(&self) -> &PredictorState<S::Model> {
        &self.state
    }

    pub fn schema(&self) -> String {
        schema_fingerprint(S::NAME, self.strategy.feature_names())
    }

    fn context(&self) -> PredictContext {
        PredictContext {
            now: self.clock.now(),
        }
    }

    /// Whether a trained model is installed. Never touches the store.
    pub fn is_ready(&self) -> bool {
        self.state.is_ready()
    }

    /// Resolves the model state once and memoizes the result.
    pub fn ensure_ready(&mut self) -> bool {
        if self.state.is_unresolved() {
            let current = std::mem::replace(&mut self.state, PredictorState::Unresolved);
            self.state = current.resolve(self.store.as_ref(), S::NAME, &self.schema());
        }
        self.state.is_ready()
    }

    /// Forgets a `Missing` result so the next readiness check hits the store again.
    pub fn reload(&mut self) -> bool {
        if !self.state.is_ready() {
            self.state = PredictorState::Unresolved;
        }
        self.ensure_ready()
    }

    /// Runs the cascade. Never fails: errors and panics select the fallback.
    pub fn predict(&self, input: &S::Input) -> Prediction<S::Output> {
        let ctx = self.context();
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.run_tiers(input, &ctx)));

        let prediction = match outcome {
            Ok(Ok(prediction)) => prediction,
            Ok(Err(e)) => {
                error!(
                    "{}: prediction failed for {}: {}. Using fallback.",
                    S::NAME,
                    self.strategy.subject(input),
                    e
                );
                self.fallback_prediction(input, e)
            }
            Err(payload) => {
                let reason = panic_message(payload.as_ref());
                error!(
                    "{}: internal error for {}: {}. Using fallback.",
                    S::NAME,
                    self.strategy.subject(input),
                    reason
                );
                self.fallback_prediction(input, PredictionError::failure(FailureStage::Internal, reason))
            }
        };

        if let Some(metrics) = &self.metrics {
            metrics.observe_prediction(S::NAME, prediction.tier.as_str(), prediction.confidence);
        }
        prediction
    }

    /// Predicts every input in parallel, preserving order.
    pub fn predict_batch(&self, inputs: &[S::Input]) -> Vec<Prediction<S::Output>> {
        inputs.par_iter().map(|input| self.predict(input)).collect()
    }

    fn run_tiers(&self, input: &S::Input, ctx: &PredictContext) -> Result<Prediction<S::Output>, PredictionError> {
        if let Some((forecast, signal)) = self.strategy.cold_start(input, ctx) {
            debug!("{}: cold start for {}: {}", S::NAME, self.strategy.subject(input), signal);
            return Ok(Prediction::from_forecast(forecast, PredictionTier::RuleBased, vec![signal]));
        }

        let features = self.strategy.extract_features(input, ctx)?;
        self.check_features(&features)?;

        let mut degradation = Vec::new();
        if let Some(required) = features.defaulted_below {
            degradation.push(PredictionError::InsufficientData {
                available: features.history_points,
                required,
            });
        }

        let transient;
        let state = if self.state.is_unresolved() {
            transient = self.state.clone().resolve(self.store.as_ref(), S::NAME, &self.schema());
            &transient
        } else {
            &self.state
        };

        let (forecast, tier) = match state.artifact() {
            Some(artifact) => (
                self.strategy.trained(&artifact.model, input, &features, ctx)?,
                PredictionTier::Trained,
            ),
            None => {
                debug!("{}: no trained model, using rule-based tier", S::NAME);
                degradation.push(PredictionError::ModelUnavailable {
                    predictor: S::NAME.to_string(),
                });
                (
                    self.strategy.rule_based(input, &features, ctx)?,
                    PredictionTier::RuleBased,
                )
            }
        };

        if forecast.actions.is_empty() {
            return Err(PredictionError::failure(
                FailureStage::RuleEvaluation,
                "tier produced no actions",
            ));
        }

        Ok(Prediction::from_forecast(forecast, tier, degradation))
    }

    fn check_features(&self, features: &FeatureVector) -> Result<(), PredictionError> {
        let names = self.strategy.feature_names();
        if features.len() != names.len() {
            return Err(PredictionError::failure(
                FailureStage::FeatureExtraction,
                format!("expected {} features, got {}", names.len(), features.len()),
            ));
        }
        if let Some((name, value)) = names
            .iter()
            .zip(&features.values)
            .find(|(_, value)| !value.is_finite())
        {
            return Err(PredictionError::failure(
                FailureStage::FeatureExtraction,
                format!("feature {} is {}", name, value),
            ));
        }
        Ok(())
    }

    fn fallback_prediction(&self, input: &S::Input, cause: PredictionError) -> Prediction<S::Output> {
        Prediction::from_forecast(self.strategy.fallback(input), PredictionTier::Fallback, vec![cause])
    }

    /// Fits a new model, installs it and persists it.
    ///
    /// A persistence failure does not undo the install: the report carries
    /// `model_saved = false` and the model serves this process only.
    pub fn train(&mut self, samples: &[S::Sample]) -> Result<TrainingReport, TrainingError> {
        let result = self.fit_and_install(samples);

        let outcome = match &result {
            Ok(_) => "success",
            Err(TrainingError::InsufficientData { .. }) => "insufficient_data",
            Err(_) => "failed",
        };
        if let Some(metrics) = &self.metrics {
            metrics.inc_training(S::NAME, outcome);
        }
        result
    }

    fn fit_and_install(&mut self, samples: &[S::Sample]) -> Result<TrainingReport, TrainingError> {
        let ctx = self.context();
        let set = self.strategy.prepare_training(samples, &ctx);
        let required = S::MIN_TRAINING_SAMPLES;

        if set.len() < required {
            warn!(
                "{}: {} usable training samples ({} skipped), {} required",
                S::NAME,
                set.len(),
                set.skipped,
                required
            );
            return Err(TrainingError::InsufficientData {
                samples: set.len(),
                required,
            });
        }

        let fitted = panic::catch_unwind(AssertUnwindSafe(|| self.strategy.fit(&set.rows, &self.params)))
            .map_err(|payload| TrainingError::Failed {
                predictor: S::NAME.to_string(),
                reason: panic_message(payload.as_ref()),
            })?;
        let (model, metrics) = fitted?;

        self.state = PredictorState::Trained(Arc::new(Artifact {
            predictor: S::NAME.to_string(),
            schema: self.schema(),
            trained_at: ctx.now,
            samples: set.len(),
            model,
        }));
        info!("{}: trained on {} samples ({} skipped)", S::NAME, set.len(), set.skipped);

        let model_saved = match self.persist() {
            Ok(()) => true,
            Err(e) => {
                warn!("{}: model kept in memory only: {}", S::NAME, e);
                false
            }
        };

        Ok(TrainingReport {
            predictor: S::NAME.to_string(),
            training_samples: set.len(),
            skipped_samples: set.skipped,
            metrics,
            model_saved,
        })
    }

    /// Writes the installed model to the artifact store.
    pub fn persist(&self) -> Result<(), TrainingError> {
        let artifact = self.state.artifact().ok_or_else(|| TrainingError::Failed {
            predictor: S::NAME.to_string(),
            reason: "no trained model to persist".to_string(),
        })?;

        let bytes = serde_json::to_vec(artifact.as_ref()).map_err(|e| TrainingError::Failed {
            predictor: S::NAME.to_string(),
            reason: format!("Failed to serialize model: {}", e),
        })?;

        self.store
            .save(S::NAME, &bytes)
            .map_err(|source| TrainingError::Persistence {
                predictor: S::NAME.to_string(),
                source,
            })
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ml::predictor::TrainingSet;
    use crate::domain::errors::ArtifactError;
    use crate::domain::prediction::Forecast;
    use crate::infrastructure::clock::FixedClock;
    use crate::infrastructure::persistence::InMemoryArtifactStore;
    use chrono::NaiveDate;
    use std::collections::BTreeMap;

    const TOY_FEATURES: &[&str] = &["value", "doubled"];

    /// Predicts `value * 2` by rule, or the trained mean target.
    struct Toy;

    enum ToyInput {
        Value(f64),
        Fail,
        Panic,
        WrongWidth,
        Silent,
    }

    impl ForecastStrategy for Toy {
        type Input = ToyInput;
        type Output = f64;
        type Model = f64;
        type Sample = (f64, f64);
        type Row = f64;

        const NAME: &'static str = "toy";
        const MIN_TRAINING_SAMPLES: usize = 3;

        fn feature_names(&self) -> &'static [&'static str] {
            TOY_FEATURES
        }

        fn subject(&self, _input: &ToyInput) -> String {
            "toy-1".to_string()
        }

        fn extract_features(&self, input: &ToyInput, _ctx: &PredictContext) -> Result<FeatureVector, PredictionError> {
            match input {
                ToyInput::Value(v) if *v < 0.0 => Ok(FeatureVector::defaults(vec![0.0, 0.0], 0, 5)),
                ToyInput::Value(v) => Ok(FeatureVector::from_history(vec![*v, v * 2.0], 10)),
                ToyInput::Fail => Err(PredictionError::failure(FailureStage::FeatureExtraction, "bad input")),
                ToyInput::Panic => panic!("boom"),
                ToyInput::WrongWidth => Ok(FeatureVector::from_history(vec![1.0], 10)),
                ToyInput::Silent => Ok(FeatureVector::from_history(vec![1.0, 2.0], 10)),
            }
        }

        fn rule_based(&self, input: &ToyInput, features: &FeatureVector, _ctx: &PredictContext) -> Result<Forecast<f64>, PredictionError> {
            let actions = match input {
                ToyInput::Silent => vec![],
                _ => vec!["watch".to_string()],
            };
            Ok(Forecast::new(features.get(1), 0.6, "rule", actions))
        }

        fn trained(&self, model: &f64, _input: &ToyInput, _features: &FeatureVector, _ctx: &PredictContext) -> Result<Forecast<f64>, PredictionError> {
            Ok(Forecast::new(*model, 2.0, "model", vec!["act".to_string()]))
        }

        fn fallback(&self, _input: &ToyInput) -> Forecast<f64> {
            Forecast::new(0.0, 0.3, "fallback", vec!["collect data".to_string()])
        }

        fn prepare_training(&self, samples: &[(f64, f64)], _ctx: &PredictContext) -> TrainingSet<f64> {
            samples
                .iter()
                .map(|(_, target)| target.is_finite().then_some(*target))
                .collect()
        }

        fn fit(&self, rows: &[f64], _params: &ForestParams) -> Result<(f64, BTreeMap<String, f64>), TrainingError> {
            let mean = rows.iter().sum::<f64>() / rows.len() as f64;
            Ok((mean, BTreeMap::from([("mean".to_string(), mean)])))
        }
    }

    struct BrokenStore;

    impl ArtifactStore for BrokenStore {
        fn load(&self, _key: &str) -> Result<Option<Vec<u8>>, ArtifactError> {
            Ok(None)
        }

        fn save(&self, key: &str, _bytes: &[u8]) -> Result<(), ArtifactError> {
            Err(ArtifactError::Io {
                key: key.to_string(),
                source: std::io::Error::other("disk full"),
            })
        }

        fn describe(&self) -> String {
            "broken".to_string()
        }
    }

    fn clock() -> Arc<dyn Clock> {
        Arc::new(FixedClock::at_date(NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()))
    }

    fn toy(store: Arc<dyn ArtifactStore>) -> TieredPredictor<Toy> {
        TieredPredictor::new(Toy, store, clock())
    }

    #[test]
    fn test_rule_based_without_model() {
        let predictor = toy(Arc::new(InMemoryArtifactStore::new()));
        let prediction = predictor.predict(&ToyInput::Value(3.0));

        assert_eq!(prediction.tier, PredictionTier::RuleBased);
        assert_eq!(prediction.value, 6.0);
        assert_eq!(prediction.confidence, 0.6);
        assert!(matches!(
            prediction.degradation.as_slice(),
            [PredictionError::ModelUnavailable { .. }]
        ));
    }

    #[test]
    fn test_defaulted_features_are_reported() {
        let predictor = toy(Arc::new(InMemoryArtifactStore::new()));
        let prediction = predictor.predict(&ToyInput::Value(-1.0));
        assert!(matches!(
            prediction.degradation.first(),
            Some(PredictionError::InsufficientData { available: 0, required: 5 })
        ));
    }

    #[test]
    fn test_error_selects_fallback() {
        let predictor = toy(Arc::new(InMemoryArtifactStore::new()));
        let prediction = predictor.predict(&ToyInput::Fail);

        assert_eq!(prediction.tier, PredictionTier::Fallback);
        assert_eq!(prediction.confidence, 0.3);
        assert!(matches!(
            prediction.degradation.as_slice(),
            [PredictionError::PredictionFailure { stage: FailureStage::FeatureExtraction, .. }]
        ));
    }

    #[test]
    fn test_panic_is_an_internal_failure() {
        let predictor = toy(Arc::new(InMemoryArtifactStore::new()));
        let prediction = predictor.predict(&ToyInput::Panic);

        assert_eq!(prediction.tier, PredictionTier::Fallback);
        match prediction.degradation.as_slice() {
            [PredictionError::PredictionFailure { stage, reason }] => {
                assert_eq!(*stage, FailureStage::Internal);
                assert_eq!(reason, "boom");
            }
            other => panic!("unexpected degradation {:?}", other),
        }
    }

    #[test]
    fn test_feature_width_is_checked() {
        let predictor = toy(Arc::new(InMemoryArtifactStore::new()));
        let prediction = predictor.predict(&ToyInput::WrongWidth);
        assert_eq!(prediction.tier, PredictionTier::Fallback);
    }

    #[test]
    fn test_empty_actions_fall_back() {
        let predictor = toy(Arc::new(InMemoryArtifactStore::new()));
        let prediction = predictor.predict(&ToyInput::Silent);
        assert_eq!(prediction.tier, PredictionTier::Fallback);
        assert!(!prediction.actions.is_empty());
    }

    #[test]
    fn test_train_installs_and_persists() {
        let store = Arc::new(InMemoryArtifactStore::new());
        let mut predictor = toy(store.clone());

        let report = predictor
            .train(&[(0.0, 2.0), (0.0, 4.0), (0.0, f64::NAN), (0.0, 6.0)])
            .unwrap();
        assert_eq!(report.training_samples, 3);
        assert_eq!(report.skipped_samples, 1);
        assert!(report.model_saved);
        assert_eq!(predictor.state().label(), "trained");

        let prediction = predictor.predict(&ToyInput::Value(1.0));
        assert_eq!(prediction.tier, PredictionTier::Trained);
        assert_eq!(prediction.value, 4.0);
        // clamped from 2.0
        assert_eq!(prediction.confidence, 0.95);
        assert!(prediction.degradation.is_empty());

        // a fresh predictor over the same store loads the artifact
        let mut reloaded = toy(store);
        assert!(reloaded.ensure_ready());
        assert_eq!(reloaded.state().label(), "loaded");
        assert_eq!(reloaded.predict(&ToyInput::Value(1.0)).value, 4.0);
    }

    #[test]
    fn test_unresolved_predictor_still_sees_store() {
        let store = Arc::new(InMemoryArtifactStore::new());
        toy(store.clone()).train(&[(0.0, 1.0), (0.0, 1.0), (0.0, 1.0)]).unwrap();

        let predictor = toy(store);
        assert!(!predictor.is_ready());
        assert_eq!(predictor.predict(&ToyInput::Value(1.0)).tier, PredictionTier::Trained);
    }

    #[test]
    fn test_insufficient_training_data() {
        let mut predictor = toy(Arc::new(InMemoryArtifactStore::new()));
        let err = predictor.train(&[(0.0, 1.0), (0.0, 2.0)]).unwrap_err();

        assert!(matches!(err, TrainingError::InsufficientData { samples: 2, required: 3 }));
        assert!(err.to_string().starts_with("insufficient_data"));
        assert!(!predictor.is_ready());
    }

    #[test]
    fn test_save_failure_keeps_model() {
        let mut predictor = toy(Arc::new(BrokenStore));
        let report = predictor.train(&[(0.0, 1.0), (0.0, 1.0), (0.0, 1.0)]).unwrap();

        assert!(!report.model_saved);
        assert!(predictor.is_ready());
        assert!(matches!(predictor.persist(), Err(TrainingError::Persistence { .. })));
    }

    #[test]
    fn test_idempotent_predictions() {
        let predictor = toy(Arc::new(InMemoryArtifactStore::new()));
        let first = predictor.predict(&ToyInput::Value(2.5));
        let second = predictor.predict(&ToyInput::Value(2.5));
        assert_eq!(first, second);
    }

    #[test]
    fn test_batch_preserves_order() {
        let predictor = toy(Arc::new(InMemoryArtifactStore::new()));
        let inputs: Vec<ToyInput> = (0..20).map(|i| ToyInput::Value(i as f64)).collect();
        let values: Vec<f64> = predictor.predict_batch(&inputs).into_iter().map(|p| p.value).collect();
        let expected: Vec<f64> = (0..20).map(|i| i as f64 * 2.0).collect();
        assert_eq!(values, expected);
    }

    #[test]
    fn test_metrics_are_recorded() {
        let metrics = Metrics::new().unwrap();
        let predictor = toy(Arc::new(InMemoryArtifactStore::new())).with_metrics(metrics.clone());
        predictor.predict(&ToyInput::Value(1.0));
        predictor.predict(&ToyInput::Fail);

        let output = metrics.render();
        assert!(output.contains("predictor=\"toy\""));
        assert!(output.contains("tier=\"fallback\""));
    }
}
