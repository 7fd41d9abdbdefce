use crate::application::ml::forest::ForestParams;
use crate::domain::errors::{PredictionError, TrainingError};
use crate::domain::ml::FeatureVector;
use crate::domain::prediction::Forecast;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;

/// Per-call context handed to every tier.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PredictContext {
    pub now: DateTime<Utc>,
}

impl PredictContext {
    pub fn today(&self) -> NaiveDate {
        self.now.date_naive()
    }
}

/// Usable training rows plus the number of samples that were dropped.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingSet<R> {
    pub rows: Vec<R>,
    pub skipped: usize,
}

impl<R> TrainingSet<R> {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl<R> FromIterator<Option<R>> for TrainingSet<R> {
    fn from_iter<I: IntoIterator<Item = Option<R>>>(iter: I) -> Self {
        let mut rows = Vec::new();
        let mut skipped = 0;
        for row in iter {
            match row {
                Some(row) => rows.push(row),
                None => skipped += 1,
            }
        }
        Self { rows, skipped }
    }
}

/// Domain half of a tiered predictor: features, formulas and model fitting.
///
/// The cascade itself (cold start, feature checks, tier selection, fallback,
/// confidence clamping, persistence) lives in
/// [`TieredPredictor`](crate::application::ml::TieredPredictor); a strategy
/// only answers domain questions.
pub trait ForecastStrategy: Send + Sync {
    type Input: Sync;
    type Output: Serialize + Clone + Send;
    type Model: Serialize + DeserializeOwned + Send + Sync;
    type Sample: DeserializeOwned + Sync;
    type Row: Send;

    /// Stable identifier, also the artifact key and metrics label.
    const NAME: &'static str;
    const MIN_TRAINING_SAMPLES: usize;

    fn feature_names(&self) -> &'static [&'static str];

    /// Identifier of the thing being predicted, for logs.
    fn subject(&self, input: &Self::Input) -> String;

    /// Early answer for inputs that need no features at all.
    fn cold_start(
        &self,
        _input: &Self::Input,
        _ctx: &PredictContext,
    ) -> Option<(Forecast<Self::Output>, PredictionError)> {
        None
    }

    fn extract_features(
        &self,
        input: &Self::Input,
        ctx: &PredictContext,
    ) -> Result<FeatureVector, PredictionError>;

    fn rule_based(
        &self,
        input: &Self::Input,
        features: &FeatureVector,
        ctx: &PredictContext,
    ) -> Result<Forecast<Self::Output>, PredictionError>;

    fn trained(
        &self,
        model: &Self::Model,
        input: &Self::Input,
        features: &FeatureVector,
        ctx: &PredictContext,
    ) -> Result<Forecast<Self::Output>, PredictionError>;

    /// Hardcoded low-confidence answer. Must not fail.
    fn fallback(&self, input: &Self::Input) -> Forecast<Self::Output>;

    /// Turns raw samples into rows; unusable samples are counted, not fatal.
    fn prepare_training(&self, samples: &[Self::Sample], ctx: &PredictContext) -> TrainingSet<Self::Row>;

    fn fit(
        &self,
        rows: &[Self::Row],
        params: &ForestParams,
    ) -> Result<(Self::Model, BTreeMap<String, f64>), TrainingError>;
}
