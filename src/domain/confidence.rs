//! Shared confidence formula.
//!
//! `confidence = min(cap, base(samples) × 1/(1 + variance_metric) × multiplier)`
//!
//! `base` is looked up from a descending list of sample-count tiers. Every
//! predictor's trained tier and the historical component of the confidence
//! calculator go through [`ConfidenceProfile::score`].

use crate::domain::prediction::MAX_CONFIDENCE;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SampleTier {
    pub min_samples: usize,
    pub base: f64,
}

impl SampleTier {
    pub const fn new(min_samples: usize, base: f64) -> Self {
        Self { min_samples, base }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceProfile {
    /// Tiers sorted by `min_samples` descending; the first match wins.
    tiers: Vec<SampleTier>,
    /// Base used when no tier matches.
    floor: f64,
    cap: f64,
}

impl ConfidenceProfile {
    pub fn new(mut tiers: Vec<SampleTier>, floor: f64) -> Self {
        tiers.sort_by(|a, b| b.min_samples.cmp(&a.min_samples));
        Self {
            tiers,
            floor,
            cap: MAX_CONFIDENCE,
        }
    }

    pub fn with_cap(mut self, cap: f64) -> Self {
        self.cap = cap;
        self
    }

    pub fn base(&self, samples: usize) -> f64 {
        self.tiers
            .iter()
            .find(|tier| samples >= tier.min_samples)
            .map(|tier| tier.base)
            .unwrap_or(self.floor)
    }

    pub fn score(&self, samples: usize, variance_metric: f64, multiplier: f64) -> f64 {
        let raw = self.base(samples) * stability_factor(variance_metric) * multiplier;
        if raw.is_finite() {
            raw.min(self.cap).max(0.0)
        } else {
            0.0
        }
    }
}

/// `1 / (1 + v)`. Negative variance is treated as zero, NaN as no penalty.
pub fn stability_factor(variance_metric: f64) -> f64 {
    if variance_metric.is_nan() {
        return 1.0;
    }
    1.0 / (1.0 + variance_metric.max(0.0))
}
