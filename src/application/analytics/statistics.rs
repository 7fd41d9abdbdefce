//! Series statistics used by feature extraction and confidence scoring
//!
//! This module provides:
//! - Mean / variance / standard deviation (via `statrs`) with empty-series guards
//! - Coefficient of variation
//! - Least-squares trend slope, raw and normalized by the window mean

use statrs::statistics::Statistics;

/// Arithmetic mean, 0 for an empty series.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().mean()
}

/// Sample variance (n - 1), 0 for fewer than two points.
pub fn sample_variance(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    values.iter().variance()
}

/// Sample standard deviation (n - 1), 0 for fewer than two points.
pub fn sample_std(values: &[f64]) -> f64 {
    sample_variance(values).sqrt()
}

/// Population standard deviation, 0 for an empty series.
pub fn population_std(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().population_std_dev()
}

/// Sample std divided by mean. `None` when the mean is not positive or the
/// series is too short to have a spread.
pub fn coefficient_of_variation(values: &[f64]) -> Option<f64> {
    let avg = mean(values);
    if values.len() < 2 || avg <= 0.0 {
        return None;
    }
    Some(sample_std(values) / avg)
}

/// Last `n` items of a slice (all of it when shorter).
pub fn tail(values: &[f64], n: usize) -> &[f64] {
    &values[values.len().saturating_sub(n)..]
}

/// Simple linear regression to find slope
pub fn linear_regression_slope(x: &[f64], y: &[f64]) -> Option<f64> {
    if x.len() != y.len() || x.is_empty() {
        return None;
    }

    let n = x.len() as f64;
    let sum_x: f64 = x.iter().sum();
    let sum_y: f64 = y.iter().sum();
    let sum_xy: f64 = x.iter().zip(y.iter()).map(|(xi, yi)| xi * yi).sum();
    let sum_x2: f64 = x.iter().map(|xi| xi * xi).sum();

    let denominator = n * sum_x2 - sum_x * sum_x;
    if denominator.abs() < 1e-10 {
        return None;
    }

    let slope = (n * sum_xy - sum_x * sum_y) / denominator;
    Some(slope)
}

/// Per-step slope of an evenly spaced series; 0 when it cannot be fitted.
pub fn trend_slope(values: &[f64]) -> f64 {
    let x: Vec<f64> = (0..values.len()).map(|i| i as f64).collect();
    linear_regression_slope(&x, values)
        .filter(|slope| slope.is_finite())
        .unwrap_or(0.0)
}

/// Slope of the series divided by its mean, i.e. relative change per step.
/// A zero (or near-zero) mean yields 0.
pub fn normalized_slope(values: &[f64]) -> f64 {
    let avg = mean(values);
    if avg.abs() < 1e-12 {
        return 0.0;
    }
    trend_slope(values) / avg
}
