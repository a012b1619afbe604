//! Trend Against Historical Best
//!
//! The trend expresses how far the current result lies above the best result
//! ever recorded, in units of the combined standard deviation:
//!
//! ```text
//! trend = (m - M) / sqrt(s² + S²)
//! ```
//!
//! where `m ± s` is the current result and `M ± S` the historical best.
//! Positive values mean slower than the best, non-positive values mean at
//! least as fast.

/// A mean with its standard deviation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Estimate {
    /// Mean
    pub mean: f64,
    /// Standard deviation
    pub stdev: f64,
}

impl Estimate {
    /// Create an estimate
    pub fn new(mean: f64, stdev: f64) -> Self {
        Self { mean, stdev }
    }
}

/// Compute the trend of `current` against `best`.
///
/// Returns `None` without a best, when the combined deviation is zero, or when
/// the result is not finite.
pub fn compute_trend(current: Estimate, best: Option<Estimate>) -> Option<f64> {
    let best = best?;
    let sigma = (current.stdev.powi(2) + best.stdev.powi(2)).sqrt();
    if sigma == 0.0 || !sigma.is_finite() {
        return None;
    }
    let trend = (current.mean - best.mean) / sigma;
    trend.is_finite().then_some(trend)
}

/// Alert policy: a trend at or above the threshold raises an alert.
///
/// Without a threshold or a trend nothing alerts.
pub fn is_alert(trend: Option<f64>, threshold: Option<f64>) -> bool {
    match (trend, threshold) {
        (Some(trend), Some(threshold)) => trend >= threshold,
        _ => false,
    }
}
