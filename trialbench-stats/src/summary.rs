//! Summary Statistics
//!
//! Mean and unbiased (n - 1) standard deviation of filtered samples, and the
//! relative-deviation convergence test built on them.

use thiserror::Error;

/// Mean, standard deviation and count of a filtered sample set
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SampleSummary {
    /// Arithmetic mean
    pub mean: f64,
    /// Sample standard deviation (Bessel-corrected)
    pub stdev: f64,
    /// Number of samples the statistics were computed from
    pub count: usize,
}

/// Errors from summary computation
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SummaryError {
    #[error("need at least 2 samples for a standard deviation, got {0}")]
    InsufficientSamples(usize),
    #[error("sample set contains a non-finite value")]
    NonFinite,
}

/// Compute mean and sample standard deviation.
pub fn compute_summary(samples: &[f64]) -> Result<SampleSummary, SummaryError> {
    if samples.len() < 2 {
        return Err(SummaryError::InsufficientSamples(samples.len()));
    }
    if samples.iter().any(|x| !x.is_finite()) {
        return Err(SummaryError::NonFinite);
    }

    let n = samples.len() as f64;
    let mean = samples.iter().sum::<f64>() / n;
    let variance = samples.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1.0);

    Ok(SampleSummary {
        mean,
        stdev: variance.sqrt(),
        count: samples.len(),
    })
}

/// Whether the relative deviation dropped below `significance`.
///
/// A zero mean never converges.
pub fn is_converged(summary: &SampleSummary, significance: f64) -> bool {
    summary.stdev < significance * summary.mean
}

impl SampleSummary {
    /// Relative standard deviation (stdev / mean), `None` for a zero mean
    pub fn relative_stdev(&self) -> Option<f64> {
        if self.mean == 0.0 {
            None
        } else {
            Some(self.stdev / self.mean)
        }
    }
}
