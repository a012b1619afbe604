#![warn(missing_docs)]
//! Trialbench Statistics
//!
//! Pure functions behind the adaptive sampling policy:
//! - Warmup and quantile filtering of raw trial durations
//! - Mean and unbiased sample standard deviation
//! - Convergence test against a relative significance target
//! - Trend score against a historical best result, plus the alert policy

mod filter;
mod summary;
mod trend;

pub use filter::{filter_samples, filtered_len, min_samples_needed};
pub use summary::{SampleSummary, SummaryError, compute_summary, is_converged};
pub use trend::{Estimate, compute_trend, is_alert};

/// Smallest number of filtered samples the policy ever computes statistics from
pub const MIN_FILTERED_SAMPLES: usize = 3;

/// Default relative standard deviation that stops collection
pub const DEFAULT_SIGNIFICANCE: f64 = 0.2;

/// Default fraction of the fastest samples kept for statistics
pub const DEFAULT_QUANTILE: f64 = 1.0;
