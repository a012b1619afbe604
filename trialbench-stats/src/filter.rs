//! Sample Filtering
//!
//! Raw durations are filtered in two steps before any statistics are computed:
//!
//! ```text
//! raw (arrival order) ──► drop first `warmup` ──► sort ascending ──► keep fastest round(q * len)
//! ```
//!
//! Dropping happens in arrival order so the slow first runs (cold caches, page
//! faults) are discarded no matter how fast they were. The quantile then keeps
//! the smallest samples, trimming the noisy upper tail.

use crate::MIN_FILTERED_SAMPLES;

/// Number of raw samples needed before statistics can be computed.
///
/// Equals `ceil(3 / quantile) + warmup`, which guarantees at least
/// [`MIN_FILTERED_SAMPLES`] samples survive filtering. Saturates at
/// `usize::MAX` for warmups no run can reach.
pub fn min_samples_needed(warmup: usize, quantile: f64) -> usize {
    ((MIN_FILTERED_SAMPLES as f64 / quantile).ceil() as usize).saturating_add(warmup)
}

/// Number of samples kept out of `raw_len` raw samples.
///
/// Halfway cases round to even.
pub fn filtered_len(raw_len: usize, warmup: usize, quantile: f64) -> usize {
    let remaining = raw_len.saturating_sub(warmup);
    let kept = (quantile * remaining as f64).round_ties_even() as usize;
    kept.min(remaining)
}

/// Apply warmup and quantile filtering to raw samples.
///
/// The input is left untouched; the result is sorted ascending.
pub fn filter_samples(raw: &[f64], warmup: usize, quantile: f64) -> Vec<f64> {
    let mut data: Vec<f64> = raw.iter().skip(warmup).copied().collect();
    data.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    data.truncate(filtered_len(raw.len(), warmup, quantile));
    data
}
