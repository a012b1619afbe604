//! Convergence Constraints
//!
//! An immutable, validated bundle handed to every benchmark explicitly.
//! Self-timed benchmarks that run out of process receive the same values as
//! `BENCHMARK_*` environment variables, built only at spawn time.

use crate::error::ConstraintsError;
use std::time::Duration;
use trialbench_stats::{DEFAULT_QUANTILE, DEFAULT_SIGNIFICANCE, min_samples_needed};

/// Default repetition cap
pub const DEFAULT_REPETITIONS: u64 = 100;

/// Policy controlling when a benchmark stops collecting samples
#[derive(Debug, Clone, PartialEq)]
pub struct Constraints {
    timeout: Option<Duration>,
    max_repetitions: Option<u64>,
    significance: f64,
    quantile: f64,
    warmup: usize,
}

impl Default for Constraints {
    fn default() -> Self {
        Self {
            timeout: None,
            max_repetitions: Some(DEFAULT_REPETITIONS),
            significance: DEFAULT_SIGNIFICANCE,
            quantile: DEFAULT_QUANTILE,
            warmup: 0,
        }
    }
}

impl Constraints {
    /// Validate and build a constraint set.
    ///
    /// * `timeout` - overall budget per benchmark, must be non-zero
    /// * `max_repetitions` - trial cap, must exceed 3
    /// * `significance` - target stdev/mean ratio, positive
    /// * `quantile` - fraction of fastest samples kept, in (0, 1]
    /// * `warmup` - number of leading samples discarded
    pub fn new(
        timeout: Option<Duration>,
        max_repetitions: Option<u64>,
        significance: f64,
        quantile: f64,
        warmup: usize,
    ) -> Result<Self, ConstraintsError> {
        if timeout.is_some_and(|t| t.is_zero()) {
            return Err(ConstraintsError::Timeout);
        }
        if let Some(reps) = max_repetitions {
            if reps <= 3 {
                return Err(ConstraintsError::Repetitions(reps));
            }
        }
        if !(significance > 0.0 && significance.is_finite()) {
            return Err(ConstraintsError::Significance(significance));
        }
        if !(quantile > 0.0 && quantile <= 1.0) {
            return Err(ConstraintsError::Quantile(quantile));
        }

        Ok(Self {
            timeout,
            max_repetitions,
            significance,
            quantile,
            warmup,
        })
    }

    /// Overall time budget per benchmark
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Hard cap on the number of trials
    pub fn max_repetitions(&self) -> Option<u64> {
        self.max_repetitions
    }

    /// Target relative standard deviation
    pub fn significance(&self) -> f64 {
        self.significance
    }

    /// Fraction of the fastest samples retained
    pub fn quantile(&self) -> f64 {
        self.quantile
    }

    /// Number of leading samples discarded
    pub fn warmup(&self) -> usize {
        self.warmup
    }

    /// Raw samples needed before statistics are computed
    pub fn min_samples_needed(&self) -> usize {
        min_samples_needed(self.warmup, self.quantile)
    }

    /// Environment variables describing these constraints to a self-timed
    /// benchmark program. Unset limits are omitted.
    pub fn as_environment(&self) -> Vec<(&'static str, String)> {
        let mut env = Vec::with_capacity(5);
        if let Some(timeout) = self.timeout {
            env.push(("BENCHMARK_TIMEOUT", timeout.as_secs_f64().to_string()));
        }
        if let Some(reps) = self.max_repetitions {
            env.push(("BENCHMARK_REPETITIONS", reps.to_string()));
        }
        env.push(("BENCHMARK_QUANTILE", self.quantile.to_string()));
        env.push(("BENCHMARK_SIGNIFICANCE", self.significance.to_string()));
        env.push(("BENCHMARK_WARMUP", self.warmup.to_string()));
        env
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let c = Constraints::default();
        assert_eq!(c.timeout(), None);
        assert_eq!(c.max_repetitions(), Some(100));
        assert_eq!(c.significance(), 0.2);
        assert_eq!(c.quantile(), 1.0);
        assert_eq!(c.warmup(), 0);
        assert_eq!(c.min_samples_needed(), 3);
    }

    #[test]
    fn test_validation() {
        assert_eq!(
            Constraints::new(Some(Duration::ZERO), None, 0.2, 1.0, 0),
            Err(ConstraintsError::Timeout)
        );
        assert_eq!(
            Constraints::new(None, Some(3), 0.2, 1.0, 0),
            Err(ConstraintsError::Repetitions(3))
        );
        assert!(matches!(
            Constraints::new(None, None, 0.0, 1.0, 0),
            Err(ConstraintsError::Significance(_))
        ));
        assert!(matches!(
            Constraints::new(None, None, f64::NAN, 1.0, 0),
            Err(ConstraintsError::Significance(_))
        ));
        assert!(matches!(
            Constraints::new(None, None, 0.2, 0.0, 0),
            Err(ConstraintsError::Quantile(_))
        ));
        assert!(matches!(
            Constraints::new(None, None, 0.2, 1.5, 0),
            Err(ConstraintsError::Quantile(_))
        ));
        assert!(Constraints::new(None, Some(4), 0.2, 1.0, 0).is_ok());
    }

    #[test]
    fn test_min_samples_with_warmup_and_quantile() {
        let c = Constraints::new(None, None, 0.2, 0.5, 2).unwrap();
        assert_eq!(c.min_samples_needed(), 8);
    }

    #[test]
    fn test_huge_warmup_does_not_overflow() {
        let c = Constraints::new(None, Some(10), 0.2, 1.0, usize::MAX).unwrap();
        assert_eq!(c.min_samples_needed(), usize::MAX);
    }

    #[test]
    fn test_environment() {
        let c = Constraints::new(Some(Duration::from_secs(30)), Some(50), 0.1, 0.5, 2).unwrap();
        let env = c.as_environment();
        assert_eq!(
            env,
            vec![
                ("BENCHMARK_TIMEOUT", "30".to_string()),
                ("BENCHMARK_REPETITIONS", "50".to_string()),
                ("BENCHMARK_QUANTILE", "0.5".to_string()),
                ("BENCHMARK_SIGNIFICANCE", "0.1".to_string()),
                ("BENCHMARK_WARMUP", "2".to_string()),
            ]
        );

        let unbounded = Constraints::new(None, None, 0.2, 1.0, 0).unwrap();
        let keys: Vec<_> = unbounded.as_environment().into_iter().map(|(k, _)| k).collect();
        assert_eq!(
            keys,
            vec!["BENCHMARK_QUANTILE", "BENCHMARK_SIGNIFICANCE", "BENCHMARK_WARMUP"]
        );
    }
}
