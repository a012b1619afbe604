#![warn(missing_docs)]
//! Trialbench Core - Adaptive Sampling Engine
//!
//! This crate decides how many times a benchmark runs and what its result is:
//! - `Constraints` bundle the convergence policy and are passed explicitly
//! - The convergence engine drives a `SampleProducer` until the filtered
//!   samples are tight enough, the repetition cap is hit, or time runs out
//! - The collection runner sequences many benchmarks, consults and updates the
//!   history, computes trends and hands one outcome per benchmark to a sink
//!
//! Nothing here spawns processes, formats output or touches the filesystem;
//! those live behind the `SampleProducer`, `Benchmark`, `HistoryStore` and
//! `ReportSink` traits.

mod collection;
mod constraints;
mod engine;
mod error;

pub use collection::{
    Benchmark, BenchmarkOutcome, CollectionOptions, CollectionRunner, CollectionSummary,
    HistoryEntry, HistoryStore, ReportSink,
};
pub use constraints::{Constraints, DEFAULT_REPETITIONS};
pub use engine::{
    Budget, ConvergenceEngine, SampleProducer, Step, TrialOutcome, run_to_convergence,
};
pub use error::{ConstraintsError, HistoryError, ProducerError, RunError};
pub use trialbench_stats::Estimate;

/// Result of a converged (or given-up) benchmark
#[derive(Debug, Clone, PartialEq)]
pub struct Measurement {
    /// Mean duration in seconds
    pub mean: f64,
    /// Sample standard deviation in seconds
    pub stdev: f64,
    /// Number of samples after warmup and quantile filtering
    pub n: usize,
    /// Why the result is less trustworthy than asked for, if it is
    pub warning: Option<String>,
}

impl Measurement {
    /// A measurement without warning
    pub fn new(mean: f64, stdev: f64, n: usize) -> Self {
        Self {
            mean,
            stdev,
            n,
            warning: None,
        }
    }

    /// Attach a non-fatal warning
    pub fn with_warning(mut self, warning: impl Into<String>) -> Self {
        self.warning = Some(warning.into());
        self
    }

    /// Mean and standard deviation as an estimate for trend computation
    pub fn estimate(&self) -> Estimate {
        Estimate::new(self.mean, self.stdev)
    }
}
