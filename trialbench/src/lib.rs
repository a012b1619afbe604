#![warn(missing_docs)]
//! # Trialbench
//!
//! Adaptive benchmark runner with convergence detection and regression
//! tracking.
//!
//! Trialbench runs each benchmark as often as needed for the timing to settle:
//! - **Adaptive sampling**: trials repeat until the relative standard deviation
//!   of the kept samples drops below the significance target, the repetition
//!   cap is hit or the timeout expires
//! - **Sample filtering**: leading warmup trials are dropped and only the
//!   fastest quantile is kept
//! - **History**: results are recorded per benchmark and compared against the
//!   best on record as a trend in sigmas, raising alerts past a threshold
//! - **Two benchmark kinds**: command lines timed externally, one child process
//!   per trial, and self-timed programs that report `mean stdev n`
//!
//! ## Library Use
//!
//! Anything that can produce one timed trial at a time plugs into the engine
//! through [`SampleProducer`]:
//!
//! ```
//! use std::time::Duration;
//! use trialbench::{Constraints, ProducerError, SampleProducer, TrialOutcome, run_to_convergence};
//!
//! struct Fixed;
//!
//! impl SampleProducer for Fixed {
//!     fn run_trial(&mut self, _deadline: Option<Duration>) -> Result<TrialOutcome, ProducerError> {
//!         Ok(TrialOutcome::Completed(Duration::from_millis(2)))
//!     }
//! }
//!
//! let m = run_to_convergence(&mut Fixed, &Constraints::default()).unwrap();
//! assert_eq!(m.n, 3);
//! ```
//!
//! ## Command Line
//!
//! ```text
//! trialbench run -M benchmarks.json -X ./compiler -H history.json -A 3
//! ```

// Re-export the engine
pub use trialbench_core::{
    Benchmark, BenchmarkOutcome, Budget, CollectionOptions, CollectionRunner, CollectionSummary,
    Constraints, ConstraintsError, ConvergenceEngine, DEFAULT_REPETITIONS, Estimate,
    HistoryEntry, HistoryError, HistoryStore, Measurement, ProducerError, ReportSink, RunError,
    SampleProducer, Step, TrialOutcome, run_to_convergence,
};

// Re-export stats
pub use trialbench_stats::{
    DEFAULT_QUANTILE, DEFAULT_SIGNIFICANCE, SampleSummary, SummaryError, compute_summary,
    compute_trend, filter_samples, is_alert, is_converged, min_samples_needed,
};

// Re-export reporting
pub use trialbench_report::{
    BenchmarkStatus, OutputFormat, Report, ReportBuilder, ReportConfig, Tee, TimeUnit,
    format_time, generate_json_report, parse_json_report,
};

// Re-export the manifest-driven runner
pub use trialbench_cli::{
    BenchmarkDef, JsonHistory, ManifestBenchmark, ManifestKind, ProcessRunner, SearchPath,
    TerminalReporter, TrialbenchConfig, build_report_meta, load_manifest, parse_manifest,
};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{
        Benchmark, CollectionOptions, CollectionRunner, Constraints, HistoryStore, Measurement,
        ProducerError, ReportSink, SampleProducer, TrialOutcome, run_to_convergence,
    };
}

/// Run the Trialbench command line and return its exit status.
///
/// ```ignore
/// fn main() {
///     std::process::exit(trialbench::run().unwrap_or(1));
/// }
/// ```
pub use trialbench_cli::run;
