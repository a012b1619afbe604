//! Collection Runner
//!
//! Sequences a selection of benchmarks through their measurement, compares
//! each result against the best one on record and reports one outcome per
//! benchmark. Failures are counted, never propagated: one broken benchmark
//! does not stop the suite.

use crate::error::{HistoryError, RunError};
use crate::{Constraints, Measurement};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use trialbench_stats::{Estimate, compute_trend, is_alert};

/// A benchmark definition that can be measured under given constraints
pub trait Benchmark {
    /// Free-form description shown next to results
    fn description(&self) -> Option<&str> {
        None
    }

    /// Measure the benchmark once to a converged (or given-up) result
    fn measure(&self, constraints: &Constraints) -> Result<Measurement, RunError>;
}

/// One recorded result of a benchmark
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryEntry {
    /// POSIX timestamp of the run
    pub timestamp: i64,
    /// Mean in seconds
    pub mean: f64,
    /// Standard deviation in seconds
    pub stdev: f64,
    /// Number of filtered samples
    pub n: usize,
}

impl HistoryEntry {
    /// Entry for `measurement` stamped with the current time
    pub fn now(measurement: &Measurement) -> Self {
        Self {
            timestamp: chrono::Utc::now().timestamp(),
            mean: measurement.mean,
            stdev: measurement.stdev,
            n: measurement.n,
        }
    }
}

/// Ledger of past results keyed by benchmark name
pub trait HistoryStore {
    /// Best recorded result for `name`
    fn best(&self, name: &str) -> Option<Estimate>;

    /// Record a new result, registering or updating the description
    fn append(
        &mut self,
        name: &str,
        description: Option<&str>,
        entry: HistoryEntry,
    ) -> Result<(), HistoryError>;
}

/// What happened to one benchmark in a collection run
#[derive(Debug, Clone, PartialEq)]
pub enum BenchmarkOutcome {
    /// A result was obtained
    Success {
        /// The result, possibly with a convergence warning
        measurement: Measurement,
        /// Score against the historical best, if one exists
        trend: Option<f64>,
        /// Whether the trend crossed the alert threshold
        alerted: bool,
    },
    /// No result could be obtained
    Failure {
        /// Human-readable reason
        reason: String,
    },
    /// Not attempted because the run was interrupted
    Skipped,
}

/// Consumer of per-benchmark outcomes, called in selection order
pub trait ReportSink {
    /// Called once before the first benchmark
    fn begin(&mut self, _planned: usize, _has_duplicates: bool) {}

    /// Called right before a benchmark starts measuring
    fn started(&mut self, _name: &str) {}

    /// Called exactly once per selected benchmark
    fn emit(&mut self, name: &str, description: Option<&str>, outcome: &BenchmarkOutcome);

    /// Called once after the last benchmark
    fn finish(&mut self, _summary: &CollectionSummary) {}
}

/// Options for one collection run
#[derive(Debug, Clone, Copy, Default)]
pub struct CollectionOptions {
    /// Append successful results to the history
    pub update: bool,
    /// Trend threshold (in sigmas) at or above which a result alerts
    pub alert: Option<f64>,
}

/// Aggregate of a collection run
#[derive(Debug, Clone, Default)]
pub struct CollectionSummary {
    /// Number of benchmarks in the selection, duplicates included
    pub planned: usize,
    /// Names that produced a result
    pub successes: BTreeSet<String>,
    /// Names that failed
    pub failures: BTreeSet<String>,
    /// Names whose result raised a regression alert
    pub alerts: BTreeSet<String>,
    /// Number of selection entries skipped after an interrupt
    pub skipped: usize,
    /// Wall-clock time of the whole run
    pub elapsed: Duration,
    /// Alert threshold in effect
    pub alert_threshold: Option<f64>,
    /// Whether a history store took part
    pub history_enabled: bool,
    /// Whether the run was interrupted
    pub interrupted: bool,
}

impl CollectionSummary {
    /// Number of distinct benchmarks that failed or alerted
    pub fn failure_count(&self) -> usize {
        self.failures.union(&self.alerts).count()
    }
}

/// Runs a selection of benchmarks one after another
pub struct CollectionRunner<'a> {
    constraints: &'a Constraints,
    options: CollectionOptions,
    interrupt: Option<&'a AtomicBool>,
}

impl<'a> CollectionRunner<'a> {
    /// Create a runner for the given constraints
    pub fn new(constraints: &'a Constraints, options: CollectionOptions) -> Self {
        Self {
            constraints,
            options,
            interrupt: None,
        }
    }

    /// Stop starting new benchmarks once `flag` is set
    pub fn with_interrupt(mut self, flag: &'a AtomicBool) -> Self {
        self.interrupt = Some(flag);
        self
    }

    fn interrupted(&self) -> bool {
        self.interrupt.is_some_and(|f| f.load(Ordering::Relaxed))
    }

    /// Run `selection` (or every definition, sorted by name, when empty).
    pub fn run<B: Benchmark>(
        &self,
        selection: &[String],
        definitions: &BTreeMap<String, B>,
        mut history: Option<&mut dyn HistoryStore>,
        sink: &mut dyn ReportSink,
    ) -> CollectionSummary {
        let selection: Vec<&str> = if selection.is_empty() {
            definitions.keys().map(String::as_str).collect()
        } else {
            selection.iter().map(String::as_str).collect()
        };

        let distinct: BTreeSet<&str> = selection.iter().copied().collect();
        let has_duplicates = distinct.len() < selection.len();
        if has_duplicates {
            tracing::warn!("benchmark selection contains duplicates");
        }

        let mut summary = CollectionSummary {
            planned: selection.len(),
            alert_threshold: self.options.alert,
            history_enabled: history.is_some(),
            ..Default::default()
        };

        sink.begin(selection.len(), has_duplicates);
        let start = Instant::now();

        for name in selection {
            if self.interrupted() {
                summary.skipped += 1;
                sink.emit(name, None, &BenchmarkOutcome::Skipped);
                continue;
            }

            let Some(bench) = definitions.get(name) else {
                summary.failures.insert(name.to_string());
                sink.emit(
                    name,
                    None,
                    &BenchmarkOutcome::Failure {
                        reason: "No definition for this benchmark in the manifest file".to_string(),
                    },
                );
                continue;
            };
            let description = bench.description();

            sink.started(name);
            tracing::debug!(benchmark = name, "measuring");
            let measurement = match bench.measure(self.constraints) {
                Ok(m) => m,
                Err(e) => {
                    tracing::debug!(benchmark = name, error = %e, "benchmark failed");
                    summary.failures.insert(name.to_string());
                    sink.emit(
                        name,
                        description,
                        &BenchmarkOutcome::Failure {
                            reason: e.to_string(),
                        },
                    );
                    continue;
                }
            };

            // The best must be read before this run's entry lands in the history.
            let best = history.as_deref().and_then(|h| h.best(name));

            if self.options.update {
                if let Some(h) = history.as_deref_mut() {
                    if let Err(e) = h.append(name, description, HistoryEntry::now(&measurement)) {
                        summary.failures.insert(name.to_string());
                        sink.emit(
                            name,
                            description,
                            &BenchmarkOutcome::Failure {
                                reason: format!("Cannot record result: {e}"),
                            },
                        );
                        continue;
                    }
                }
            }

            let trend = compute_trend(measurement.estimate(), best);
            let alerted = is_alert(trend, self.options.alert);

            summary.successes.insert(name.to_string());
            if alerted {
                summary.alerts.insert(name.to_string());
            }
            sink.emit(
                name,
                description,
                &BenchmarkOutcome::Success {
                    measurement,
                    trend,
                    alerted,
                },
            );
        }

        summary.elapsed = start.elapsed();
        summary.interrupted = self.interrupted();
        sink.finish(&summary);
        summary
    }
}
