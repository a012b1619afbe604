//! Convergence Engine
//!
//! Drives repeated trials of one benchmark and decides when to stop.
//!
//! ```text
//!            ┌──────────────┐  deadline   ┌────────────────┐
//!  budget ──►│  run_trial   │────────────►│ SampleProducer │
//!            └──────┬───────┘◄────────────└────────────────┘
//!                   │ duration | timed out | failure
//!                   ▼
//!            ┌──────────────┐
//!            │    record    │  filter, summarize, test convergence
//!            └──────┬───────┘
//!                   ▼
//!       Progress | Done(Measurement) | Fatal(RunError)
//! ```
//!
//! The deadline is measured from the start of the benchmark, not per trial.
//! A trial cut short by the deadline contributes no sample.

use crate::error::{ProducerError, RunError};
use crate::{Constraints, Measurement};
use std::time::{Duration, Instant};
use trialbench_stats::{compute_summary, filter_samples, is_converged};

/// Outcome of one trial that did not fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrialOutcome {
    /// The trial ran to completion in the given time
    Completed(Duration),
    /// The deadline passed before the trial finished; it was abandoned
    TimedOut,
}

/// Something that can run one timed trial of a benchmark
pub trait SampleProducer {
    /// One-time preparation before the first trial, under the same deadline.
    ///
    /// `Completed` carries the time preparation took; it is not a sample.
    fn prepare(&mut self, _deadline: Option<Duration>) -> Result<TrialOutcome, ProducerError> {
        Ok(TrialOutcome::Completed(Duration::ZERO))
    }

    /// Run exactly one trial, abandoning it once `deadline` has elapsed.
    fn run_trial(&mut self, deadline: Option<Duration>) -> Result<TrialOutcome, ProducerError>;
}

/// Time left for the next trial
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Budget {
    /// No timeout configured
    Unbounded,
    /// Time left before the benchmark's deadline
    Remaining(Duration),
    /// The deadline has passed; no further trial may start
    Expired,
}

impl Budget {
    /// Deadline to hand to the producer, `None` when unbounded or expired
    pub fn deadline(&self) -> Option<Duration> {
        match self {
            Budget::Remaining(d) => Some(*d),
            Budget::Unbounded | Budget::Expired => None,
        }
    }

    /// Whether the deadline has passed
    pub fn is_expired(&self) -> bool {
        matches!(self, Budget::Expired)
    }
}

/// Result of feeding one trial into the engine
#[derive(Debug)]
pub enum Step {
    /// Keep sampling
    Progress,
    /// Stop with a result, possibly carrying a convergence warning
    Done(Measurement),
    /// Stop without a result
    Fatal(RunError),
}

/// Stateful stopping policy for one benchmark run
pub struct ConvergenceEngine<'c> {
    constraints: &'c Constraints,
    started: Instant,
    raw: Vec<f64>,
    min_samples: usize,
}

impl<'c> ConvergenceEngine<'c> {
    /// Start a run now
    pub fn new(constraints: &'c Constraints) -> Self {
        Self::started_at(constraints, Instant::now())
    }

    /// Start a run whose deadline counts from `started`
    pub fn started_at(constraints: &'c Constraints, started: Instant) -> Self {
        Self {
            constraints,
            started,
            raw: Vec::new(),
            min_samples: constraints.min_samples_needed(),
        }
    }

    /// Time left before the deadline
    pub fn budget(&self) -> Budget {
        match self.constraints.timeout() {
            None => Budget::Unbounded,
            Some(timeout) => match timeout.checked_sub(self.started.elapsed()) {
                Some(remaining) if !remaining.is_zero() => Budget::Remaining(remaining),
                _ => Budget::Expired,
            },
        }
    }

    /// Feed the outcome of one iteration.
    ///
    /// `None` means the iteration produced no sample because the deadline
    /// expired, either before the trial could start or while it ran.
    pub fn record(&mut self, sample: Option<f64>) -> Step {
        let expired = sample.is_none();
        if let Some(seconds) = sample {
            self.raw.push(seconds);
        }

        if self.raw.len() < self.min_samples {
            if expired {
                return Step::Fatal(RunError::Timeout {
                    timeout: self.constraints.timeout(),
                });
            }
            return Step::Progress;
        }

        let filtered = filter_samples(
            &self.raw,
            self.constraints.warmup(),
            self.constraints.quantile(),
        );
        let summary = match compute_summary(&filtered) {
            Ok(summary) => summary,
            Err(e) => return Step::Fatal(e.into()),
        };
        let measurement = Measurement::new(summary.mean, summary.stdev, summary.count);

        tracing::debug!(
            raw = self.raw.len(),
            kept = summary.count,
            mean = summary.mean,
            stdev = summary.stdev,
            rsd = ?summary.relative_stdev(),
            "evaluated samples"
        );

        if is_converged(&summary, self.constraints.significance()) {
            return Step::Done(measurement);
        }
        if expired {
            let why = match self.constraints.timeout() {
                Some(timeout) => format!(
                    "Timing results did not converge within {:.2} seconds",
                    timeout.as_secs_f64()
                ),
                None => "Timing results did not converge before the deadline".to_string(),
            };
            return Step::Done(measurement.with_warning(why));
        }
        if let Some(reps) = self.constraints.max_repetitions() {
            if self.raw.len() as u64 >= reps {
                return Step::Done(measurement.with_warning(format!(
                    "Timing results did not converge within {reps} runs"
                )));
            }
        }
        Step::Progress
    }
}

/// Run `producer` until the constraints say stop.
///
/// Preparation runs first and counts against the timeout.
pub fn run_to_convergence<P>(
    producer: &mut P,
    constraints: &Constraints,
) -> Result<Measurement, RunError>
where
    P: SampleProducer + ?Sized,
{
    let mut engine = ConvergenceEngine::new(constraints);

    let budget = engine.budget();
    let prepared = if budget.is_expired() {
        TrialOutcome::TimedOut
    } else {
        producer.prepare(budget.deadline())?
    };
    match prepared {
        TrialOutcome::Completed(took) => {
            if !took.is_zero() {
                tracing::debug!("preparation finished after {:.4} seconds", took.as_secs_f64());
            }
        }
        TrialOutcome::TimedOut => {
            return Err(RunError::Timeout {
                timeout: constraints.timeout(),
            });
        }
    }

    loop {
        let budget = engine.budget();
        let sample = if budget.is_expired() {
            None
        } else {
            match producer.run_trial(budget.deadline())? {
                TrialOutcome::Completed(elapsed) => Some(elapsed.as_secs_f64()),
                TrialOutcome::TimedOut => None,
            }
        };

        match engine.record(sample) {
            Step::Progress => continue,
            Step::Done(measurement) => return Ok(measurement),
            Step::Fatal(e) => return Err(e),
        }
    }
}
