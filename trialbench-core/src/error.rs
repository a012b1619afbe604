//! Error types

use std::time::Duration;
use thiserror::Error;
use trialbench_stats::SummaryError;

/// Why a single benchmark produced no result
#[derive(Debug, Error)]
pub enum RunError {
    /// The time budget ran out before enough samples were collected
    #[error("{}", timeout_message(.timeout))]
    Timeout {
        /// The configured budget, if any
        timeout: Option<Duration>,
    },

    /// A trial failed in a way that invalidates the whole benchmark
    #[error(transparent)]
    Producer(#[from] ProducerError),

    /// Collected samples could not be summarized
    #[error("cannot summarize samples: {0}")]
    Statistics(#[from] SummaryError),
}

fn timeout_message(timeout: &Option<Duration>) -> String {
    match timeout {
        Some(t) => format!(
            "Timeout ({:.2} s) expired before a result could be obtained",
            t.as_secs_f64()
        ),
        None => "Timeout expired before a result could be obtained".to_string(),
    }
}

/// Unrecoverable trial failure reported by a sample producer
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ProducerError {
    message: String,
}

impl ProducerError {
    /// Create a failure with the given reason
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// The failure reason
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<std::io::Error> for ProducerError {
    fn from(e: std::io::Error) -> Self {
        Self::new(e.to_string())
    }
}

/// Rejected constraint values
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConstraintsError {
    #[error("timeout must be positive")]
    Timeout,
    #[error("repetitions must be greater than 3, got {0}")]
    Repetitions(u64),
    #[error("significance must be positive and finite, got {0}")]
    Significance(f64),
    #[error("quantile must be in (0, 1], got {0}")]
    Quantile(f64),
}

/// Errors from a history store
#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("history I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("history database is corrupt: {0}")]
    Corrupt(String),

    #[error("no benchmark named '{0}' in the history database")]
    UnknownBenchmark(String),

    #[error("history database is read-only")]
    ReadOnly,
}
