//! Report Data Structures

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use trialbench_core::{CollectionOptions, Constraints, Measurement};

/// Version of the JSON layout below
pub const SCHEMA_VERSION: u32 = 1;

/// Complete benchmark report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub meta: ReportMeta,
    pub results: Vec<BenchmarkReportResult>,
    pub summary: ReportSummary,
}

/// Report metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportMeta {
    pub schema_version: u32,
    pub version: String,
    pub timestamp: DateTime<Utc>,
    pub git_commit: Option<String>,
    pub git_branch: Option<String>,
    pub system: SystemInfo,
    pub config: ReportConfig,
}

/// Constraints and options captured in report metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportConfig {
    pub timeout_secs: Option<f64>,
    pub max_repetitions: Option<u64>,
    pub significance: f64,
    pub quantile: f64,
    pub warmup: usize,
    pub alert_threshold: Option<f64>,
    pub update_history: bool,
}

impl ReportConfig {
    /// Capture the settings a collection ran with
    pub fn new(constraints: &Constraints, options: &CollectionOptions) -> Self {
        Self {
            timeout_secs: constraints.timeout().map(|t| t.as_secs_f64()),
            max_repetitions: constraints.max_repetitions(),
            significance: constraints.significance(),
            quantile: constraints.quantile(),
            warmup: constraints.warmup(),
            alert_threshold: options.alert,
            update_history: options.update,
        }
    }
}

/// System information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemInfo {
    pub os: String,
    pub arch: String,
    pub cpu: String,
    pub cpu_cores: u32,
}

/// Individual benchmark result in the report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchmarkReportResult {
    pub id: String,
    pub description: Option<String>,
    pub status: BenchmarkStatus,
    pub metrics: Option<BenchmarkMetrics>,
    pub trend: Option<f64>,
    pub alerted: bool,
    pub warning: Option<String>,
    pub failure: Option<FailureInfo>,
}

/// Benchmark execution status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BenchmarkStatus {
    Passed,
    Failed,
    Skipped,
}

/// Benchmark timing metrics, in seconds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkMetrics {
    pub samples: usize,
    pub mean_s: f64,
    pub stdev_s: f64,
    pub relative_stdev: Option<f64>,
}

impl From<&Measurement> for BenchmarkMetrics {
    fn from(m: &Measurement) -> Self {
        Self {
            samples: m.n,
            mean_s: m.mean,
            stdev_s: m.stdev,
            relative_stdev: (m.mean != 0.0).then(|| m.stdev / m.mean),
        }
    }
}

/// Failure information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureInfo {
    pub message: String,
}

/// Report summary
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReportSummary {
    pub total_benchmarks: usize,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub alerts: usize,
    /// Distinct benchmarks that failed or alerted; non-zero fails the run
    pub failure_count: usize,
    pub interrupted: bool,
    pub total_duration_ms: f64,
}
