#![warn(missing_docs)]
//! Trialbench Report - Result Collection and Serialization
//!
//! Turns the stream of per-benchmark outcomes into a serializable report:
//! - `ReportBuilder` is a `ReportSink` that accumulates results
//! - `Tee` fans one outcome stream out to several sinks
//! - JSON output for machine consumption
//! - Time formatting shared by the terminal output

mod collector;
mod format;
mod json;
mod report;

pub use collector::{ReportBuilder, Tee};
pub use format::{TimeUnit, format_time};
pub use json::{generate_json_report, parse_json_report};
pub use report::{
    BenchmarkMetrics, BenchmarkReportResult, BenchmarkStatus, FailureInfo, Report, ReportConfig,
    ReportMeta, ReportSummary, SCHEMA_VERSION, SystemInfo,
};

/// Output format selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// JSON with full schema
    Json,
    /// Human-readable terminal table
    #[default]
    Human,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(OutputFormat::Json),
            "human" | "text" => Ok(OutputFormat::Human),
            other => Err(format!("Unknown output format: {}", other)),
        }
    }
}
