//! Report Collection
//!
//! `ReportBuilder` listens to a collection run and accumulates a [`Report`];
//! `Tee` forwards each event to several sinks so a run can stream to the
//! terminal and build a JSON report at the same time.

use crate::report::{
    BenchmarkMetrics, BenchmarkReportResult, BenchmarkStatus, FailureInfo, Report, ReportMeta,
    ReportSummary,
};
use trialbench_core::{BenchmarkOutcome, CollectionSummary, ReportSink};

/// Sink that accumulates a serializable report
pub struct ReportBuilder {
    meta: ReportMeta,
    results: Vec<BenchmarkReportResult>,
    summary: ReportSummary,
}

impl ReportBuilder {
    /// Start a report with the given metadata
    pub fn new(meta: ReportMeta) -> Self {
        Self {
            meta,
            results: Vec::new(),
            summary: ReportSummary::default(),
        }
    }

    /// Finish and return the report
    pub fn into_report(self) -> Report {
        Report {
            meta: self.meta,
            results: self.results,
            summary: self.summary,
        }
    }
}

impl ReportSink for ReportBuilder {
    fn begin(&mut self, planned: usize, _has_duplicates: bool) {
        self.results.reserve(planned);
        self.summary.total_benchmarks = planned;
    }

    fn emit(&mut self, name: &str, description: Option<&str>, outcome: &BenchmarkOutcome) {
        let mut result = BenchmarkReportResult {
            id: name.to_string(),
            description: description.map(str::to_string),
            status: BenchmarkStatus::Skipped,
            metrics: None,
            trend: None,
            alerted: false,
            warning: None,
            failure: None,
        };

        match outcome {
            BenchmarkOutcome::Success {
                measurement,
                trend,
                alerted,
            } => {
                result.status = BenchmarkStatus::Passed;
                result.metrics = Some(BenchmarkMetrics::from(measurement));
                result.trend = *trend;
                result.alerted = *alerted;
                result.warning = measurement.warning.clone();
                self.summary.passed += 1;
                if *alerted {
                    self.summary.alerts += 1;
                }
            }
            BenchmarkOutcome::Failure { reason } => {
                result.status = BenchmarkStatus::Failed;
                result.failure = Some(FailureInfo {
                    message: reason.clone(),
                });
                self.summary.failed += 1;
            }
            BenchmarkOutcome::Skipped => {
                self.summary.skipped += 1;
            }
        }

        self.results.push(result);
    }

    fn finish(&mut self, summary: &CollectionSummary) {
        self.summary.failure_count = summary.failure_count();
        self.summary.interrupted = summary.interrupted;
        self.summary.total_duration_ms = summary.elapsed.as_secs_f64() * 1000.0;
    }
}

/// Forwards every event to each inner sink in order
pub struct Tee<'a> {
    sinks: Vec<&'a mut dyn ReportSink>,
}

impl<'a> Tee<'a> {
    /// Fan out to `sinks`
    pub fn new(sinks: Vec<&'a mut dyn ReportSink>) -> Self {
        Self { sinks }
    }
}

impl ReportSink for Tee<'_> {
    fn begin(&mut self, planned: usize, has_duplicates: bool) {
        for sink in &mut self.sinks {
            sink.begin(planned, has_duplicates);
        }
    }

    fn started(&mut self, name: &str) {
        for sink in &mut self.sinks {
            sink.started(name);
        }
    }

    fn emit(&mut self, name: &str, description: Option<&str>, outcome: &BenchmarkOutcome) {
        for sink in &mut self.sinks {
            sink.emit(name, description, outcome);
        }
    }

    fn finish(&mut self, summary: &CollectionSummary) {
        for sink in &mut self.sinks {
            sink.finish(summary);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::{ReportConfig, SystemInfo};
    use crate::{generate_json_report, parse_json_report};
    use trialbench_core::{CollectionOptions, Constraints, Measurement};

    fn dummy_meta() -> ReportMeta {
        ReportMeta {
            schema_version: crate::SCHEMA_VERSION,
            version: "0.1.0".to_string(),
            timestamp: chrono::Utc::now(),
            git_commit: None,
            git_branch: None,
            system: SystemInfo {
                os: "linux".to_string(),
                arch: "x86_64".to_string(),
                cpu: "test".to_string(),
                cpu_cores: 1,
            },
            config: ReportConfig::new(&Constraints::default(), &CollectionOptions::default()),
        }
    }

    fn feed(sink: &mut dyn ReportSink) {
        sink.begin(3, false);
        sink.emit(
            "fast",
            Some("a fast one"),
            &BenchmarkOutcome::Success {
                measurement: Measurement::new(0.5, 0.01, 10)
                    .with_warning("Timing results did not converge within 10 runs"),
                trend: Some(4.0),
                alerted: true,
            },
        );
        sink.emit(
            "broken",
            None,
            &BenchmarkOutcome::Failure {
                reason: "Cannot find file: gen.sh".to_string(),
            },
        );
        sink.emit("late", None, &BenchmarkOutcome::Skipped);

        let mut summary = CollectionSummary {
            planned: 3,
            interrupted: true,
            ..Default::default()
        };
        summary.failures.insert("broken".to_string());
        summary.alerts.insert("fast".to_string());
        sink.finish(&summary);
    }

    #[test]
    fn test_builder_accumulates() {
        let mut builder = ReportBuilder::new(dummy_meta());
        feed(&mut builder);
        let report = builder.into_report();

        assert_eq!(report.results.len(), 3);
        assert_eq!(report.summary.total_benchmarks, 3);
        assert_eq!(report.summary.passed, 1);
        assert_eq!(report.summary.failed, 1);
        assert_eq!(report.summary.skipped, 1);
        assert_eq!(report.summary.alerts, 1);
        assert_eq!(report.summary.failure_count, 2);
        assert!(report.summary.interrupted);

        let fast = &report.results[0];
        assert_eq!(fast.status, BenchmarkStatus::Passed);
        assert_eq!(fast.metrics.as_ref().unwrap().samples, 10);
        assert!(fast.warning.is_some());
        assert_eq!(report.results[1].status, BenchmarkStatus::Failed);
        assert_eq!(report.results[2].status, BenchmarkStatus::Skipped);
    }

    #[test]
    fn test_json_shape() {
        let mut builder = ReportBuilder::new(dummy_meta());
        feed(&mut builder);
        let report = builder.into_report();

        let json = generate_json_report(&report).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["results"][0]["status"], "passed");
        assert_eq!(value["results"][1]["failure"]["message"], "Cannot find file: gen.sh");
        assert_eq!(value["meta"]["config"]["max_repetitions"], 100);

        let parsed = parse_json_report(&json).unwrap();
        assert_eq!(parsed.results.len(), 3);
    }

    #[test]
    fn test_tee_forwards_to_all() {
        let mut a = ReportBuilder::new(dummy_meta());
        let mut b = ReportBuilder::new(dummy_meta());
        {
            let mut tee = Tee::new(vec![&mut a as &mut dyn ReportSink, &mut b]);
            feed(&mut tee);
        }
        assert_eq!(a.into_report().results.len(), 3);
        assert_eq!(b.into_report().summary.failure_count, 2);
    }
}
