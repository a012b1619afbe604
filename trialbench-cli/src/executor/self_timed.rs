//! Self-Timed Benchmarks
//!
//! The program does its own repetitions and statistics. It receives the
//! constraints as `BENCHMARK_*` environment variables, runs under the overall
//! timeout and prints `mean stdev n` on standard output.

use super::{INTERRUPTED_MESSAGE, SearchPath};
use crate::manifest::SelfTimedDef;
use crate::process::{ProcessOutcome, ProcessRunner, describe_status};
use std::process::{Command, Stdio};
use trialbench_core::{Benchmark, Constraints, Measurement, ProducerError, RunError};

/// A benchmark program that reports its own timing
pub struct SelfTimedBenchmark {
    def: SelfTimedDef,
    search: SearchPath,
    runner: ProcessRunner,
}

impl SelfTimedBenchmark {
    pub fn new(def: SelfTimedDef, search: SearchPath, runner: ProcessRunner) -> Self {
        Self {
            def,
            search,
            runner,
        }
    }
}

impl Benchmark for SelfTimedBenchmark {
    fn description(&self) -> Option<&str> {
        self.def.description.as_deref()
    }

    fn measure(&self, constraints: &Constraints) -> Result<Measurement, RunError> {
        let (program, args) = self
            .def
            .command
            .split_first()
            .ok_or_else(|| ProducerError::new("Command cannot be empty"))?;

        let mut command = Command::new(self.search.find(program)?);
        command
            .args(args)
            .envs(constraints.as_environment())
            .stdin(Stdio::null())
            .stderr(Stdio::null());

        let (outcome, stdout) = self
            .runner
            .run_captured(&mut command, constraints.timeout())
            .map_err(ProducerError::from)?;

        match outcome {
            ProcessOutcome::Exited { status, .. } if status.success() => {
                Ok(parse_result(&String::from_utf8_lossy(&stdout))?)
            }
            ProcessOutcome::Exited { status, .. } => Err(ProducerError::new(format!(
                "Benchmark exited with {}",
                describe_status(status)
            ))
            .into()),
            ProcessOutcome::TimedOut => Err(RunError::Timeout {
                timeout: constraints.timeout(),
            }),
            ProcessOutcome::Interrupted => Err(ProducerError::new(INTERRUPTED_MESSAGE).into()),
        }
    }
}

/// Parse the `mean stdev n` line a self-timed benchmark prints.
pub fn parse_result(text: &str) -> Result<Measurement, ProducerError> {
    let malformed = || ProducerError::new("Benchmark result string not in format '%g %g %d'");

    let words: Vec<&str> = text.split_whitespace().collect();
    let [mean, stdev, n] = words.as_slice() else {
        return Err(malformed());
    };
    let mean: f64 = mean.parse().map_err(|_| malformed())?;
    let stdev: f64 = stdev.parse().map_err(|_| malformed())?;
    let n: usize = n.parse().map_err(|_| malformed())?;

    if !(mean.is_finite() && stdev.is_finite()) || mean < 0.0 || stdev < 0.0 || n == 0 {
        return Err(ProducerError::new(format!(
            "Benchmark reported an invalid result: {}",
            text.trim()
        )));
    }
    Ok(Measurement::new(mean, stdev, n))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_result() {
        let m = parse_result("1.5e-6 2e-8 1000\n").unwrap();
        assert_eq!(m, Measurement::new(1.5e-6, 2e-8, 1000));
        assert!(m.warning.is_none());
    }

    #[test]
    fn test_parse_result_rejects_garbage() {
        for text in ["", "1 2", "1 2 3 4", "a 2 3", "1 2 3.5", "1 2 -3"] {
            let err = parse_result(text).unwrap_err();
            assert_eq!(
                err.message(),
                "Benchmark result string not in format '%g %g %d'",
                "input {:?}",
                text
            );
        }
    }

    #[test]
    fn test_parse_result_rejects_invalid_values() {
        for text in ["-1 0 3", "1 -0.5 3", "nan 0 3", "inf 0 3", "1 0 0"] {
            let err = parse_result(text).unwrap_err();
            assert!(err.message().starts_with("Benchmark reported an invalid result"));
        }
    }

    #[cfg(unix)]
    mod process {
        use super::*;
        use crate::manifest::{BenchmarkDef, ManifestKind, parse_manifest};
        use std::time::{Duration, Instant};

        fn bench(script: &str) -> SelfTimedBenchmark {
            let manifest = serde_json::json!({
                "b": { "description": "self", "command": ["/bin/sh", "-c", script] }
            })
            .to_string();
            let mut defs = parse_manifest(&manifest, ManifestKind::SelfTimed).unwrap();
            let Some(BenchmarkDef::SelfTimed(def)) = defs.remove("b") else {
                panic!("manifest must define a self-timed benchmark named b");
            };
            SelfTimedBenchmark::new(def, SearchPath::default(), ProcessRunner::new())
        }

        #[test]
        fn test_reports_program_output() {
            let m = bench("echo 0.25 0.01 42")
                .measure(&Constraints::default())
                .unwrap();
            assert_eq!(m, Measurement::new(0.25, 0.01, 42));
        }

        #[test]
        fn test_constraints_reach_environment() {
            let constraints =
                Constraints::new(Some(Duration::from_secs(30)), Some(7), 0.1, 0.5, 2).unwrap();
            let m = bench("echo 1 0 $BENCHMARK_REPETITIONS")
                .measure(&constraints)
                .unwrap();
            assert_eq!(m.n, 7);
            let m = bench("echo $BENCHMARK_QUANTILE 0 $BENCHMARK_WARMUP")
                .measure(&constraints)
                .unwrap();
            assert_eq!((m.mean, m.n), (0.5, 2));
        }

        #[test]
        fn test_nonzero_exit() {
            let err = bench("echo 1 0 3; exit 5")
                .measure(&Constraints::default())
                .unwrap_err();
            assert_eq!(err.to_string(), "Benchmark exited with error code 5");
        }

        #[test]
        fn test_timeout() {
            let constraints =
                Constraints::new(Some(Duration::from_millis(200)), Some(100), 0.2, 1.0, 0).unwrap();
            let started = Instant::now();
            let err = bench("sleep 10").measure(&constraints).unwrap_err();
            assert!(matches!(err, RunError::Timeout { .. }));
            assert!(started.elapsed() < Duration::from_secs(5));
        }
    }
}
