//! Benchmark Executor
//!
//! Turns validated manifest stanzas into runnable benchmarks. Command
//! benchmarks are timed here, one child process per trial, and driven by the
//! convergence engine; self-timed benchmarks run once and report their own
//! statistics.
//!
//! ## Pipeline Overview
//!
//! ```text
//! BenchmarkDef (validated manifest stanza)
//!       │
//!       ▼
//! ┌─────────────┐
//! │  resolve    │  search directories, scratch dir, placeholders
//! └──────┬──────┘
//!        │
//!        ▼
//! ┌─────────────┐
//! │  prepare    │  generators write their outputs (command benchmarks)
//! └──────┬──────┘
//!        │
//!        ▼
//! ┌─────────────┐
//! │  trials     │  ProcessRunner, one child per trial, until converged
//! └──────┬──────┘
//!        │
//!        ▼
//!   Measurement
//! ```
//!
//! ## Modules
//!
//! - [`command`] - Externally timed command benchmarks
//! - [`self_timed`] - Programs that time themselves
//! - [`metadata`] - System metadata for JSON reports

mod command;
mod metadata;
mod self_timed;

pub use command::CommandBenchmark;
pub use metadata::build_report_meta;
pub use self_timed::{SelfTimedBenchmark, parse_result};

use crate::manifest::BenchmarkDef;
use crate::process::ProcessRunner;
use std::path::{Path, PathBuf};
use trialbench_core::{Benchmark, Constraints, Measurement, ProducerError, RunError};

/// Failure reason of a benchmark whose trial was killed by an interrupt
pub const INTERRUPTED_MESSAGE: &str = "Canceled by interrupt";

/// Ordered list of directories where input files and programs are looked up
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchPath {
    directories: Vec<PathBuf>,
}

impl SearchPath {
    /// Search `directories` in order
    pub fn new(directories: Vec<PathBuf>) -> Self {
        Self { directories }
    }

    /// The first existing `dir/filename`. Absolute names are only checked as-is.
    pub fn find(&self, filename: &str) -> Result<PathBuf, ProducerError> {
        tracing::debug!("searching for file {:?}", filename);
        for directory in &self.directories {
            let path = directory.join(filename);
            let found = path.exists();
            tracing::trace!("  {}: {}", path.display(), if found { "yes" } else { "no" });
            if found {
                return Ok(path);
            }
        }
        Err(ProducerError::new(format!("Cannot find file: {}", filename)))
    }

    /// Resolve a path that may be relative to the search directories
    pub fn resolve(&self, path: &str) -> Result<PathBuf, ProducerError> {
        if Path::new(path).is_absolute() {
            Ok(PathBuf::from(path))
        } else {
            self.find(path)
        }
    }
}

impl Default for SearchPath {
    fn default() -> Self {
        Self::new(vec![PathBuf::from(".")])
    }
}

/// Any benchmark a manifest can define
pub enum ManifestBenchmark {
    Command(CommandBenchmark),
    SelfTimed(SelfTimedBenchmark),
}

impl ManifestBenchmark {
    /// Build a benchmark from its definition.
    ///
    /// Command definitions run `executable`; self-timed ones ignore it.
    pub fn new(
        def: BenchmarkDef,
        executable: Option<&Path>,
        search: &SearchPath,
        runner: ProcessRunner,
    ) -> anyhow::Result<Self> {
        match def {
            BenchmarkDef::Command(def) => {
                let executable = executable.ok_or_else(|| {
                    anyhow::anyhow!("command benchmarks need an executable (-X FILE)")
                })?;
                Ok(Self::Command(CommandBenchmark::new(
                    def,
                    executable.to_path_buf(),
                    search.clone(),
                    runner,
                )))
            }
            BenchmarkDef::SelfTimed(def) => Ok(Self::SelfTimed(SelfTimedBenchmark::new(
                def,
                search.clone(),
                runner,
            ))),
        }
    }
}

impl Benchmark for ManifestBenchmark {
    fn description(&self) -> Option<&str> {
        match self {
            ManifestBenchmark::Command(b) => b.description(),
            ManifestBenchmark::SelfTimed(b) => b.description(),
        }
    }

    fn measure(&self, constraints: &Constraints) -> Result<Measurement, RunError> {
        match self {
            ManifestBenchmark::Command(b) => b.measure(constraints),
            ManifestBenchmark::SelfTimed(b) => b.measure(constraints),
        }
    }
}
