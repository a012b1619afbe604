//! History Database
//!
//! A JSON file holding, per benchmark, an optional description and the
//! time-ordered list of recorded results. Every change rewrites the whole
//! file atomically: the new contents go to a temporary file in the same
//! directory, which then replaces the database.

use chrono::{Local, TimeZone};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use trialbench_core::{Estimate, HistoryEntry, HistoryError, HistoryStore};

const FORMAT_VERSION: u32 = 1;

/// One recorded result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
    /// POSIX timestamp
    pub timestamp: i64,
    /// Mean in seconds
    pub mean: f64,
    /// Standard deviation in seconds
    pub stdev: f64,
    /// Number of samples behind the result
    pub n: usize,
}

impl From<HistoryEntry> for HistoryRecord {
    fn from(e: HistoryEntry) -> Self {
        Self {
            timestamp: e.timestamp,
            mean: e.mean,
            stdev: e.stdev,
            n: e.n,
        }
    }
}

/// Everything recorded about one benchmark
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkHistory {
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub results: Vec<HistoryRecord>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Database {
    version: u32,
    #[serde(default)]
    benchmarks: BTreeMap<String, BenchmarkHistory>,
}

/// History database backed by a JSON file
#[derive(Debug)]
pub struct JsonHistory {
    path: PathBuf,
    db: Database,
    exists: bool,
    writable: bool,
}

impl JsonHistory {
    /// Open the database at `path` for a benchmark run.
    ///
    /// With `create`, results can be appended and a missing file is created on
    /// the first append. Without it the database is read-only, and a missing
    /// file behaves like an empty history.
    pub fn open(path: impl Into<PathBuf>, create: bool) -> Result<Self, HistoryError> {
        let path = path.into();
        let (db, exists) = match std::fs::read_to_string(&path) {
            Ok(text) => (parse(&text)?, true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => (Database::default(), false),
            Err(e) => return Err(e.into()),
        };
        tracing::debug!(path = %path.display(), exists, writable = create, "opened history");
        Ok(Self {
            path,
            db,
            exists,
            writable: create,
        })
    }

    /// Open an existing database for maintenance; a missing file is an error.
    pub fn open_existing(path: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let history = Self::open(path, true)?;
        if !history.exists {
            anyhow::bail!("Database does not exist: {}", history.path.display());
        }
        Ok(history)
    }

    /// Whether the file existed when opened or has been written since
    pub fn exists(&self) -> bool {
        self.exists
    }

    /// Path of the database file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Recorded benchmarks by name
    pub fn benchmarks(&self) -> &BTreeMap<String, BenchmarkHistory> {
        &self.db.benchmarks
    }

    /// History of one benchmark
    pub fn benchmark(&self, name: &str) -> Result<&BenchmarkHistory, HistoryError> {
        self.db
            .benchmarks
            .get(name)
            .ok_or_else(|| HistoryError::UnknownBenchmark(name.to_string()))
    }

    /// Remove every result of `name`
    pub fn drop_benchmark(&mut self, name: &str) -> Result<(), HistoryError> {
        let mut db = self.db.clone();
        if db.benchmarks.remove(name).is_none() {
            return Err(HistoryError::UnknownBenchmark(name.to_string()));
        }
        self.commit(db)?;
        tracing::info!(benchmark = name, "dropped benchmark from history");
        Ok(())
    }

    /// Remove all results recorded at or after `timestamp`; returns how many went
    pub fn drop_since(&mut self, timestamp: i64) -> Result<usize, HistoryError> {
        let mut db = self.db.clone();
        let mut removed = 0;
        for bench in db.benchmarks.values_mut() {
            let before = bench.results.len();
            bench.results.retain(|r| r.timestamp < timestamp);
            removed += before - bench.results.len();
        }
        self.commit(db)?;
        tracing::info!(removed, since = timestamp, "dropped results from history");
        Ok(removed)
    }

    /// Print benchmark names with their descriptions
    pub fn write_list(&self, out: &mut impl Write) -> io::Result<()> {
        for (name, bench) in &self.db.benchmarks {
            match &bench.description {
                Some(description) => writeln!(out, "{:20}  {}", name, description)?,
                None => writeln!(out, "{}", name)?,
            }
        }
        Ok(())
    }

    /// Export the results of `name` as whitespace-separated columns with a
    /// commented header, oldest first.
    pub fn write_export(&self, name: &str, out: &mut impl Write) -> anyhow::Result<()> {
        let bench = self.benchmark(name)?;
        let header = |out: &mut dyn Write, key: &str, value: &dyn std::fmt::Display| {
            writeln!(out, "# {:22}{}", format!("{}:", key), value)
        };

        header(out, "Benchmark Name", &name)?;
        if let Some(description) = &bench.description {
            header(out, "Description", description)?;
        }
        header(out, "No. of Data-Points", &bench.results.len())?;
        let first = bench.results.iter().map(|r| r.timestamp).min();
        let last = bench.results.iter().map(|r| r.timestamp).max();
        if let (Some(first), Some(last)) = (first, last) {
            header(out, "First Data-Point", &rfc2822(first))?;
            header(out, "Last Data-Point", &rfc2822(last))?;
        }
        writeln!(out)?;
        writeln!(
            out,
            "# {:>14}{:>16}{:>16}{:>16}",
            "timestamp", "mean / s", "stdev / s", "N"
        )?;
        writeln!(out)?;

        let mut results: Vec<&HistoryRecord> = bench.results.iter().collect();
        results.sort_by_key(|r| r.timestamp);
        for r in results {
            writeln!(
                out,
                "{:16}{:16.3e}{:16.3e}{:16}",
                r.timestamp, r.mean, r.stdev, r.n
            )?;
        }
        Ok(())
    }

    /// Write `db` to disk and adopt it. On error the loaded state is kept.
    fn commit(&mut self, mut db: Database) -> Result<(), HistoryError> {
        if !self.writable {
            return Err(HistoryError::ReadOnly);
        }
        db.version = FORMAT_VERSION;
        let json =
            serde_json::to_string_pretty(&db).map_err(|e| HistoryError::Corrupt(e.to_string()))?;

        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(json.as_bytes())?;
        tmp.write_all(b"\n")?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| HistoryError::Io(e.error))?;
        self.db = db;
        self.exists = true;
        Ok(())
    }
}

fn parse(text: &str) -> Result<Database, HistoryError> {
    let db: Database =
        serde_json::from_str(text).map_err(|e| HistoryError::Corrupt(e.to_string()))?;
    if db.version > FORMAT_VERSION {
        return Err(HistoryError::Corrupt(format!(
            "unsupported format version {}",
            db.version
        )));
    }
    Ok(db)
}

fn rfc2822(timestamp: i64) -> String {
    Local
        .timestamp_opt(timestamp, 0)
        .single()
        .map(|t| t.to_rfc2822())
        .unwrap_or_else(|| timestamp.to_string())
}

impl HistoryStore for JsonHistory {
    fn best(&self, name: &str) -> Option<Estimate> {
        self.db
            .benchmarks
            .get(name)?
            .results
            .iter()
            .min_by(|a, b| a.mean.total_cmp(&b.mean))
            .map(|r| Estimate::new(r.mean, r.stdev))
    }

    fn append(
        &mut self,
        name: &str,
        description: Option<&str>,
        entry: HistoryEntry,
    ) -> Result<(), HistoryError> {
        if !self.writable {
            return Err(HistoryError::ReadOnly);
        }
        let mut db = self.db.clone();
        let bench = db.benchmarks.entry(name.to_string()).or_default();
        if let Some(description) = description {
            bench.description = Some(description.to_string());
        }
        bench.results.push(entry.into());
        self.commit(db)?;
        tracing::info!(benchmark = name, path = %self.path.display(), "recorded result");
        Ok(())
    }
}
