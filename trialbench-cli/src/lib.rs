#![warn(missing_docs)]
//! Trialbench CLI Library
//!
//! The `trialbench` binary: loads a benchmark manifest, turns every stanza
//! into a runnable benchmark, drives the suite through the collection runner
//! and reports to the terminal, a JSON report and the history database.
//!
//! # Example
//!
//! ```text
//! trialbench run -M benchmarks.json -X ./compiler -H history.json -A 3
//! trialbench run --self-timed -M micro.json -D build/bench
//! trialbench history -H history.json --export compile_hello
//! ```

mod config;
mod executor;
mod history;
mod manifest;
mod process;
mod signal;
mod terminal;

pub use config::*;
pub use executor::{
    CommandBenchmark, INTERRUPTED_MESSAGE, ManifestBenchmark, SearchPath, SelfTimedBenchmark,
    build_report_meta, parse_result,
};
pub use history::{BenchmarkHistory, HistoryRecord, JsonHistory};
pub use manifest::{
    BenchmarkDef, CommandDef, ManifestError, ManifestKind, PlaceholderError, Requirements,
    SelfTimedDef, SetupRecipe, load_manifest, parse_manifest,
};
pub use process::{ProcessError, ProcessOutcome, ProcessRunner, describe_status};
pub use signal::{install_interrupt_handlers, interrupt_flag, interrupted};
pub use terminal::{TerminalReporter, apply_color_choice, format_elapsed, shorten, terminal_width};

use clap::{ArgGroup, Args, Parser, Subcommand};
use colored::Colorize;
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;
use trialbench_core::{
    CollectionOptions, CollectionRunner, Constraints, HistoryStore, ReportSink,
};
use trialbench_report::{
    OutputFormat, ReportBuilder, ReportConfig, Tee, TimeUnit, generate_json_report,
};

/// Exit status after an interrupt (128 + SIGINT)
pub const EXIT_INTERRUPTED: i32 = 130;

/// Trialbench CLI arguments
#[derive(Parser, Debug)]
#[command(name = "trialbench")]
#[command(author, version, about = "Trialbench - adaptive benchmark runner with regression history")]
pub struct Cli {
    /// What to do
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file (default: nearest trialbench.toml)
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a suite of benchmarks from a manifest
    Run(RunArgs),
    /// Inspect or prune the history database
    History(HistoryArgs),
    /// Write a default trialbench.toml to the current directory
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

/// Arguments of `trialbench run`
#[derive(Args, Debug, Default)]
pub struct RunArgs {
    /// Benchmarks to run (all defined in the manifest when none given)
    #[arg(value_name = "NAME")]
    pub names: Vec<String>,

    /// Manifest file with the benchmark definitions ('-' for stdin)
    #[arg(short = 'M', long, value_name = "FILE")]
    pub manifest: PathBuf,

    /// Program that command benchmarks run with their cmdargs
    #[arg(short = 'X', long, value_name = "FILE")]
    pub executable: Option<PathBuf>,

    /// The manifest defines self-timed programs instead of command lines
    #[arg(long)]
    pub self_timed: bool,

    /// Directories searched for input files and programs, in order
    #[arg(short = 'D', long, value_name = "DIR", num_args = 1..)]
    pub directories: Vec<PathBuf>,

    /// Give up on a benchmark after this long (e.g. "90", "1500ms", "2m")
    #[arg(short = 'T', long, value_name = "DURATION")]
    pub timeout: Option<String>,

    /// Maximum number of trials per benchmark (greater than 3)
    #[arg(short = 'R', long, value_name = "TIMES")]
    pub repetitions: Option<u64>,

    /// Desired relative standard deviation
    #[arg(short = 'S', long, value_name = "RATIO")]
    pub significance: Option<f64>,

    /// Fraction of the fastest samples to keep
    #[arg(short = 'Q', long, value_name = "FRACTION")]
    pub quantile: Option<f64>,

    /// Number of leading samples to discard
    #[arg(short = 'W', long, value_name = "NUMBER")]
    pub warmup: Option<usize>,

    /// History database used for trends and updated with the results
    #[arg(short = 'H', long, value_name = "FILE")]
    pub history: Option<PathBuf>,

    /// Only read the history, do not record new results
    #[arg(short = 'N', long)]
    pub no_update: bool,

    /// Alert for results this many sigmas worse than the best on record
    #[arg(short = 'A', long, value_name = "SIGMAS")]
    pub alert: Option<f64>,

    /// Explain the columns of the result table
    #[arg(short = 'I', long)]
    pub info: bool,

    /// Verbose logging on standard error
    #[arg(short = 'V', long)]
    pub verbose: bool,

    /// Colourize output: auto, yes or no
    #[arg(short = 'C', long, value_name = "WHEN", num_args = 0..=1, default_missing_value = "yes")]
    pub color: Option<ColorChoice>,

    /// Display unit for the result table: s, ms, us or ns
    #[arg(long, value_name = "UNIT")]
    pub unit: Option<TimeUnit>,

    /// Output format: human or json
    #[arg(long)]
    pub format: Option<OutputFormat>,

    /// Also write the JSON report to this file
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,
}

/// Arguments of `trialbench history`
#[derive(Args, Debug)]
#[command(group(
    ArgGroup::new("action")
        .required(true)
        .args(["list", "export", "drop", "drop_since"])
))]
pub struct HistoryArgs {
    /// History database
    #[arg(short = 'H', long, value_name = "FILE")]
    pub history: Option<PathBuf>,

    /// List all benchmarks with their descriptions
    #[arg(long)]
    pub list: bool,

    /// Print the recorded results of one benchmark as text columns
    #[arg(long, value_name = "NAME")]
    pub export: Option<String>,

    /// Remove every result of one benchmark
    #[arg(long, value_name = "NAME")]
    pub drop: Option<String>,

    /// Remove all results recorded at or after this POSIX timestamp
    #[arg(long, value_name = "TIME")]
    pub drop_since: Option<i64>,

    /// Verbose logging on standard error
    #[arg(short = 'V', long)]
    pub verbose: bool,
}

/// Run the Trialbench CLI and return the process exit status.
pub fn run() -> anyhow::Result<i32> {
    run_with_cli(Cli::parse())
}

/// Run the Trialbench CLI with pre-parsed arguments.
pub fn run_with_cli(cli: Cli) -> anyhow::Result<i32> {
    let verbose = match &cli.command {
        Commands::Run(args) => args.verbose,
        Commands::History(args) => args.verbose,
        Commands::Init { .. } => false,
    };
    init_logging(verbose);

    let config = match &cli.config {
        Some(path) => TrialbenchConfig::load(path)
            .map_err(|e| anyhow::anyhow!("Cannot load {}: {}", path.display(), e))?,
        None => TrialbenchConfig::discover()?.unwrap_or_default(),
    };

    match cli.command {
        Commands::Run(args) => run_suite(&args, &config),
        Commands::History(args) => manage_history(&args, &config),
        Commands::Init { force } => init_config(force),
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose {
        "trialbench=debug"
    } else {
        "trialbench=warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Print a warning the way the terminal reporter does
fn warn(message: &str) {
    eprintln!("{}", format!("warning: {}", message).yellow().bold());
}

/// Constraints layered from the configuration file and command-line flags
fn build_constraints(args: &RunArgs, config: &TrialbenchConfig) -> anyhow::Result<Constraints> {
    let timeout = match &args.timeout {
        Some(t) => Some(TrialbenchConfig::parse_duration(t)?),
        None => config.timeout()?,
    };
    let c = &config.constraints;
    Ok(Constraints::new(
        timeout,
        Some(args.repetitions.unwrap_or(c.repetitions)),
        args.significance.unwrap_or(c.significance),
        args.quantile.unwrap_or(c.quantile),
        args.warmup.unwrap_or(c.warmup),
    )?)
}

fn search_path(args: &RunArgs, config: &TrialbenchConfig) -> anyhow::Result<SearchPath> {
    let directories = if args.directories.is_empty() {
        config.search.directories.clone()
    } else {
        args.directories.clone()
    };
    for dir in &directories {
        if !dir.is_dir() {
            anyhow::bail!("Not a directory: {}", dir.display());
        }
    }
    Ok(SearchPath::new(directories))
}

fn run_suite(args: &RunArgs, config: &TrialbenchConfig) -> anyhow::Result<i32> {
    let color = match args.color {
        Some(color) => color,
        None => config.output.color,
    };
    apply_color_choice(color);

    let kind = if args.self_timed {
        ManifestKind::SelfTimed
    } else {
        ManifestKind::Command
    };
    let unit = match (args.unit, &config.output.unit) {
        (Some(unit), _) => unit,
        (None, Some(unit)) => unit.parse().map_err(anyhow::Error::msg)?,
        (None, None) if args.self_timed => TimeUnit::Ns,
        (None, None) => TimeUnit::S,
    };
    let format = match args.format {
        Some(format) => format,
        None => config.output.format.parse().map_err(anyhow::Error::msg)?,
    };

    let history_path = args.history.clone().or_else(|| config.history.path.clone());
    let alert = args.alert.or(config.history.alert);
    if let Some(alert) = alert {
        if !(alert >= 0.0) {
            anyhow::bail!("Alert threshold must be a non-negative number, got {}", alert);
        }
        if history_path.is_none() {
            warn("--alert has no effect without --history");
        }
    }
    let options = CollectionOptions {
        update: !args.no_update && config.history.update,
        alert,
    };

    let constraints = build_constraints(args, config)?;
    let search = search_path(args, config)?;

    let mut reporter = if format == OutputFormat::Json && args.output.is_none() {
        TerminalReporter::stderr_only(unit)
    } else {
        TerminalReporter::stdio(unit)
    };
    if args.info {
        reporter.print_info()?;
    }

    let executable = match &args.executable {
        Some(path) if !path.is_file() => {
            anyhow::bail!("Cannot find file: {}", path.display())
        }
        Some(path) => Some(path.as_path()),
        None => None,
    };

    install_interrupt_handlers();
    let runner = ProcessRunner::new().with_interrupt(interrupt_flag());

    let definitions = load_manifest(&args.manifest, kind)?;
    let mut benchmarks = BTreeMap::new();
    for (name, def) in definitions {
        let bench = ManifestBenchmark::new(def, executable, &search, runner)?;
        benchmarks.insert(name, bench);
    }

    let mut history = history_path
        .as_deref()
        .map(|path| JsonHistory::open(path, options.update))
        .transpose()?;

    let mut builder = ReportBuilder::new(build_report_meta(ReportConfig::new(
        &constraints,
        &options,
    )));
    let summary = {
        let mut sink = Tee::new(vec![&mut reporter as &mut dyn ReportSink, &mut builder]);
        CollectionRunner::new(&constraints, options)
            .with_interrupt(interrupt_flag())
            .run(
                &args.names,
                &benchmarks,
                history.as_mut().map(|h| h as &mut dyn HistoryStore),
                &mut sink,
            )
    };

    if format == OutputFormat::Json || args.output.is_some() {
        let json = generate_json_report(&builder.into_report())?;
        match &args.output {
            Some(path) => write_report(path, &json)?,
            None => println!("{}", json),
        }
    }

    if summary.interrupted || interrupted() {
        eprintln!("{}", "error: Canceled by keyboard interrupt".red().bold());
        return Ok(EXIT_INTERRUPTED);
    }
    Ok(if summary.failure_count() == 0 { 0 } else { 1 })
}

fn write_report(path: &Path, json: &str) -> anyhow::Result<()> {
    let mut file = std::fs::File::create(path)
        .map_err(|e| anyhow::anyhow!("Cannot write {}: {}", path.display(), e))?;
    file.write_all(json.as_bytes())?;
    file.write_all(b"\n")?;
    tracing::info!(path = %path.display(), "report written");
    Ok(())
}

fn manage_history(args: &HistoryArgs, config: &TrialbenchConfig) -> anyhow::Result<i32> {
    let path = args
        .history
        .clone()
        .or_else(|| config.history.path.clone())
        .ok_or_else(|| anyhow::anyhow!("No history database given (-H FILE)"))?;
    let mut history = JsonHistory::open_existing(path)?;
    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    if args.list {
        history.write_list(&mut out)?;
    } else if let Some(name) = &args.export {
        history.write_export(name, &mut out)?;
    } else if let Some(name) = &args.drop {
        history.drop_benchmark(name)?;
    } else if let Some(since) = args.drop_since {
        let removed = history.drop_since(since)?;
        tracing::debug!(removed, path = %history.path().display(), "pruned history");
    }
    Ok(0)
}

fn init_config(force: bool) -> anyhow::Result<i32> {
    let path = Path::new(CONFIG_FILE_NAME);
    if path.exists() && !force {
        anyhow::bail!("{} already exists (use --force to overwrite)", CONFIG_FILE_NAME);
    }
    std::fs::write(path, TrialbenchConfig::default_toml())?;
    println!("Wrote {}", CONFIG_FILE_NAME);
    Ok(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_run_flags() {
        let cli = Cli::parse_from([
            "trialbench", "run", "-M", "m.json", "-X", "cc", "-R", "20", "-S", "0.05", "-Q",
            "0.5", "-W", "2", "-T", "90", "-A", "3", "-C", "-N", "a", "b",
        ]);
        let Commands::Run(args) = cli.command else {
            panic!("expected the run subcommand");
        };
        assert_eq!(args.names, vec!["a", "b"]);
        assert_eq!(args.repetitions, Some(20));
        assert_eq!(args.color, Some(ColorChoice::Yes));
        assert!(args.no_update);
    }

    #[test]
    fn test_color_takes_value() {
        let cli = Cli::parse_from(["trialbench", "run", "-M", "m.json", "--color=no"]);
        let Commands::Run(args) = cli.command else {
            panic!("expected the run subcommand");
        };
        assert_eq!(args.color, Some(ColorChoice::No));
    }

    #[test]
    fn test_history_needs_an_action() {
        assert!(Cli::try_parse_from(["trialbench", "history", "-H", "h.json"]).is_err());
        assert!(
            Cli::try_parse_from(["trialbench", "history", "-H", "h.json", "--list", "--drop", "x"])
                .is_err()
        );
        assert!(Cli::try_parse_from(["trialbench", "history", "-H", "h.json", "--list"]).is_ok());
    }

    #[test]
    fn test_constraints_layering() {
        let mut config = TrialbenchConfig::default();
        config.constraints.timeout = Some("2m".into());
        config.constraints.warmup = 4;
        let args = RunArgs {
            repetitions: Some(50),
            ..Default::default()
        };
        let c = build_constraints(&args, &config).unwrap();
        assert_eq!(c.timeout(), Some(std::time::Duration::from_secs(120)));
        assert_eq!(c.max_repetitions(), Some(50));
        assert_eq!(c.warmup(), 4);

        let args = RunArgs {
            repetitions: Some(3),
            ..Default::default()
        };
        assert!(build_constraints(&args, &config).is_err());
    }

    #[test]
    fn test_search_path_rejects_missing_directory() {
        let args = RunArgs {
            directories: vec![PathBuf::from("/definitely/not/here")],
            ..Default::default()
        };
        let err = search_path(&args, &TrialbenchConfig::default()).unwrap_err();
        assert!(err.to_string().starts_with("Not a directory"));
    }
}
