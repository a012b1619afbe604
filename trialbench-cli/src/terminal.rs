//! Terminal Reporter
//!
//! Streams one table row per benchmark as results come in. Failures and
//! convergence warnings go to standard error so the table stays intact when
//! standard output is redirected.

use crate::config::ColorChoice;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::io::{self, IsTerminal, Write};
use std::time::Duration;
use trialbench_core::{BenchmarkOutcome, CollectionSummary, ReportSink};
use trialbench_report::{TimeUnit, format_time};

const MIN_WIDTH: usize = 75;
const NAME_WIDTH: usize = 16;
const FIXED_COLUMNS: usize = 64;

/// Decide once whether ANSI colours are emitted
pub fn apply_color_choice(choice: ColorChoice) {
    let enabled = match choice {
        ColorChoice::Yes => true,
        ColorChoice::No => false,
        ColorChoice::Auto => io::stdout().is_terminal() && io::stderr().is_terminal(),
    };
    colored::control::set_override(enabled);
}

/// Width of the terminal, never less than 75 columns
pub fn terminal_width() -> usize {
    let columns = std::env::var("COLUMNS")
        .ok()
        .and_then(|c| c.trim().parse::<usize>().ok())
        .filter(|&c| c > 0)
        .or_else(ioctl_columns)
        .unwrap_or(80);
    columns.max(MIN_WIDTH)
}

#[cfg(unix)]
fn ioctl_columns() -> Option<usize> {
    // SAFETY: TIOCGWINSZ only writes into the winsize we hand it.
    let mut size: libc::winsize = unsafe { std::mem::zeroed() };
    let rc = unsafe { libc::ioctl(libc::STDOUT_FILENO, libc::TIOCGWINSZ, &mut size) };
    (rc == 0 && size.ws_col > 0).then_some(size.ws_col as usize)
}

#[cfg(not(unix))]
fn ioctl_columns() -> Option<usize> {
    None
}

/// Cut `text` to at most `limit` characters, marking the cut with ` ...`
pub fn shorten(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        return text.to_string();
    }
    let head: String = text.chars().take(limit.saturating_sub(5)).collect();
    format!("{} ...", head.trim_end())
}

/// `H:MM:SS`, rounded up to whole seconds
pub fn format_elapsed(elapsed: Duration) -> String {
    let secs = (elapsed.as_secs_f64() + 1.0).ceil() as u64;
    format!("{}:{:02}:{:02}", secs / 3600, secs / 60 % 60, secs % 60)
}

/// Human-readable streaming output
pub struct TerminalReporter<'a> {
    out: Box<dyn Write + 'a>,
    err: Box<dyn Write + 'a>,
    unit: TimeUnit,
    width: usize,
    spinner: ProgressBar,
    /// Whether `out` shows the result table; help text follows the table
    table: bool,
}

impl<'a> TerminalReporter<'a> {
    /// Report to arbitrary writers, without spinner
    pub fn new(
        out: impl Write + 'a,
        err: impl Write + 'a,
        unit: TimeUnit,
        width: usize,
    ) -> Self {
        Self {
            out: Box::new(out),
            err: Box::new(err),
            unit,
            width: width.max(MIN_WIDTH),
            spinner: ProgressBar::hidden(),
            table: true,
        }
    }

    /// Discard the table; help text goes to the error stream instead
    pub fn without_table(mut self) -> Self {
        self.out = Box::new(io::sink());
        self.table = false;
        self
    }

    /// Report to the process's standard streams, with a spinner on an
    /// interactive standard error
    pub fn stdio(unit: TimeUnit) -> TerminalReporter<'static> {
        let mut reporter = TerminalReporter::new(io::stdout(), io::stderr(), unit, terminal_width());
        if io::stderr().is_terminal() {
            reporter.spinner = ProgressBar::with_draw_target(None, ProgressDrawTarget::stderr());
            reporter.spinner.set_style(
                ProgressStyle::default_spinner()
                    .template("{spinner:.green} [{elapsed_precise}] {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_spinner()),
            );
        }
        reporter
    }

    /// Same as [`TerminalReporter::stdio`] but with the table discarded, for
    /// when standard output carries a machine-readable report
    pub fn stderr_only(unit: TimeUnit) -> TerminalReporter<'static> {
        Self::stdio(unit).without_table()
    }

    fn separator(&self) -> String {
        "-".repeat(self.width)
    }

    fn log(&mut self, level: &str, name: Option<&str>, message: &str) {
        let mut line = format!("{}: ", level);
        if let Some(name) = name {
            line.push_str(name);
            line.push_str(": ");
        }
        line.push_str(message);
        let line = match level {
            "error" => line.red().bold(),
            _ => line.yellow().bold(),
        };
        let err = &mut self.err;
        self.spinner.suspend(|| {
            let _ = writeln!(err, "{}", line);
        });
    }

    fn line(&mut self, text: &str) {
        let out = &mut self.out;
        self.spinner.suspend(|| {
            let _ = writeln!(out, "{}", text);
        });
    }

    /// Print the column explanations
    pub fn print_info(&mut self) -> io::Result<()> {
        let width = self.width;
        let out = if self.table { &mut self.out } else { &mut self.err };
        writeln!(out)?;
        for line in wrap(
            "The following table summarizes the results of running the benchmark suite.  \
             It has one row per benchmark and the following columns.",
            width,
            "",
        ) {
            writeln!(out, "{}", line)?;
        }
        writeln!(out)?;
        for (title, text) in COLUMN_INFO {
            let indent = format!("  {:<16}  ", title);
            let blank = " ".repeat(indent.len());
            for (i, line) in wrap(text, width, &blank).into_iter().enumerate() {
                let body = &line[blank.len()..];
                if i == 0 {
                    writeln!(out, "{}{}", indent.bold(), body)?;
                } else {
                    writeln!(out, "{}", line)?;
                }
            }
            writeln!(out)?;
        }
        Ok(())
    }
}

impl ReportSink for TerminalReporter<'_> {
    fn begin(&mut self, planned: usize, has_duplicates: bool) {
        self.line(&format!("Running suite of {} benchmarks ...", planned));
        if has_duplicates {
            self.log("warning", None, "List of benchmarks to run contains duplicates");
        }
        let separator = self.separator();
        let header = format!(
            " {:<16}{:>12}{:>12}{:>8}{:>12}   {}",
            "id",
            format!("mean / {}", self.unit.label()),
            format!("stdev / {}", self.unit.label()),
            "N",
            "trend",
            "description"
        );
        self.line(&separator);
        self.line(&header.bold().to_string());
        self.line(&separator);
    }

    fn started(&mut self, name: &str) {
        self.spinner.set_message(name.to_string());
        self.spinner.enable_steady_tick(Duration::from_millis(100));
    }

    fn emit(&mut self, name: &str, description: Option<&str>, outcome: &BenchmarkOutcome) {
        match outcome {
            BenchmarkOutcome::Success {
                measurement,
                trend,
                alerted,
            } => {
                let trend = match trend {
                    Some(t) if *alerted => format!("{:+12.2}", t).red().to_string(),
                    Some(t) if *t <= 0.0 => format!("{:+12.2}", t).green().to_string(),
                    Some(t) => format!("{:+12.2}", t),
                    None => format!("{:>12}", "n/a"),
                };
                let row = format!(
                    " {:16}{:>12}{:>12}{:8}{}   {}",
                    shorten(name, NAME_WIDTH),
                    format_time(measurement.mean, self.unit),
                    format_time(measurement.stdev, self.unit),
                    measurement.n,
                    trend,
                    shorten(
                        description.unwrap_or(""),
                        self.width.saturating_sub(FIXED_COLUMNS).max(6)
                    )
                );
                self.line(row.trim_end());
                if let Some(warning) = &measurement.warning {
                    self.log("warning", Some(name), warning);
                }
            }
            BenchmarkOutcome::Failure { reason } => self.log("error", Some(name), reason),
            BenchmarkOutcome::Skipped => {}
        }
    }

    fn finish(&mut self, summary: &CollectionSummary) {
        self.spinner.finish_and_clear();
        let separator = self.separator();
        self.line(&separator);
        if summary.interrupted {
            self.log(
                "warning",
                None,
                &format!(
                    "Interrupted; {} benchmarks were not run",
                    summary.skipped
                ),
            );
        }
        self.line(&format!(
            "Completed run of benchmark suite in {}",
            format_elapsed(summary.elapsed)
        ));
        self.line("");
        self.line(&format!("{:6} successful completions", summary.successes.len()));
        self.line(&format!("{:6} hard failures", summary.failures.len()));
        if let (true, Some(threshold)) = (summary.history_enabled, summary.alert_threshold) {
            self.line(&format!(
                "{:6} regression alerts (threshold was {:.2} sigma)",
                summary.alerts.len(),
                threshold
            ));
        }
        self.line("");
        let _ = self.out.flush();
    }
}

const COLUMN_INFO: [(&str, &str); 6] = [
    (
        "id",
        "Name of the benchmark as defined in the manifest file.  If the name is too long \
         to display, it will be truncated and '...' appended.",
    ),
    (
        "mean",
        "Result of running the benchmark.  This is the average over several runs.  The \
         unit of this column is given in its header and is either seconds or a fraction \
         of seconds (such as milliseconds) depending on what is more appropriate.",
    ),
    ("stdev", "Absolute standard deviation of the benchmark result."),
    (
        "N",
        "Number of times the benchmark was run.  If you select to use only parts of the \
         data by setting a non-zero warmup or a quantile less than one, the samples \
         discarded due to these constraints will already be excluded from the number shown.",
    ),
    (
        "trend",
        "Performance compared to the historically best result expressed in terms of \
         sigmas.  If the result of this run was m +/- s and the historically best result \
         was M +/- S then the 'trend' column will show the quantity (m - M) / sqrt(s^2 + S^2).",
    ),
    (
        "description",
        "Description of the benchmark as provided in the manifest file.  If the text is \
         too long to display, it will be truncated and '...' appended.",
    ),
];

/// Greedy word wrap; every line starts with `indent`
fn wrap(text: &str, width: usize, indent: &str) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = indent.to_string();
    for word in text.split_whitespace() {
        let fresh = current.len() == indent.len();
        if !fresh && current.len() + 1 + word.len() > width {
            lines.push(std::mem::replace(&mut current, indent.to_string()));
        }
        if current.len() > indent.len() {
            current.push(' ');
        }
        current.push_str(word);
    }
    if current.len() > indent.len() {
        lines.push(current);
    }
    lines
}
