//! Configuration loading from trialbench.toml
//!
//! Trialbench configuration can be specified in a `trialbench.toml` file in the
//! project root. The configuration is automatically discovered by walking up
//! from the current directory; command-line flags override file values.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use trialbench_core::DEFAULT_REPETITIONS;
use trialbench_stats::{DEFAULT_QUANTILE, DEFAULT_SIGNIFICANCE};

/// Name of the file looked for during discovery
pub const CONFIG_FILE_NAME: &str = "trialbench.toml";

/// Trialbench configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TrialbenchConfig {
    /// Convergence constraints
    #[serde(default)]
    pub constraints: ConstraintsConfig,
    /// History database settings
    #[serde(default)]
    pub history: HistoryConfig,
    /// Output configuration
    #[serde(default)]
    pub output: OutputConfig,
    /// File search configuration
    #[serde(default)]
    pub search: SearchConfig,
}

/// Convergence constraints applied to every benchmark
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConstraintsConfig {
    /// Timeout per benchmark (e.g., "90s", "2m"); unset means no timeout
    #[serde(default)]
    pub timeout: Option<String>,
    /// Maximum number of trials per benchmark
    #[serde(default = "default_repetitions")]
    pub repetitions: u64,
    /// Desired relative standard deviation
    #[serde(default = "default_significance")]
    pub significance: f64,
    /// Fraction of the fastest samples to keep
    #[serde(default = "default_quantile")]
    pub quantile: f64,
    /// Number of leading samples to discard
    #[serde(default)]
    pub warmup: usize,
}

impl Default for ConstraintsConfig {
    fn default() -> Self {
        Self {
            timeout: None,
            repetitions: default_repetitions(),
            significance: default_significance(),
            quantile: default_quantile(),
            warmup: 0,
        }
    }
}

fn default_repetitions() -> u64 {
    DEFAULT_REPETITIONS
}
fn default_significance() -> f64 {
    DEFAULT_SIGNIFICANCE
}
fn default_quantile() -> f64 {
    DEFAULT_QUANTILE
}

/// History database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    /// History database file
    #[serde(default)]
    pub path: Option<PathBuf>,
    /// Regression alert threshold in sigmas
    #[serde(default)]
    pub alert: Option<f64>,
    /// Store new results in the database
    #[serde(default = "default_update")]
    pub update: bool,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            path: None,
            alert: None,
            update: default_update(),
        }
    }
}

fn default_update() -> bool {
    true
}

/// When to emit ANSI colour sequences
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ColorChoice {
    /// Colour when both stdout and stderr are terminals
    #[default]
    Auto,
    /// Always colour
    Yes,
    /// Never colour
    No,
}

impl std::str::FromStr for ColorChoice {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "auto" => Ok(ColorChoice::Auto),
            "yes" | "always" => Ok(ColorChoice::Yes),
            "no" | "never" => Ok(ColorChoice::No),
            other => Err(format!("expected auto, yes or no, got '{}'", other)),
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Default output format: "human" or "json"
    #[serde(default = "default_format")]
    pub format: String,
    /// ANSI colour policy
    #[serde(default)]
    pub color: ColorChoice,
    /// Display unit: "s", "ms", "us" or "ns"; unset picks one per manifest kind
    #[serde(default)]
    pub unit: Option<String>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: default_format(),
            color: ColorChoice::default(),
            unit: None,
        }
    }
}

fn default_format() -> String {
    "human".to_string()
}

/// Where input files, generators and benchmark programs are looked up
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Directories searched in order
    #[serde(default = "default_directories")]
    pub directories: Vec<PathBuf>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            directories: default_directories(),
        }
    }
}

fn default_directories() -> Vec<PathBuf> {
    vec![PathBuf::from(".")]
}

impl TrialbenchConfig {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Try to discover and load configuration by walking up from current directory.
    ///
    /// A file that exists but does not parse is an error rather than silently
    /// ignored.
    pub fn discover() -> anyhow::Result<Option<Self>> {
        let Ok(mut dir) = std::env::current_dir() else {
            return Ok(None);
        };
        loop {
            let config_path = dir.join(CONFIG_FILE_NAME);
            if config_path.exists() {
                tracing::debug!(path = %config_path.display(), "loading configuration");
                return Self::load(&config_path).map(Some);
            }
            if !dir.pop() {
                break;
            }
        }
        Ok(None)
    }

    /// Timeout from the `[constraints]` section, if one is set
    pub fn timeout(&self) -> anyhow::Result<Option<Duration>> {
        self.constraints
            .timeout
            .as_deref()
            .map(Self::parse_duration)
            .transpose()
    }

    /// Generate a default configuration as TOML string
    pub fn default_toml() -> String {
        r#"# Trialbench Configuration

[constraints]
# Timeout per benchmark (uncomment to enable)
# timeout = "90s"
# Maximum number of trials per benchmark (must exceed 3)
repetitions = 100
# Desired relative standard deviation of the results
significance = 0.2
# Fraction of the fastest samples to keep, in (0, 1]
quantile = 1.0
# Number of leading samples to discard
warmup = 0

[history]
# History database (uncomment to enable)
# path = "benchmarks.json"
# Alert for regressions of at least this many sigmas (uncomment to enable)
# alert = 3.0
# Store new results in the database
update = true

[output]
# Default output format: human or json
format = "human"
# ANSI colours: auto, yes or no
color = "auto"
# Display unit: s, ms, us or ns (defaults to s for command benchmarks, ns for self-timed)
# unit = "ms"

[search]
# Directories searched for input files, generators and benchmark programs
directories = ["."]
"#
        .to_string()
    }

    /// Parse duration string (e.g., "3s", "500ms", "2m"); a bare number means seconds
    pub fn parse_duration(s: &str) -> anyhow::Result<Duration> {
        let s = s.trim();
        if s.is_empty() {
            return Err(anyhow::anyhow!("Empty duration string"));
        }

        // Find where the number ends and unit begins
        let (num_part, unit_part) = s
            .char_indices()
            .find(|(_, c)| c.is_alphabetic())
            .map(|(i, _)| s.split_at(i))
            .unwrap_or((s, "s"));

        let value: f64 = num_part
            .trim()
            .parse()
            .map_err(|_| anyhow::anyhow!("Invalid duration number: {}", num_part))?;

        let seconds_per_unit = match unit_part.to_lowercase().as_str() {
            "ns" => 1e-9,
            "us" | "µs" => 1e-6,
            "ms" => 1e-3,
            "s" | "" => 1.0,
            "m" | "min" => 60.0,
            "h" => 3600.0,
            _ => return Err(anyhow::anyhow!("Unknown duration unit: {}", unit_part)),
        };

        Duration::try_from_secs_f64(value * seconds_per_unit)
            .map_err(|_| anyhow::anyhow!("Invalid duration: {}", s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = TrialbenchConfig::default();
        assert_eq!(config.constraints.repetitions, 100);
        assert_eq!(config.constraints.significance, 0.2);
        assert_eq!(config.constraints.quantile, 1.0);
        assert!(config.constraints.timeout.is_none());
        assert!(config.history.update);
        assert_eq!(config.search.directories, vec![PathBuf::from(".")]);
    }

    #[test]
    fn test_parse_duration() {
        let parse = |s| TrialbenchConfig::parse_duration(s).unwrap();
        assert_eq!(parse("3s"), Duration::from_secs(3));
        assert_eq!(parse("500ms"), Duration::from_millis(500));
        assert_eq!(parse("100us"), Duration::from_micros(100));
        assert_eq!(parse("1000ns"), Duration::from_nanos(1000));
        assert_eq!(parse("2m"), Duration::from_secs(120));
        assert_eq!(parse("1.5s"), Duration::from_millis(1500));
        assert_eq!(parse("90"), Duration::from_secs(90));
        assert!(TrialbenchConfig::parse_duration("").is_err());
        assert!(TrialbenchConfig::parse_duration("3 fortnights").is_err());
        assert!(TrialbenchConfig::parse_duration("-1s").is_err());
    }

    #[test]
    fn test_parse_toml() {
        let toml_str = r#"
            [constraints]
            timeout = "30s"
            warmup = 2

            [output]
            color = "no"
            unit = "ms"
        "#;

        let config: TrialbenchConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.timeout().unwrap(), Some(Duration::from_secs(30)));
        assert_eq!(config.constraints.warmup, 2);
        assert_eq!(config.output.color, ColorChoice::No);
        assert_eq!(config.output.unit.as_deref(), Some("ms"));
        // Defaults should still apply
        assert_eq!(config.constraints.repetitions, 100);
        assert_eq!(config.output.format, "human");
    }

    #[test]
    fn test_default_toml_parses() {
        let default_toml = TrialbenchConfig::default_toml();
        let config: TrialbenchConfig = toml::from_str(&default_toml).unwrap();
        assert_eq!(config.constraints.repetitions, 100);
        assert_eq!(config.timeout().unwrap(), None);
        assert!(config.history.path.is_none());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "[history]\nalert = 2.5\nupdate = false\n").unwrap();

        let config = TrialbenchConfig::load(&path).unwrap();
        assert_eq!(config.history.alert, Some(2.5));
        assert!(!config.history.update);
    }

    #[test]
    fn test_color_choice_parse() {
        assert_eq!("auto".parse::<ColorChoice>(), Ok(ColorChoice::Auto));
        assert_eq!("yes".parse::<ColorChoice>(), Ok(ColorChoice::Yes));
        assert_eq!("never".parse::<ColorChoice>(), Ok(ColorChoice::No));
        assert!("maybe".parse::<ColorChoice>().is_err());
    }
}
