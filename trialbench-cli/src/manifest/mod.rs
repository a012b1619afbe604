//! Benchmark Manifests
//!
//! A manifest is a JSON object mapping benchmark names to definitions, with
//! one extension: lines whose first non-blank characters are `//` are
//! comments. Each definition is validated once, at load, into a
//! [`BenchmarkDef`]; nothing downstream re-checks the JSON.
//!
//! ```text
//! {
//!     // compile the hello-world program
//!     "hello": {
//!         "description": "Compile a trivial program",
//!         "cmdargs": ["--output={OUT}", "{SRC}"],
//!         "setup": { "SRC": "hello.mj", "OUT": null }
//!     }
//! }
//! ```

mod placeholder;

pub use placeholder::{PlaceholderError, expand, mentions};

use regex::Regex;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;
use std::sync::LazyLock;
use thiserror::Error;

type Pattern = LazyLock<Result<Regex, regex::Error>>;

static NAME_PATTERN: Pattern = LazyLock::new(|| Regex::new(r"^\w+$"));
static PLACEHOLDER_PATTERN: Pattern = LazyLock::new(|| Regex::new(r"^[A-Z0-9]+$"));

fn is_match(pattern: &Pattern, text: &str) -> Result<bool, ManifestError> {
    match &**pattern {
        Ok(re) => Ok(re.is_match(text)),
        Err(e) => Err(ManifestError::Pattern(e.clone())),
    }
}

/// Errors loading a manifest file
#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("Cannot read manifest file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot parse manifest file: {0}")]
    Syntax(#[from] serde_json::Error),

    #[error("Invalid manifest file: {0}")]
    Invalid(String),

    #[error("Built-in pattern does not compile: {0}")]
    Pattern(regex::Error),
}

fn invalid(location: impl std::fmt::Display, reason: impl std::fmt::Display) -> ManifestError {
    ManifestError::Invalid(format!("{}: {}", location, reason))
}

/// Which kind of benchmark a manifest defines
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManifestKind {
    /// Externally timed command invocations
    Command,
    /// Programs that time themselves and print `mean stdev n`
    SelfTimed,
}

/// How a setup placeholder obtains its file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SetupRecipe {
    /// A fresh path in the benchmark's scratch directory
    Scratch,
    /// An existing file looked up in the search directories
    Static(String),
    /// A command whose standard output becomes the file
    Generator(Vec<String>),
}

/// Post-trial checks on output files
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Requirements {
    /// Files that must be empty
    pub empty: Vec<String>,
    /// Two files that must have identical contents
    pub equal: Option<[String; 2]>,
}

impl Requirements {
    /// Whether there is nothing to check
    pub fn is_empty(&self) -> bool {
        self.empty.is_empty() && self.equal.is_none()
    }
}

/// An externally timed command benchmark
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandDef {
    pub description: Option<String>,
    pub cmdargs: Vec<String>,
    /// Placeholders in manifest order
    pub setup: Vec<(String, SetupRecipe)>,
    pub stdin: Option<String>,
    pub stdout: Option<String>,
    pub stderr: Option<String>,
    /// Exit status a successful trial must have
    pub expect: i32,
    pub require: Requirements,
}

/// A self-timed benchmark program
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelfTimedDef {
    pub description: Option<String>,
    /// Program followed by its arguments; never empty
    pub command: Vec<String>,
}

/// A validated manifest stanza
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BenchmarkDef {
    Command(CommandDef),
    SelfTimed(SelfTimedDef),
}

/// Load and validate the manifest at `path`; `-` reads standard input.
pub fn load_manifest(
    path: &Path,
    kind: ManifestKind,
) -> Result<BTreeMap<String, BenchmarkDef>, ManifestError> {
    let io_error = |source| ManifestError::Io {
        path: path.display().to_string(),
        source,
    };
    let text = if path.as_os_str() == "-" {
        let mut text = String::new();
        std::io::stdin().read_to_string(&mut text).map_err(io_error)?;
        text
    } else {
        std::fs::read_to_string(path).map_err(io_error)?
    };
    let definitions = parse_manifest(&text, kind)?;
    tracing::debug!(
        path = %path.display(),
        count = definitions.len(),
        "loaded manifest"
    );
    Ok(definitions)
}

/// Parse and validate manifest text.
pub fn parse_manifest(
    text: &str,
    kind: ManifestKind,
) -> Result<BTreeMap<String, BenchmarkDef>, ManifestError> {
    let value: Value = serde_json::from_str(&strip_comments(text))?;
    let Value::Object(stanzas) = value else {
        return Err(ManifestError::Invalid(
            "Expected an object mapping benchmark names to definitions".to_string(),
        ));
    };

    let mut definitions = BTreeMap::new();
    for (name, stanza) in &stanzas {
        if !is_match(&NAME_PATTERN, name)? {
            return Err(invalid(name, "Not a valid name for a benchmark"));
        }
        let Value::Object(stanza) = stanza else {
            return Err(invalid(name, "Expected an object"));
        };
        let def = match kind {
            ManifestKind::Command => BenchmarkDef::Command(parse_command(name, stanza)?),
            ManifestKind::SelfTimed => BenchmarkDef::SelfTimed(parse_self_timed(name, stanza)?),
        };
        definitions.insert(name.clone(), def);
    }
    Ok(definitions)
}

/// Blank out whole-line `//` comments, keeping line numbers intact.
fn strip_comments(text: &str) -> String {
    text.lines()
        .map(|line| {
            if line.trim_start().starts_with("//") {
                ""
            } else {
                line
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn parse_command(name: &str, stanza: &Map<String, Value>) -> Result<CommandDef, ManifestError> {
    let mut def = CommandDef {
        description: None,
        cmdargs: Vec::new(),
        setup: Vec::new(),
        stdin: None,
        stdout: None,
        stderr: None,
        expect: 0,
        require: Requirements::default(),
    };

    // Setup first: every other attribute may refer to its placeholders.
    let setup = match stanza.get("setup") {
        Some(Value::Object(setup)) => parse_setup(name, setup)?,
        Some(_) => return Err(invalid(format_args!("{name}.setup"), "Expected an object")),
        None => Vec::new(),
    };
    let keys: Vec<&str> = setup.iter().map(|(k, _)| k.as_str()).collect();
    let check = |location: String, text: &str| {
        placeholder::validate(text, keys.iter().copied()).map_err(|e| invalid(location, e))
    };

    for (key, value) in stanza {
        let location = format!("{name}.{key}");
        match key.as_str() {
            "description" => def.description = Some(expect_string(&location, value)?),
            "cmdargs" => {
                def.cmdargs = expect_strings(&location, value)?;
                for arg in &def.cmdargs {
                    check(location.clone(), arg)?;
                }
            }
            "setup" => {}
            "stdin" | "stdout" | "stderr" => {
                let path = expect_string(&location, value)?;
                check(location, &path)?;
                match key.as_str() {
                    "stdin" => def.stdin = Some(path),
                    "stdout" => def.stdout = Some(path),
                    _ => def.stderr = Some(path),
                }
            }
            "expect" => {
                def.expect = value
                    .as_i64()
                    .and_then(|v| i32::try_from(v).ok())
                    .ok_or_else(|| invalid(&location, "Expected an integer"))?;
            }
            "require" => {
                let Value::Object(require) = value else {
                    return Err(invalid(location, "Expected an object"));
                };
                def.require = parse_require(name, require)?;
                for path in def.require.empty.iter().chain(def.require.equal.iter().flatten()) {
                    check(location.clone(), path)?;
                }
            }
            _ => return Err(invalid(location, "Unknown attribute")),
        }
    }
    def.setup = setup;
    Ok(def)
}

fn parse_setup(
    name: &str,
    setup: &Map<String, Value>,
) -> Result<Vec<(String, SetupRecipe)>, ManifestError> {
    for key in setup.keys() {
        if !is_match(&PLACEHOLDER_PATTERN, key)? {
            return Err(invalid(
                format_args!("{name}.setup"),
                format_args!("Not a valid placeholder: {key}"),
            ));
        }
    }

    let keys: Vec<&str> = setup.keys().map(String::as_str).collect();
    let mut recipes = Vec::with_capacity(setup.len());
    for (key, value) in setup {
        let location = format!("{name}.setup.{key}");
        let recipe = match value {
            Value::Null => SetupRecipe::Scratch,
            Value::String(path) => SetupRecipe::Static(path.clone()),
            Value::Array(_) => {
                let command = expect_strings(&location, value)?;
                if command.iter().any(|arg| mentions(arg, key)) {
                    return Err(invalid(location, "Self-reference in recipe"));
                }
                if command.first().is_none_or(|program| program.trim().is_empty()) {
                    return Err(invalid(location, "Not a valid command"));
                }
                for arg in &command {
                    placeholder::validate(arg, keys.iter().copied())
                        .map_err(|e| invalid(&location, e))?;
                }
                SetupRecipe::Generator(command)
            }
            _ => return Err(invalid(location, "Expected 'null', a string or an array")),
        };
        recipes.push((key.clone(), recipe));
    }
    Ok(recipes)
}

fn parse_require(name: &str, require: &Map<String, Value>) -> Result<Requirements, ManifestError> {
    let mut requirements = Requirements::default();
    for (key, value) in require {
        let location = format!("{name}.require.{key}");
        match key.as_str() {
            "empty" => requirements.empty = expect_strings(&location, value)?,
            "equal" => {
                let pair = expect_strings(&location, value)
                    .ok()
                    .and_then(|v| <[String; 2]>::try_from(v).ok())
                    .ok_or_else(|| invalid(&location, "Expected an array of two strings"))?;
                requirements.equal = Some(pair);
            }
            _ => return Err(invalid(location, "Unknown attribute")),
        }
    }
    Ok(requirements)
}

fn parse_self_timed(name: &str, stanza: &Map<String, Value>) -> Result<SelfTimedDef, ManifestError> {
    if !stanza.contains_key("command") {
        return Err(invalid(name, "The 'command' attribute is required"));
    }
    let mut def = SelfTimedDef {
        description: None,
        command: Vec::new(),
    };
    for (key, value) in stanza {
        let location = format!("{name}.{key}");
        match key.as_str() {
            "description" => def.description = Some(expect_string(&location, value)?),
            "command" => {
                def.command = expect_strings(&location, value)?;
                if def.command.first().is_none_or(|program| program.trim().is_empty()) {
                    return Err(invalid(location, "Command cannot be empty"));
                }
            }
            _ => return Err(invalid(location, "Unknown attribute")),
        }
    }
    Ok(def)
}

fn expect_string(location: &str, value: &Value) -> Result<String, ManifestError> {
    value
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| invalid(location, "Expected a string"))
}

fn expect_strings(location: &str, value: &Value) -> Result<Vec<String>, ManifestError> {
    value
        .as_array()
        .and_then(|items| {
            items
                .iter()
                .map(|item| item.as_str().map(str::to_string))
                .collect::<Option<Vec<_>>>()
        })
        .ok_or_else(|| invalid(location, "Expected an array of strings"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn command(text: &str) -> Result<BTreeMap<String, BenchmarkDef>, ManifestError> {
        parse_manifest(text, ManifestKind::Command)
    }

    fn invalid_reason(result: Result<BTreeMap<String, BenchmarkDef>, ManifestError>) -> String {
        match result {
            Err(ManifestError::Invalid(reason)) => reason,
            other => panic!("expected an invalid manifest, got {:?}", other),
        }
    }

    #[test]
    fn test_full_command_stanza() {
        let defs = command(
            r#"{
                // a comment line
                "hello": {
                    "description": "Compile a trivial program",
                    "cmdargs": ["--output={OUT}", "{SRC}"],
                    "setup": { "SRC": "hello.mj", "OUT": null, "GEN": ["gen.sh", "{SRC}"] },
                    "stdout": "{OUT}",
                    "expect": 1,
                    "require": { "empty": ["{OUT}"], "equal": ["{OUT}", "{GEN}"] }
                }
            }"#,
        )
        .unwrap();

        let BenchmarkDef::Command(def) = &defs["hello"] else {
            panic!("expected a command benchmark");
        };
        assert_eq!(def.description.as_deref(), Some("Compile a trivial program"));
        assert_eq!(def.expect, 1);
        assert_eq!(def.stdout.as_deref(), Some("{OUT}"));
        assert_eq!(
            def.setup,
            vec![
                ("SRC".to_string(), SetupRecipe::Static("hello.mj".to_string())),
                ("OUT".to_string(), SetupRecipe::Scratch),
                (
                    "GEN".to_string(),
                    SetupRecipe::Generator(vec!["gen.sh".to_string(), "{SRC}".to_string()])
                ),
            ]
        );
        assert_eq!(def.require.empty, vec!["{OUT}".to_string()]);
        assert!(def.require.equal.is_some());
    }

    #[test]
    fn test_defaults() {
        let defs = command(r#"{ "bare": {} }"#).unwrap();
        let BenchmarkDef::Command(def) = &defs["bare"] else {
            panic!("expected a command benchmark");
        };
        assert_eq!(def.expect, 0);
        assert!(def.cmdargs.is_empty());
        assert!(def.stdin.is_none());
        assert!(def.require.is_empty());
        assert_eq!(def.description, None);
    }

    #[test]
    fn test_comments_keep_line_numbers() {
        let err = command("// first\n// second\n{ \"a\": {} ").unwrap_err();
        let ManifestError::Syntax(e) = err else {
            panic!("expected a syntax error");
        };
        assert_eq!(e.line(), 3);
    }

    #[test]
    fn test_rejects_bad_names() {
        assert_eq!(
            invalid_reason(command(r#"{ "not-a-name": {} }"#)),
            "not-a-name: Not a valid name for a benchmark"
        );
        assert_eq!(
            invalid_reason(command(r#"{ "a": [] }"#)),
            "a: Expected an object"
        );
        assert!(matches!(command("[]"), Err(ManifestError::Invalid(_))));
    }

    #[test]
    fn test_built_in_patterns() {
        assert!(is_match(&NAME_PATTERN, "hello_2").unwrap());
        assert!(!is_match(&NAME_PATTERN, "").unwrap());
        assert!(is_match(&PLACEHOLDER_PATTERN, "SRC2").unwrap());
        assert!(!is_match(&PLACEHOLDER_PATTERN, "src").unwrap());
    }

    #[test]
    fn test_rejects_bad_attributes() {
        assert_eq!(
            invalid_reason(command(r#"{ "a": { "color": "red" } }"#)),
            "a.color: Unknown attribute"
        );
        assert_eq!(
            invalid_reason(command(r#"{ "a": { "cmdargs": "x" } }"#)),
            "a.cmdargs: Expected an array of strings"
        );
        assert_eq!(
            invalid_reason(command(r#"{ "a": { "expect": "0" } }"#)),
            "a.expect: Expected an integer"
        );
        assert_eq!(
            invalid_reason(command(r#"{ "a": { "require": { "equal": ["x"] } } }"#)),
            "a.require.equal: Expected an array of two strings"
        );
    }

    #[test]
    fn test_rejects_bad_setup() {
        assert_eq!(
            invalid_reason(command(r#"{ "a": { "setup": { "lower": null } } }"#)),
            "a.setup: Not a valid placeholder: lower"
        );
        assert_eq!(
            invalid_reason(command(r#"{ "a": { "setup": { "X": ["gen", "{X}"] } } }"#)),
            "a.setup.X: Self-reference in recipe"
        );
        assert_eq!(
            invalid_reason(command(r#"{ "a": { "setup": { "X": [" "] } } }"#)),
            "a.setup.X: Not a valid command"
        );
        assert_eq!(
            invalid_reason(command(r#"{ "a": { "setup": { "X": 42 } } }"#)),
            "a.setup.X: Expected 'null', a string or an array"
        );
    }

    #[test]
    fn test_rejects_undefined_placeholders() {
        assert_eq!(
            invalid_reason(command(r#"{ "a": { "cmdargs": ["{IN}"] } }"#)),
            "a.cmdargs: Undefined placeholder: 'IN'"
        );
        assert_eq!(
            invalid_reason(command(
                r#"{ "a": { "setup": { "IN": null }, "stdout": "{OUT}" } }"#
            )),
            "a.stdout: Undefined placeholder: 'OUT'"
        );
        // escaped braces are fine
        assert!(command(r#"{ "a": { "cmdargs": ["{{literal}}"] } }"#).is_ok());
    }

    #[test]
    fn test_self_timed() {
        let defs = parse_manifest(
            r#"{ "sort": { "description": "std::sort", "command": ["bench-sort", "-n", "1000"] } }"#,
            ManifestKind::SelfTimed,
        )
        .unwrap();
        let BenchmarkDef::SelfTimed(def) = &defs["sort"] else {
            panic!("expected a self-timed benchmark");
        };
        assert_eq!(def.command, vec!["bench-sort", "-n", "1000"]);
        assert_eq!(def.description.as_deref(), Some("std::sort"));

        let missing = parse_manifest(r#"{ "a": {} }"#, ManifestKind::SelfTimed);
        assert_eq!(invalid_reason(missing), "a: The 'command' attribute is required");
        let empty = parse_manifest(r#"{ "a": { "command": [] } }"#, ManifestKind::SelfTimed);
        assert_eq!(invalid_reason(empty), "a.command: Command cannot be empty");
        let cmdargs = parse_manifest(
            r#"{ "a": { "command": ["x"], "cmdargs": [] } }"#,
            ManifestKind::SelfTimed,
        );
        assert_eq!(invalid_reason(cmdargs), "a.cmdargs: Unknown attribute");
    }

    #[test]
    fn test_load_manifest_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("manifest.json");
        std::fs::write(&path, r#"{ "b": {}, "a": { "description": "first" } }"#).unwrap();

        let defs = load_manifest(&path, ManifestKind::Command).unwrap();
        assert_eq!(defs.keys().collect::<Vec<_>>(), vec!["a", "b"]);

        let err = load_manifest(&dir.path().join("missing.json"), ManifestKind::Command);
        assert!(matches!(err, Err(ManifestError::Io { .. })));
    }

    #[test]
    fn test_error_display() {
        let err = invalid("a.cmdargs", "Expected an array of strings");
        assert_eq!(
            err.to_string(),
            "Invalid manifest file: a.cmdargs: Expected an array of strings"
        );
    }
}
