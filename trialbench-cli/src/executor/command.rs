//! Command Benchmarks
//!
//! Each trial runs the executable under test with the stanza's arguments and
//! stdio redirections and is timed from the outside. Setup placeholders are
//! bound once per benchmark, inside a scratch directory that lives exactly as
//! long as the measurement.

use super::{INTERRUPTED_MESSAGE, SearchPath};
use crate::manifest::{CommandDef, SetupRecipe, expand};
use crate::process::{ProcessOutcome, ProcessRunner, describe_status};
use std::collections::BTreeMap;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};
use trialbench_core::{
    Benchmark, Constraints, Measurement, ProducerError, RunError, SampleProducer, TrialOutcome,
    run_to_convergence,
};

/// A benchmark that times invocations of an executable
pub struct CommandBenchmark {
    def: CommandDef,
    executable: PathBuf,
    search: SearchPath,
    runner: ProcessRunner,
}

impl CommandBenchmark {
    /// Time `executable` as described by `def`
    pub fn new(
        def: CommandDef,
        executable: PathBuf,
        search: SearchPath,
        runner: ProcessRunner,
    ) -> Self {
        Self {
            def,
            executable,
            search,
            runner,
        }
    }
}

impl Benchmark for CommandBenchmark {
    fn description(&self) -> Option<&str> {
        self.def.description.as_deref()
    }

    fn measure(&self, constraints: &Constraints) -> Result<Measurement, RunError> {
        let scratch = tempfile::Builder::new()
            .prefix("trialbench-")
            .tempdir()
            .map_err(ProducerError::from)?;
        let mut trials = CommandTrials::resolve(self, scratch.path())?;
        run_to_convergence(&mut trials, constraints)
    }
}

/// A generator bound to its output file
struct Generator {
    program: PathBuf,
    args: Vec<String>,
    output: PathBuf,
}

impl Generator {
    fn command_line(&self) -> String {
        std::iter::once(self.program.display().to_string())
            .chain(self.args.iter().cloned())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Fully resolved invocation, ready to run trials
struct CommandTrials<'b> {
    program: &'b Path,
    args: Vec<String>,
    stdin: Option<PathBuf>,
    stdout: Option<PathBuf>,
    stderr: Option<PathBuf>,
    expect: i32,
    generators: Vec<Generator>,
    require_empty: Vec<String>,
    require_equal: Option<[String; 2]>,
    search: &'b SearchPath,
    runner: ProcessRunner,
}

impl<'b> CommandTrials<'b> {
    fn resolve(bench: &'b CommandBenchmark, scratch: &Path) -> Result<Self, ProducerError> {
        let def = &bench.def;
        let search = &bench.search;

        let mut files = BTreeMap::new();
        let mut to_generate = Vec::new();
        for (key, recipe) in &def.setup {
            let path = match recipe {
                SetupRecipe::Scratch => scratch.join(key.to_lowercase()),
                SetupRecipe::Static(name) => search.find(name)?,
                SetupRecipe::Generator(recipe) => {
                    let path = scratch.join(key.to_lowercase());
                    to_generate.push((recipe, path.clone()));
                    path
                }
            };
            files.insert(key.clone(), path.display().to_string());
        }

        let bind = |pattern: &str| {
            expand(pattern, &files).map_err(|e| ProducerError::new(e.to_string()))
        };
        let stdio = |setting: &Option<String>| -> Result<Option<PathBuf>, ProducerError> {
            setting
                .as_deref()
                .map(|pattern| search.resolve(&bind(pattern)?))
                .transpose()
        };

        let mut generators = Vec::with_capacity(to_generate.len());
        for (recipe, output) in to_generate {
            generators.push(Generator {
                program: search.find(&recipe[0])?,
                args: recipe[1..]
                    .iter()
                    .map(|arg| bind(arg))
                    .collect::<Result<_, _>>()?,
                output,
            });
        }

        Ok(Self {
            program: &bench.executable,
            args: def
                .cmdargs
                .iter()
                .map(|arg| bind(arg))
                .collect::<Result<_, _>>()?,
            stdin: stdio(&def.stdin)?,
            stdout: stdio(&def.stdout)?,
            stderr: stdio(&def.stderr)?,
            expect: def.expect,
            generators,
            require_empty: def
                .require
                .empty
                .iter()
                .map(|path| bind(path))
                .collect::<Result<_, _>>()?,
            require_equal: match &def.require.equal {
                Some([a, b]) => Some([bind(a)?, bind(b)?]),
                None => None,
            },
            search,
            runner: bench.runner,
        })
    }

    fn check_requirements(&self) -> Result<(), ProducerError> {
        for name in &self.require_empty {
            let path = self.search.resolve(name)?;
            let len = std::fs::metadata(&path)?.len();
            if len != 0 {
                return Err(ProducerError::new(format!(
                    "Output file is not empty: {} ({} bytes)",
                    path.display(),
                    len
                )));
            }
        }
        if let Some([a, b]) = &self.require_equal {
            let (a, b) = (self.search.resolve(a)?, self.search.resolve(b)?);
            if std::fs::read(&a)? != std::fs::read(&b)? {
                return Err(ProducerError::new(format!(
                    "Files differ: {} and {}",
                    a.display(),
                    b.display()
                )));
            }
        }
        Ok(())
    }
}

fn open_input(path: &Option<PathBuf>) -> Result<Stdio, ProducerError> {
    match path {
        None => Ok(Stdio::null()),
        Some(path) => File::open(path)
            .map(Stdio::from)
            .map_err(|e| ProducerError::new(format!("Cannot open {}: {}", path.display(), e))),
    }
}

fn open_output(path: &Option<PathBuf>) -> Result<Stdio, ProducerError> {
    match path {
        None => Ok(Stdio::null()),
        Some(path) => File::create(path)
            .map(Stdio::from)
            .map_err(|e| ProducerError::new(format!("Cannot create {}: {}", path.display(), e))),
    }
}

impl SampleProducer for CommandTrials<'_> {
    fn prepare(&mut self, deadline: Option<Duration>) -> Result<TrialOutcome, ProducerError> {
        let started = Instant::now();
        for generator in &self.generators {
            let remaining = deadline.map(|d| d.saturating_sub(started.elapsed()));
            if remaining.is_some_and(|r| r.is_zero()) {
                return Ok(TrialOutcome::TimedOut);
            }

            let output = File::create(&generator.output).map_err(|e| {
                ProducerError::new(format!("Cannot create {}: {}", generator.output.display(), e))
            })?;
            let mut command = Command::new(&generator.program);
            command
                .args(&generator.args)
                .stdin(Stdio::null())
                .stdout(output)
                .stderr(Stdio::null());

            match self.runner.run(&mut command, remaining)? {
                ProcessOutcome::Exited { status, .. } => {
                    if !status.success() {
                        return Err(ProducerError::new(format!(
                            "Generator failed with {}: {}",
                            describe_status(status),
                            generator.command_line()
                        )));
                    }
                }
                ProcessOutcome::TimedOut => return Ok(TrialOutcome::TimedOut),
                ProcessOutcome::Interrupted => {
                    return Err(ProducerError::new(INTERRUPTED_MESSAGE));
                }
            }
        }
        Ok(TrialOutcome::Completed(started.elapsed()))
    }

    fn run_trial(&mut self, deadline: Option<Duration>) -> Result<TrialOutcome, ProducerError> {
        let mut command = Command::new(self.program);
        command
            .args(&self.args)
            .stdin(open_input(&self.stdin)?)
            .stdout(open_output(&self.stdout)?)
            .stderr(open_output(&self.stderr)?);

        match self.runner.run(&mut command, deadline)? {
            ProcessOutcome::Exited { status, elapsed } => {
                if status.code() != Some(self.expect) {
                    return Err(ProducerError::new(format!(
                        "Command exited with {} instead of {}",
                        describe_status(status),
                        self.expect
                    )));
                }
                self.check_requirements()?;
                Ok(TrialOutcome::Completed(elapsed))
            }
            ProcessOutcome::TimedOut => Ok(TrialOutcome::TimedOut),
            ProcessOutcome::Interrupted => Err(ProducerError::new(INTERRUPTED_MESSAGE)),
        }
    }
}
