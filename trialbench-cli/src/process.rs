//! Process Runner
//!
//! Runs one child process to completion, a deadline, or an interrupt.
//!
//! The child is timed from just before spawn until it exits. A waiter thread
//! blocks in `waitid(.., WNOWAIT)`, which observes the exit without reaping,
//! while the calling thread polls the deadline and the interrupt flag at most
//! every [`POLL_INTERVAL`]. Whatever ends the wait, the child is reaped before
//! `run` returns. Children lead their own process group and are killed as a
//! group.

use std::io::{self, Read};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};
use thiserror::Error;
use trialbench_core::ProducerError;

/// Upper bound on how long an interrupt or deadline can go unnoticed
pub const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Failure to start or supervise a child process
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("Cannot run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("Cannot wait for {program}: {source}")]
    Wait {
        program: String,
        #[source]
        source: io::Error,
    },
}

impl From<ProcessError> for ProducerError {
    fn from(e: ProcessError) -> Self {
        ProducerError::new(e.to_string())
    }
}

/// How a supervised child ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// The child exited on its own
    Exited {
        status: ExitStatus,
        /// Wall-clock time from spawn to exit
        elapsed: Duration,
    },
    /// The deadline passed; the child was killed and reaped
    TimedOut,
    /// An interrupt arrived; the child was killed and reaped
    Interrupted,
}

/// Human-readable exit status: the code, or the signal that ended the child
pub fn describe_status(status: ExitStatus) -> String {
    if let Some(code) = status.code() {
        return format!("error code {}", code);
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return format!("signal {}", signal);
        }
    }
    status.to_string()
}

enum Ending {
    Exited(Duration),
    TimedOut,
    Interrupted,
    WaitFailed(io::Error),
}

/// Spawns and supervises child processes
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessRunner {
    interrupt: Option<&'static AtomicBool>,
}

impl ProcessRunner {
    /// A runner that only honours deadlines
    pub fn new() -> Self {
        Self::default()
    }

    /// Also kill the child as soon as `flag` is set
    pub fn with_interrupt(mut self, flag: &'static AtomicBool) -> Self {
        self.interrupt = Some(flag);
        self
    }

    fn interrupted(&self) -> bool {
        self.interrupt.is_some_and(|f| f.load(Ordering::Relaxed))
    }

    /// Run `command` with its configured stdio, giving up after `deadline`.
    pub fn run(
        &self,
        command: &mut Command,
        deadline: Option<Duration>,
    ) -> Result<ProcessOutcome, ProcessError> {
        let started = Instant::now();
        let mut child = spawn(command)?;
        self.supervise(&mut child, started, deadline)
            .map_err(|source| ProcessError::Wait {
                program: program_name(command),
                source,
            })
    }

    /// Like [`run`](Self::run) but capture the child's standard output.
    ///
    /// Output written before a timeout or interrupt is returned as well.
    pub fn run_captured(
        &self,
        command: &mut Command,
        deadline: Option<Duration>,
    ) -> Result<(ProcessOutcome, Vec<u8>), ProcessError> {
        command.stdout(Stdio::piped());
        let started = Instant::now();
        let mut child = spawn(command)?;

        let stdout = child.stdout.take();
        let reader = thread::spawn(move || {
            let mut buf = Vec::new();
            if let Some(mut out) = stdout {
                if let Err(e) = out.read_to_end(&mut buf) {
                    tracing::debug!("reading child output failed: {}", e);
                }
            }
            buf
        });

        let outcome = self.supervise(&mut child, started, deadline);
        let captured = reader.join().unwrap_or_default();
        let outcome = outcome.map_err(|source| ProcessError::Wait {
            program: program_name(command),
            source,
        })?;
        Ok((outcome, captured))
    }

    fn supervise(
        &self,
        child: &mut Child,
        started: Instant,
        deadline: Option<Duration>,
    ) -> io::Result<ProcessOutcome> {
        let pid = child.id();
        let (tx, rx) = mpsc::channel();
        let waiter = thread::spawn(move || {
            let exited = wait_for_exit(pid).map(|()| Instant::now());
            // The receiver is gone once the child was killed; nothing to report.
            let _ = tx.send(exited);
        });

        let ending = loop {
            let poll = match deadline {
                Some(deadline) => {
                    let remaining = deadline.saturating_sub(started.elapsed());
                    if remaining.is_zero() {
                        break Ending::TimedOut;
                    }
                    remaining.min(POLL_INTERVAL)
                }
                None => POLL_INTERVAL,
            };
            match rx.recv_timeout(poll) {
                Ok(Ok(exited_at)) => break Ending::Exited(exited_at.saturating_duration_since(started)),
                Ok(Err(e)) => break Ending::WaitFailed(e),
                Err(RecvTimeoutError::Timeout) => {
                    if self.interrupted() {
                        break Ending::Interrupted;
                    }
                }
                Err(RecvTimeoutError::Disconnected) => {
                    break Ending::WaitFailed(io::Error::other("waiter thread exited early"));
                }
            }
        };

        let outcome = match ending {
            Ending::Exited(elapsed) => {
                let status = child.wait()?;
                tracing::debug!(
                    pid,
                    "process exited with {} after {:.4} seconds",
                    describe_status(status),
                    elapsed.as_secs_f64()
                );
                Ok(ProcessOutcome::Exited { status, elapsed })
            }
            Ending::TimedOut => {
                tracing::debug!(pid, "deadline expired, killing process");
                kill_and_reap(child)?;
                Ok(ProcessOutcome::TimedOut)
            }
            Ending::Interrupted => {
                tracing::debug!(pid, "interrupted, killing process");
                kill_and_reap(child)?;
                Ok(ProcessOutcome::Interrupted)
            }
            Ending::WaitFailed(e) => {
                kill_and_reap(child)?;
                Err(e)
            }
        };

        // Once the child is reaped the waiter's `waitid` has returned or fails fast.
        let _ = waiter.join();
        outcome
    }
}

fn spawn(command: &mut Command) -> Result<Child, ProcessError> {
    tracing::debug!("running {:?}", command);
    // Own process group, so a kill also reaches whatever the child spawned.
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        command.process_group(0);
    }
    command.spawn().map_err(|source| ProcessError::Spawn {
        program: program_name(command),
        source,
    })
}

fn program_name(command: &Command) -> String {
    command.get_program().to_string_lossy().into_owned()
}

fn kill_and_reap(child: &mut Child) -> io::Result<()> {
    // Fails only if the child already exited, in which case `wait` reaps it.
    #[cfg(unix)]
    let _ = kill_process_group(child.id());
    #[cfg(not(unix))]
    let _ = child.kill();
    child.wait().map(|_| ())
}

/// Send SIGKILL to the process group led by `pid`.
#[cfg(unix)]
fn kill_process_group(pid: u32) -> io::Result<()> {
    let ret = unsafe { libc::kill(-(pid as libc::pid_t), libc::SIGKILL) };
    if ret == -1 {
        Err(io::Error::last_os_error())
    } else {
        Ok(())
    }
}

/// Block until `pid` has exited without reaping it.
#[cfg(unix)]
fn wait_for_exit(pid: u32) -> io::Result<()> {
    loop {
        let mut info: libc::siginfo_t = unsafe { std::mem::zeroed() };
        let ret = unsafe {
            libc::waitid(
                libc::P_PID,
                pid as libc::id_t,
                &mut info,
                libc::WEXITED | libc::WNOWAIT,
            )
        };
        if ret == 0 {
            return Ok(());
        }
        let err = io::Error::last_os_error();
        if err.kind() != io::ErrorKind::Interrupted {
            return Err(err);
        }
    }
}

#[cfg(not(unix))]
fn wait_for_exit(_pid: u32) -> io::Result<()> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "supervising child processes requires a Unix platform",
    ))
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn sh(script: &str) -> Command {
        let mut command = Command::new("/bin/sh");
        command
            .arg("-c")
            .arg(script)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        command
    }

    #[test]
    fn test_exit_status_and_timing() {
        let outcome = ProcessRunner::new().run(&mut sh("exit 3"), None).unwrap();
        match outcome {
            ProcessOutcome::Exited { status, elapsed } => {
                assert_eq!(status.code(), Some(3));
                assert!(elapsed < Duration::from_secs(5));
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[test]
    fn test_deadline_kills_child() {
        let started = Instant::now();
        let outcome = ProcessRunner::new()
            .run(&mut sh("sleep 10"), Some(Duration::from_millis(200)))
            .unwrap();
        assert_eq!(outcome, ProcessOutcome::TimedOut);
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_interrupt_kills_child() {
        static FLAG: AtomicBool = AtomicBool::new(true);
        let outcome = ProcessRunner::new()
            .with_interrupt(&FLAG)
            .run(&mut sh("sleep 10"), None)
            .unwrap();
        assert_eq!(outcome, ProcessOutcome::Interrupted);
    }

    #[test]
    fn test_capture_stdout() {
        let (outcome, out) = ProcessRunner::new()
            .run_captured(&mut sh("echo 1.5 0.25 7"), Some(Duration::from_secs(30)))
            .unwrap();
        assert!(matches!(outcome, ProcessOutcome::Exited { .. }));
        assert_eq!(String::from_utf8(out).unwrap().trim(), "1.5 0.25 7");
    }

    #[test]
    fn test_spawn_failure() {
        let err = ProcessRunner::new()
            .run(&mut Command::new("/nonexistent/program"), None)
            .unwrap_err();
        assert!(matches!(err, ProcessError::Spawn { .. }));
        assert!(err.to_string().starts_with("Cannot run /nonexistent/program: "));
    }

    #[test]
    fn test_describe_status() {
        let outcome = ProcessRunner::new().run(&mut sh("kill -9 $$"), None).unwrap();
        let ProcessOutcome::Exited { status, .. } = outcome else {
            panic!("child should have exited");
        };
        assert_eq!(describe_status(status), "signal 9");
    }
}
