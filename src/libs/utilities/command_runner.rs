//! Bounded-time execution of external commands.
//!
//! Every command the tool spawns (version probes and action commands alike)
//! goes through a [`CommandRunner`], so the prober and the executor can be
//! driven by scripted runners in tests.

use crate::schemas::config::Invocation;
use std::io;
use std::process::{Output, Stdio};
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;
use tokio::runtime::Runtime;
use tokio::time::timeout;

/// Captured result of a command that ran to completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code; `None` when the process was ended by a signal.
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Why a command produced no exit status.
#[derive(Debug, Error)]
pub enum RunError {
    /// The command outlived its timeout and was killed.
    #[error("timed out after {0:?}")]
    Timeout(Duration),
    /// The command could not be started (missing program, permission denied).
    #[error("failed to start: {0}")]
    Spawn(#[source] io::Error),
    /// The command started but collecting its output failed.
    #[error("failed while waiting: {0}")]
    Wait(#[source] io::Error),
}

/// Runs one invocation to completion or until `limit` elapses.
pub trait CommandRunner {
    fn run(&self, invocation: &Invocation, limit: Duration) -> Result<CommandOutput, RunError>;
}

/// How long a timed-out command's process group gets between SIGTERM and SIGKILL.
/// `sudo` relays SIGTERM to the root-owned command it started; SIGKILL from an
/// unprivileged caller cannot reach that command.
const TERMINATION_GRACE: Duration = Duration::from_secs(3);

/// Runs real processes on a single-threaded tokio runtime.
///
/// Each command leads its own process group, so a timeout terminates the whole
/// pipeline (`sh -c "curl ... | bash - && apt-get ..."`), not just the shell.
/// The calling thread blocks until the group exits or is killed.
pub struct SystemRunner {
    runtime: Runtime,
}

impl SystemRunner {
    pub fn new() -> io::Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build()?;
        Ok(SystemRunner { runtime })
    }
}

impl CommandRunner for SystemRunner {
    fn run(&self, invocation: &Invocation, limit: Duration) -> Result<CommandOutput, RunError> {
        let mut command = Command::new(&invocation.program);
        command
            .args(&invocation.args)
            .envs(&invocation.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        command.process_group(0);

        let output = self.runtime.block_on(run_in_group(&mut command, limit))?;

        Ok(CommandOutput {
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// Spawns `command` and waits for it, terminating its process group on timeout.
async fn run_in_group(command: &mut Command, limit: Duration) -> Result<Output, RunError> {
    let child = command.spawn().map_err(RunError::Spawn)?;
    let group = child.id();
    let mut waiting = Box::pin(child.wait_with_output());

    match timeout(limit, &mut waiting).await {
        Ok(result) => result.map_err(RunError::Wait),
        Err(_) => {
            // A group id stays reserved while any member lives, even after the leader is reaped.
            if let Some(group) = group {
                signal_group(group, Signal::Terminate);
                if timeout(TERMINATION_GRACE, &mut waiting).await.is_err() {
                    signal_group(group, Signal::Kill);
                }
            }
            drop(waiting);
            Err(RunError::Timeout(limit))
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Signal {
    Terminate,
    Kill,
}

/// Signals every process in the group led by `group`. Errors (the group is
/// already gone, or a member belongs to root) are ignored.
#[cfg(unix)]
fn signal_group(group: u32, signal: Signal) {
    let Ok(pgid) = libc::pid_t::try_from(group) else {
        return;
    };
    let signo = match signal {
        Signal::Terminate => libc::SIGTERM,
        Signal::Kill => libc::SIGKILL,
    };
    // SAFETY: killpg only sends a signal and has no memory-safety preconditions.
    unsafe {
        libc::killpg(pgid, signo);
    }
}

#[cfg(not(unix))]
fn signal_group(_group: u32, _signal: Signal) {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_runner_captures_output_and_exit_code() {
        let runner = SystemRunner::new().unwrap();
        let ok = runner
            .run(&Invocation::new("sh", &["-c", "echo out; echo err >&2"]), Duration::from_secs(5))
            .unwrap();
        assert!(ok.success());
        assert_eq!(ok.stdout.trim(), "out");
        assert_eq!(ok.stderr.trim(), "err");

        let failed = runner
            .run(&Invocation::new("sh", &["-c", "exit 3"]), Duration::from_secs(5))
            .unwrap();
        assert_eq!(failed.exit_code, Some(3));
        assert!(!failed.success());
    }

    #[test]
    fn test_system_runner_times_out() {
        let runner = SystemRunner::new().unwrap();
        let result = runner.run(&Invocation::new("sleep", &["5"]), Duration::from_millis(100));
        assert!(matches!(result, Err(RunError::Timeout(_))));
    }

    #[cfg(unix)]
    #[test]
    fn test_timeout_terminates_grandchildren() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("finished");
        let script = format!("sh -c 'sleep 2; touch {}'; true", marker.display());

        let runner = SystemRunner::new().unwrap();
        let started = std::time::Instant::now();
        let result = runner.run(&Invocation::new("sh", &["-c", script.as_str()]), Duration::from_millis(300));
        assert!(matches!(result, Err(RunError::Timeout(_))));
        assert!(started.elapsed() < Duration::from_secs(2), "the group died on SIGTERM");

        std::thread::sleep(Duration::from_secs(3));
        assert!(!marker.exists(), "the inner shell kept running after the timeout");
    }

    #[test]
    fn test_system_runner_reports_missing_program() {
        let runner = SystemRunner::new().unwrap();
        let result = runner.run(
            &Invocation::new("definitely_not_a_real_executable_12345", &[]),
            Duration::from_secs(1),
        );
        assert!(matches!(result, Err(RunError::Spawn(_))));
    }
}
