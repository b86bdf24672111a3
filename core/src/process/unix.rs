//! Unix process management with safe spawn/kill using process groups
//!
//! Every spawned child calls `setsid()` before `exec()`, becoming leader of
//! its own session and process group. Signals are then delivered to the
//! negative process ID, which targets the whole group, so helper processes
//! started by the backend or the frontend dev server are cleaned up too.
//! SIGTERM is used for graceful termination, SIGKILL as the escalation.

// Process management requires libc::setsid() calls
#![allow(unsafe_code)]

use crate::launcher::CapturePolicy;
use crate::{CoreError, Result};
use nix::sys::signal::{killpg, Signal};
use nix::unistd::Pid;
use std::path::Path;
use std::process::Stdio;
use tokio::process::{Child, Command};
use tracing::{debug, error, warn};

/// A child process managed with Unix process groups
///
/// The process is guaranteed to be in its own process group, allowing
/// reliable cleanup of the entire process tree.
#[derive(Debug)]
pub struct ChildProcess {
    /// The process ID of the spawned process
    pid: Pid,
    /// The underlying Child handle for waiting and status checking
    child: Child,
}

impl ChildProcess {
    /// Get the process ID
    pub fn pid(&self) -> u32 {
        self.pid.as_raw() as u32
    }

    /// Get the process group ID (same as PID for session leaders)
    pub fn pgid(&self) -> u32 {
        self.pid.as_raw() as u32
    }

    /// Wait for the process to exit and return its exit status (async)
    pub async fn wait(&mut self) -> Result<std::process::ExitStatus> {
        self.child.wait().await.map_err(|e| {
            CoreError::ProcessWait(format!("Failed to wait for process {}: {}", self.pid, e))
        })
    }

    /// Try to wait for the process to exit without blocking
    pub fn try_wait(&mut self) -> Result<Option<std::process::ExitStatus>> {
        self.child.try_wait().map_err(|e| {
            CoreError::ProcessWait(format!(
                "Failed to try_wait for process {}: {}",
                self.pid, e
            ))
        })
    }
}

/// Spawn a new process in its own process group
///
/// The child is placed in its own process group via `setsid()`. Stdio is
/// wired according to `capture`: [`CapturePolicy::Captured`] pipes stdout
/// and stderr away from the terminal, [`CapturePolicy::Inherited`] lets the
/// child write straight to the controlling terminal.
///
/// ## Safety
///
/// `setsid()` is async-signal-safe and called in the child between `fork()`
/// and `exec()`, which is the supported use of `pre_exec`.
pub fn spawn(
    cmd: &str,
    args: &[&str],
    working_dir: Option<&Path>,
    capture: CapturePolicy,
) -> Result<ChildProcess> {
    debug!("Spawning process: {} {:?} (cwd {:?})", cmd, args, working_dir);

    let mut command = Command::new(cmd);
    command.args(args);
    if let Some(dir) = working_dir {
        command.current_dir(dir);
    }
    match capture {
        CapturePolicy::Captured => {
            command.stdout(Stdio::piped());
            command.stderr(Stdio::piped());
        }
        CapturePolicy::Inherited => {
            command.stdout(Stdio::inherit());
            command.stderr(Stdio::inherit());
        }
    }

    // Use pre_exec to call setsid() in the child process
    #[deny(unsafe_op_in_unsafe_fn)]
    unsafe {
        command.pre_exec(|| {
            // Create a new session and process group
            let result = libc::setsid();
            if result == -1 {
                return Err(std::io::Error::last_os_error());
            }
            Ok(())
        });
    }

    let child = command.spawn().map_err(|e| {
        error!("Failed to spawn process '{}': {}", cmd, e);
        CoreError::ProcessSpawn(format!("Failed to spawn '{}': {}", cmd, e))
    })?;

    let raw_pid = child
        .id()
        .ok_or_else(|| CoreError::ProcessSpawn("Spawned child did not have a PID".to_string()))?;
    let pid = Pid::from_raw(raw_pid as i32);
    debug!("Successfully spawned process {} in new process group", pid);

    Ok(ChildProcess { pid, child })
}

impl ChildProcess {
    /// Take the stdout handle for async reading, if available
    pub fn take_stdout(&mut self) -> Option<tokio::process::ChildStdout> {
        self.child.stdout.take()
    }

    /// Take the stderr handle for async reading, if available
    pub fn take_stderr(&mut self) -> Option<tokio::process::ChildStderr> {
        self.child.stderr.take()
    }
}

/// Send SIGTERM to the process group for graceful termination
///
/// `ESRCH` (no such process) and `EPERM` are treated as success: the group
/// has already exited, and signalling an exited process must stay a no-op.
pub fn signal_term_group(child: &ChildProcess) -> Result<()> {
    debug!("Sending SIGTERM to process group {}", child.pid);

    match killpg(child.pid, Signal::SIGTERM) {
        Ok(()) => Ok(()),
        Err(nix::errno::Errno::ESRCH) => {
            debug!("Process group {} already exited", child.pid);
            Ok(())
        }
        Err(nix::errno::Errno::EPERM) => {
            debug!(
                "Permission denied signaling process group {} (likely already exited)",
                child.pid
            );
            Ok(())
        }
        Err(e) => {
            error!(
                "Failed to send SIGTERM to process group {}: {}",
                child.pid, e
            );
            Err(CoreError::ProcessSignal(format!(
                "Failed to send SIGTERM to process group {}: {}",
                child.pid, e
            )))
        }
    }
}

/// Send SIGKILL to the process group for forceful termination
///
/// Same `ESRCH`/`EPERM` handling as [`signal_term_group`].
pub fn signal_kill_group(child: &ChildProcess) -> Result<()> {
    debug!("Sending SIGKILL to process group {}", child.pid);

    match killpg(child.pid, Signal::SIGKILL) {
        Ok(()) => Ok(()),
        Err(nix::errno::Errno::ESRCH) => {
            debug!("Process group {} already exited", child.pid);
            Ok(())
        }
        Err(nix::errno::Errno::EPERM) => {
            debug!(
                "Permission denied signaling process group {} (likely already exited)",
                child.pid
            );
            Ok(())
        }
        Err(e) => {
            error!(
                "Failed to send SIGKILL to process group {}: {}",
                child.pid, e
            );
            Err(CoreError::ProcessSignal(format!(
                "Failed to send SIGKILL to process group {}: {}",
                child.pid, e
            )))
        }
    }
}

/// Graceful termination with timeout fallback to SIGKILL
///
/// Sends SIGTERM to the group, waits up to `timeout` for the process to
/// exit, and escalates to SIGKILL if it is still running.
pub async fn terminate_with_timeout(
    child: &mut ChildProcess,
    timeout: std::time::Duration,
) -> Result<std::process::ExitStatus> {
    signal_term_group(child)?;

    let start = tokio::time::Instant::now();
    while start.elapsed() < timeout {
        if let Some(status) = child.try_wait()? {
            debug!(
                "Process {} exited gracefully with status: {}",
                child.pid, status
            );
            return Ok(status);
        }
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    }

    warn!(
        "Process {} did not exit gracefully within {:?}, using SIGKILL",
        child.pid, timeout
    );
    signal_kill_group(child)?;

    // SIGKILL cannot be caught, but reaping still takes a moment
    let kill_timeout = std::time::Duration::from_secs(5);
    let kill_start = tokio::time::Instant::now();
    while kill_start.elapsed() < kill_timeout {
        if let Some(status) = child.try_wait()? {
            return Ok(status);
        }
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    }

    Err(CoreError::ProcessWait(format!(
        "Process {} did not exit even after SIGKILL within {:?}",
        child.pid, kill_timeout
    )))
}
