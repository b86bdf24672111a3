//! Process launching: adapter traits and implementations
//!
//! The supervisor never talks to the OS directly; it goes through a
//! [`ProcessAdapter`], which returns [`ManagedProcess`] handles. This keeps
//! the lifecycle logic testable with a mock adapter while the real
//! [`UnixProcessAdapter`] spawns process-group children.

use crate::{CoreError, Result};
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

/// Which launcher-managed service a process belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessRole {
    /// The backend API server
    Backend,
    /// The frontend dev server
    Frontend,
}

/// What happens to a child's stdout/stderr
///
/// The backend is spawned [`Captured`](CapturePolicy::Captured) because its
/// readiness is verified programmatically; the frontend is spawned
/// [`Inherited`](CapturePolicy::Inherited) because its own log output is the
/// user's only signal of success.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapturePolicy {
    /// Pipe stdout/stderr away from the terminal
    Captured,
    /// Let the child write straight to the controlling terminal
    Inherited,
}

/// Everything needed to spawn one child process
#[derive(Debug, Clone, PartialEq)]
pub struct LaunchSpec {
    /// Role of the process being launched
    pub role: ProcessRole,
    /// Working directory for the child, if any
    pub working_dir: Option<PathBuf>,
    /// Executable name (must be in PATH or an absolute path)
    pub command: String,
    /// Command line arguments
    pub args: Vec<String>,
    /// Output capture policy
    pub capture: CapturePolicy,
}

/// Exit information for a finished process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessExit {
    /// Process ID that exited
    pub pid: u32,
    /// Exit code if the process exited normally
    pub exit_code: Option<i32>,
    /// Signal number if the process was killed by a signal (Unix)
    pub signal: Option<i32>,
}

impl ProcessExit {
    /// Whether the process exited normally with code 0
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Trait representing a launched process that can be controlled and awaited
///
/// A handle is valid between successful spawn and confirmed termination.
/// `terminate` must be idempotent: double-termination is a no-op, not an
/// error, including when the process has already exited on its own.
#[async_trait]
pub trait ManagedProcess: Send + Sync {
    /// Get the process ID
    fn pid(&self) -> u32;

    /// Wait for the process to exit
    async fn wait(&mut self) -> Result<ProcessExit>;

    /// Terminate the process gracefully (SIGTERM to the group), idempotently
    async fn terminate(&mut self) -> Result<()>;

    /// Kill the process forcefully (SIGKILL to the group)
    async fn kill(&mut self) -> Result<()>;
}

impl std::fmt::Debug for dyn ManagedProcess {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManagedProcess")
            .field("pid", &self.pid())
            .finish()
    }
}

/// Trait for launching processes in a platform-agnostic way
#[async_trait]
pub trait ProcessAdapter: Send + Sync {
    /// Spawn a child process, returning a handle immediately
    async fn spawn(&self, spec: &LaunchSpec) -> Result<Box<dyn ManagedProcess>>;

    /// Run a command to completion and return its exit information
    ///
    /// Used for blocking prerequisite steps (dependency resolution and
    /// installs). A spawn failure is an error; a non-zero exit is reported
    /// through the returned [`ProcessExit`] so the caller decides how fatal
    /// it is.
    async fn run_blocking(&self, spec: &LaunchSpec) -> Result<ProcessExit>;
}

fn exit_from_status(pid: u32, status: std::process::ExitStatus) -> ProcessExit {
    let (exit_code, signal) = if let Some(code) = status.code() {
        (Some(code), None)
    } else {
        #[cfg(unix)]
        {
            use std::os::unix::process::ExitStatusExt;
            (None, status.signal())
        }
        #[cfg(not(unix))]
        {
            (None, None)
        }
    };
    ProcessExit {
        pid,
        exit_code,
        signal,
    }
}

/// Drain a captured output stream into the debug log
#[cfg(unix)]
fn spawn_drain<R>(role: ProcessRole, stream: &'static str, reader: R)
where
    R: tokio::io::AsyncRead + Unpin + Send + 'static,
{
    use tokio::io::AsyncBufReadExt;

    tokio::spawn(async move {
        let mut lines = tokio::io::BufReader::new(reader).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            debug!("[{:?}/{}] {}", role, stream, line);
        }
    });
}

/// Unix process adapter backed by the process-group helpers
#[cfg(unix)]
#[derive(Copy, Clone, Debug, Default)]
pub struct UnixProcessAdapter;

#[cfg(unix)]
impl UnixProcessAdapter {
    /// Create a new Unix process adapter
    pub fn new() -> Self {
        Self
    }
}

#[cfg(unix)]
#[async_trait]
impl ProcessAdapter for UnixProcessAdapter {
    async fn spawn(&self, spec: &LaunchSpec) -> Result<Box<dyn ManagedProcess>> {
        use crate::process::unix;

        debug!(
            "Spawning {:?} process: {} {:?}",
            spec.role, spec.command, spec.args
        );

        let args: Vec<&str> = spec.args.iter().map(|s| s.as_str()).collect();
        let mut child = unix::spawn(
            &spec.command,
            &args,
            spec.working_dir.as_deref(),
            spec.capture,
        )?;

        // Captured output still has to be drained or the child blocks once
        // the pipe buffer fills; feed it to the debug log instead
        if spec.capture == CapturePolicy::Captured {
            if let Some(stdout) = child.take_stdout() {
                spawn_drain(spec.role, "stdout", stdout);
            }
            if let Some(stderr) = child.take_stderr() {
                spawn_drain(spec.role, "stderr", stderr);
            }
        }

        Ok(Box::new(UnixManagedProcess {
            child,
            terminated: false,
        }))
    }

    async fn run_blocking(&self, spec: &LaunchSpec) -> Result<ProcessExit> {
        use crate::process::unix;

        debug!(
            "Running blocking step for {:?}: {} {:?}",
            spec.role, spec.command, spec.args
        );

        let args: Vec<&str> = spec.args.iter().map(|s| s.as_str()).collect();
        let mut child = unix::spawn(
            &spec.command,
            &args,
            spec.working_dir.as_deref(),
            spec.capture,
        )?;
        let pid = child.pid();
        let status = child.wait().await?;
        Ok(exit_from_status(pid, status))
    }
}

/// Unix managed process implementation
#[cfg(unix)]
struct UnixManagedProcess {
    child: crate::process::unix::ChildProcess,
    terminated: bool,
}

#[cfg(unix)]
#[async_trait]
impl ManagedProcess for UnixManagedProcess {
    fn pid(&self) -> u32 {
        self.child.pid()
    }

    async fn wait(&mut self) -> Result<ProcessExit> {
        let pid = self.pid();
        let status = self.child.wait().await?;
        Ok(exit_from_status(pid, status))
    }

    async fn terminate(&mut self) -> Result<()> {
        if self.terminated {
            debug!("Process {} already terminated, skipping", self.pid());
            return Ok(());
        }
        crate::process::unix::signal_term_group(&self.child)?;
        self.terminated = true;
        Ok(())
    }

    async fn kill(&mut self) -> Result<()> {
        crate::process::unix::signal_kill_group(&self.child)?;
        self.terminated = true;
        Ok(())
    }
}

/// What a mock process should do, scripted per spawn
#[derive(Debug, Clone, Copy)]
pub struct MockInstruction {
    /// How long until the process "exits" on its own
    pub exit_delay: std::time::Duration,
    /// Exit code to report when it does
    pub exit_code: Option<i32>,
    /// Signal to report instead of an exit code
    pub signal: Option<i32>,
}

impl Default for MockInstruction {
    fn default() -> Self {
        Self {
            exit_delay: std::time::Duration::from_secs(30),
            exit_code: Some(0),
            signal: None,
        }
    }
}

/// One entry in the mock adapter's launch log
#[derive(Debug, Clone, PartialEq)]
pub enum RecordedLaunch {
    /// `spawn` was called with this spec
    Spawned(LaunchSpec),
    /// `run_blocking` was called with this spec
    Blocking(LaunchSpec),
}

/// Mock process adapter for supervisor tests
///
/// Records every spawn and blocking run in order, hands out scripted
/// processes, and tracks which PIDs received termination signals.
#[derive(Debug, Clone, Default)]
pub struct MockProcessAdapter {
    state: Arc<std::sync::Mutex<MockState>>,
}

#[derive(Debug, Default)]
struct MockState {
    instructions: Vec<MockInstruction>,
    blocking_exit_codes: Vec<i32>,
    launches: Vec<RecordedLaunch>,
    terminations: Vec<u32>,
    next_pid: u32,
    fail_spawn: bool,
}

impl MockProcessAdapter {
    /// Create a new mock adapter with default instructions
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the next spawned process
    pub fn push_instruction(&self, instruction: MockInstruction) {
        self.state.lock().unwrap().instructions.push(instruction);
    }

    /// Script the exit code of the next blocking run (default 0)
    pub fn push_blocking_exit_code(&self, code: i32) {
        self.state.lock().unwrap().blocking_exit_codes.push(code);
    }

    /// Make every subsequent spawn fail with a `ProcessSpawn` error
    pub fn fail_spawns(&self) {
        self.state.lock().unwrap().fail_spawn = true;
    }

    /// Ordered log of spawns and blocking runs
    pub fn launches(&self) -> Vec<RecordedLaunch> {
        self.state.lock().unwrap().launches.clone()
    }

    /// PIDs that received a termination signal, in order
    pub fn terminations(&self) -> Vec<u32> {
        self.state.lock().unwrap().terminations.clone()
    }
}

#[async_trait]
impl ProcessAdapter for MockProcessAdapter {
    async fn spawn(&self, spec: &LaunchSpec) -> Result<Box<dyn ManagedProcess>> {
        let mut state = self.state.lock().unwrap();
        if state.fail_spawn {
            return Err(CoreError::ProcessSpawn(format!(
                "mock refused to spawn '{}'",
                spec.command
            )));
        }
        state.launches.push(RecordedLaunch::Spawned(spec.clone()));
        let instruction = if state.instructions.is_empty() {
            MockInstruction::default()
        } else {
            state.instructions.remove(0)
        };
        state.next_pid += 1;
        let pid = 1000 + state.next_pid;

        Ok(Box::new(MockManagedProcess {
            pid,
            instruction,
            started_at: tokio::time::Instant::now(),
            terminated: false,
            killed: false,
            shared: self.state.clone(),
        }))
    }

    async fn run_blocking(&self, spec: &LaunchSpec) -> Result<ProcessExit> {
        let mut state = self.state.lock().unwrap();
        state.launches.push(RecordedLaunch::Blocking(spec.clone()));
        let code = if state.blocking_exit_codes.is_empty() {
            0
        } else {
            state.blocking_exit_codes.remove(0)
        };
        state.next_pid += 1;
        let pid = 1000 + state.next_pid;
        Ok(ProcessExit {
            pid,
            exit_code: Some(code),
            signal: None,
        })
    }
}

/// Mock managed process for testing
struct MockManagedProcess {
    pid: u32,
    instruction: MockInstruction,
    started_at: tokio::time::Instant,
    terminated: bool,
    killed: bool,
    shared: Arc<std::sync::Mutex<MockState>>,
}

impl MockManagedProcess {
    fn should_exit(&self) -> bool {
        self.terminated || self.killed || self.started_at.elapsed() >= self.instruction.exit_delay
    }

    fn create_exit(&self) -> ProcessExit {
        let (exit_code, signal) = if self.killed {
            (None, Some(9))
        } else if self.terminated {
            (None, Some(15))
        } else {
            (self.instruction.exit_code, self.instruction.signal)
        };
        ProcessExit {
            pid: self.pid,
            exit_code,
            signal,
        }
    }
}

#[async_trait]
impl ManagedProcess for MockManagedProcess {
    fn pid(&self) -> u32 {
        self.pid
    }

    async fn wait(&mut self) -> Result<ProcessExit> {
        while !self.should_exit() {
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        Ok(self.create_exit())
    }

    async fn terminate(&mut self) -> Result<()> {
        if self.terminated || self.killed {
            return Ok(());
        }
        debug!("Terminating mock process {}", self.pid);
        self.terminated = true;
        self.shared.lock().unwrap().terminations.push(self.pid);
        Ok(())
    }

    async fn kill(&mut self) -> Result<()> {
        debug!("Killing mock process {}", self.pid);
        self.killed = true;
        self.shared.lock().unwrap().terminations.push(self.pid);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn spec(role: ProcessRole, command: &str) -> LaunchSpec {
        LaunchSpec {
            role,
            working_dir: None,
            command: command.to_string(),
            args: vec![],
            capture: CapturePolicy::Captured,
        }
    }

    #[tokio::test]
    async fn test_mock_adapter_records_launch_order() {
        let adapter = MockProcessAdapter::new();
        let _p = adapter
            .spawn(&spec(ProcessRole::Backend, "backend"))
            .await
            .unwrap();
        adapter
            .run_blocking(&spec(ProcessRole::Frontend, "install"))
            .await
            .unwrap();

        let launches = adapter.launches();
        assert_eq!(launches.len(), 2);
        assert!(matches!(&launches[0], RecordedLaunch::Spawned(s) if s.command == "backend"));
        assert!(matches!(&launches[1], RecordedLaunch::Blocking(s) if s.command == "install"));
    }

    #[tokio::test]
    async fn test_mock_process_scripted_exit() {
        let adapter = MockProcessAdapter::new();
        adapter.push_instruction(MockInstruction {
            exit_delay: Duration::from_millis(20),
            exit_code: Some(7),
            signal: None,
        });

        let mut process = adapter
            .spawn(&spec(ProcessRole::Backend, "backend"))
            .await
            .unwrap();
        let exit = process.wait().await.unwrap();
        assert_eq!(exit.exit_code, Some(7));
        assert!(!exit.success());
    }

    #[tokio::test]
    async fn test_mock_terminate_is_idempotent() {
        let adapter = MockProcessAdapter::new();
        let mut process = adapter
            .spawn(&spec(ProcessRole::Backend, "backend"))
            .await
            .unwrap();

        process.terminate().await.unwrap();
        process.terminate().await.unwrap();

        // Signalled exactly once despite two calls
        assert_eq!(adapter.terminations().len(), 1);

        let exit = process.wait().await.unwrap();
        assert_eq!(exit.signal, Some(15));
    }

    #[tokio::test]
    async fn test_mock_blocking_exit_codes() {
        let adapter = MockProcessAdapter::new();
        adapter.push_blocking_exit_code(1);

        let exit = adapter
            .run_blocking(&spec(ProcessRole::Frontend, "install"))
            .await
            .unwrap();
        assert_eq!(exit.exit_code, Some(1));

        // Queue drained, subsequent runs succeed
        let exit = adapter
            .run_blocking(&spec(ProcessRole::Frontend, "install"))
            .await
            .unwrap();
        assert!(exit.success());
    }

    #[tokio::test]
    async fn test_mock_fail_spawns() {
        let adapter = MockProcessAdapter::new();
        adapter.fail_spawns();
        let err = adapter
            .spawn(&spec(ProcessRole::Backend, "backend"))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::ProcessSpawn(_)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_unix_adapter_spawn_and_wait() {
        let adapter = UnixProcessAdapter::new();
        let mut process = adapter
            .spawn(&LaunchSpec {
                role: ProcessRole::Backend,
                working_dir: None,
                command: "true".to_string(),
                args: vec![],
                capture: CapturePolicy::Captured,
            })
            .await
            .unwrap();
        let exit = process.wait().await.unwrap();
        assert!(exit.success());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_unix_adapter_run_blocking_nonzero() {
        let adapter = UnixProcessAdapter::new();
        let exit = adapter
            .run_blocking(&LaunchSpec {
                role: ProcessRole::Backend,
                working_dir: None,
                command: "false".to_string(),
                args: vec![],
                capture: CapturePolicy::Captured,
            })
            .await
            .unwrap();
        assert_eq!(exit.exit_code, Some(1));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_unix_terminate_twice_is_noop() {
        let adapter = UnixProcessAdapter::new();
        let mut process = adapter
            .spawn(&LaunchSpec {
                role: ProcessRole::Backend,
                working_dir: None,
                command: "sleep".to_string(),
                args: vec!["10".to_string()],
                capture: CapturePolicy::Captured,
            })
            .await
            .unwrap();

        process.terminate().await.unwrap();
        process.terminate().await.unwrap();
        let exit = process.wait().await.unwrap();
        assert!(!exit.success());
    }
}
