//! Launch supervisor: owns the child processes and drives the lifecycle
//!
//! The supervisor is the only component allowed to terminate or wait on the
//! launched children. It drives the phase machine:
//!
//! ```text
//! Idle → CheckingEnv → StartingBackend → AwaitingReadiness
//!      → (StartingFrontend |) → Running → ShuttingDown → Terminated
//! ```
//!
//! `Terminated` is the single terminal state; there are no restart or
//! recovery transitions. The supervisor's job ends when the backend process
//! ends or the user interrupts. Phases are published on a `watch` channel so
//! the CLI and tests can observe transitions.

use crate::config::LaunchConfig;
use crate::launcher::{
    CapturePolicy, LaunchSpec, ManagedProcess, ProcessAdapter, ProcessExit, ProcessRole,
};
use crate::readiness::{ReadinessGate, ReadinessProbe};
use crate::toolchain;
use crate::{CoreError, Result};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};

/// Lifecycle phase of the launch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchPhase {
    /// Nothing has happened yet
    Idle,
    /// Probing required toolchains
    CheckingEnv,
    /// Running the backend prepare step and spawning the backend
    StartingBackend,
    /// Waiting for the backend to answer its health endpoint
    AwaitingReadiness,
    /// Installing frontend dependencies and spawning the frontend
    StartingFrontend,
    /// All children up; blocking on interrupt or backend exit
    Running,
    /// Terminating owned children
    ShuttingDown,
    /// Terminal state, successful or not
    Terminated,
}

/// Why the supervisor stopped running
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchOutcome {
    /// The user interrupted; children were torn down, exit should be 0
    Interrupted,
    /// The backend exited on its own; remaining children were torn down and
    /// the controlling process should reflect the backend's exit condition
    BackendExited(ProcessExit),
}

/// Supervisor owning the lifecycle of the backend and optional frontend
pub struct Supervisor {
    config: LaunchConfig,
    adapter: Arc<dyn ProcessAdapter>,
    probe: Arc<dyn ReadinessProbe>,
    phase_tx: watch::Sender<LaunchPhase>,
    shutdown_rx: watch::Receiver<bool>,
    /// Owned backend process, mandatory once startup begins
    backend: Option<Box<dyn ManagedProcess>>,
    /// Owned frontend process, present only if launched
    frontend: Option<Box<dyn ManagedProcess>>,
    frontend_enabled: bool,
}

impl Supervisor {
    /// Create a supervisor
    ///
    /// `shutdown_rx` is the external cancellation input: the binary flips it
    /// to `true` from its interrupt handler. The supervisor reacts to it
    /// only while blocked in the `Running` phase.
    pub fn new(
        config: LaunchConfig,
        adapter: Arc<dyn ProcessAdapter>,
        probe: Arc<dyn ReadinessProbe>,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Self {
        let (phase_tx, _) = watch::channel(LaunchPhase::Idle);
        Self {
            config,
            adapter,
            probe,
            phase_tx,
            shutdown_rx,
            backend: None,
            frontend: None,
            frontend_enabled: true,
        }
    }

    /// Enable or disable the frontend launch regardless of directory presence
    pub fn with_frontend(mut self, enabled: bool) -> Self {
        self.frontend_enabled = enabled;
        self
    }

    /// Subscribe to phase transitions
    pub fn subscribe_phase(&self) -> watch::Receiver<LaunchPhase> {
        self.phase_tx.subscribe()
    }

    /// Current lifecycle phase
    pub fn current_phase(&self) -> LaunchPhase {
        *self.phase_tx.borrow()
    }

    /// Number of currently owned child processes (0, 1, or 2)
    pub fn owned_processes(&self) -> usize {
        self.backend.is_some() as usize + self.frontend.is_some() as usize
    }

    /// Run the whole launch lifecycle to completion
    ///
    /// On success the environment came up, ran, and was torn down; the
    /// outcome says whether an interrupt or a backend exit ended it. On a
    /// fatal startup error anything already spawned is terminated before
    /// the error is returned.
    pub async fn run(&mut self) -> Result<LaunchOutcome> {
        match self.launch().await {
            Ok(outcome) => {
                self.set_phase(LaunchPhase::Terminated);
                Ok(outcome)
            }
            Err(e) => {
                if self.owned_processes() > 0 {
                    self.set_phase(LaunchPhase::ShuttingDown);
                    self.teardown().await;
                }
                self.set_phase(LaunchPhase::Terminated);
                Err(e)
            }
        }
    }

    async fn launch(&mut self) -> Result<LaunchOutcome> {
        self.set_phase(LaunchPhase::CheckingEnv);
        if !toolchain::probe_and_report(&self.config.toolchains).await {
            return Err(CoreError::ToolchainMissing(
                "one or more required toolchains are not installed".to_string(),
            ));
        }

        self.set_phase(LaunchPhase::StartingBackend);
        if let Some(prepare) = self.config.backend.prepare.clone() {
            info!("Resolving backend dependencies: {}", prepare.display());
            let spec = LaunchSpec {
                role: ProcessRole::Backend,
                working_dir: Some(self.config.backend.root.clone()),
                command: prepare.command.clone(),
                args: prepare.args.clone(),
                capture: CapturePolicy::Inherited,
            };
            let exit = self.adapter.run_blocking(&spec).await?;
            if !exit.success() {
                return Err(CoreError::DependencyInstall(format!(
                    "backend prepare step `{}` exited with {:?}",
                    prepare.display(),
                    exit.exit_code
                )));
            }
        }

        let backend = self.adapter.spawn(&self.backend_spec()).await?;
        info!("Backend started (pid {})", backend.pid());
        self.backend = Some(backend);

        self.set_phase(LaunchPhase::AwaitingReadiness);
        let gate = ReadinessGate::from_config(&self.config.readiness);
        if let Err(e) = gate.wait_ready(self.probe.as_ref()).await {
            // The backend is already running; run() tears it down
            return Err(CoreError::ReadinessFailed(e.to_string()));
        }

        // Frontend presence is evaluated now, strictly after readiness
        if self.frontend_enabled && self.config.frontend.root.is_dir() {
            self.set_phase(LaunchPhase::StartingFrontend);
            self.start_frontend().await?;
        }

        self.set_phase(LaunchPhase::Running);
        let outcome = self.block_until_shutdown().await?;

        self.set_phase(LaunchPhase::ShuttingDown);
        self.teardown().await;
        Ok(outcome)
    }

    async fn start_frontend(&mut self) -> Result<()> {
        let frontend = &self.config.frontend;
        let marker = frontend.root.join(&frontend.dependency_marker);
        if !marker.exists() {
            info!(
                "Installing frontend dependencies: {}",
                frontend.install.display()
            );
            let spec = LaunchSpec {
                role: ProcessRole::Frontend,
                working_dir: Some(frontend.root.clone()),
                command: frontend.install.command.clone(),
                args: frontend.install.args.clone(),
                capture: CapturePolicy::Inherited,
            };
            let exit = self.adapter.run_blocking(&spec).await?;
            if !exit.success() {
                return Err(CoreError::DependencyInstall(format!(
                    "frontend install step `{}` exited with {:?}",
                    frontend.install.display(),
                    exit.exit_code
                )));
            }
        }

        let process = self.adapter.spawn(&self.frontend_spec()).await?;
        info!("Frontend dev server started (pid {})", process.pid());
        self.frontend = Some(process);
        Ok(())
    }

    /// Block until the interrupt fires or the backend exits, whichever first
    async fn block_until_shutdown(&mut self) -> Result<LaunchOutcome> {
        let mut shutdown_rx = self.shutdown_rx.clone();
        let backend = self.backend.as_mut().ok_or_else(|| {
            CoreError::Initialization("no backend process owned in Running phase".to_string())
        })?;

        tokio::select! {
            res = shutdown_rx.wait_for(|stop| *stop) => {
                if res.is_err() {
                    warn!("Shutdown channel closed, treating as interrupt");
                } else {
                    info!("Interrupt received, shutting down");
                }
                Ok(LaunchOutcome::Interrupted)
            }
            exit = backend.wait() => {
                let exit = exit?;
                warn!(
                    "Backend exited on its own (pid {}, code {:?}, signal {:?})",
                    exit.pid, exit.exit_code, exit.signal
                );
                Ok(LaunchOutcome::BackendExited(exit))
            }
        }
    }

    /// Terminate every owned child exactly once, backend first
    ///
    /// Termination is idempotent at both layers: each entry is taken out of
    /// the owned set, and [`ManagedProcess::terminate`] is a no-op on a
    /// process that already exited.
    async fn teardown(&mut self) {
        if let Some(mut backend) = self.backend.take() {
            if let Err(e) = backend.terminate().await {
                warn!("Failed to terminate backend (pid {}): {}", backend.pid(), e);
            }
        }
        if let Some(mut frontend) = self.frontend.take() {
            if let Err(e) = frontend.terminate().await {
                warn!(
                    "Failed to terminate frontend (pid {}): {}",
                    frontend.pid(),
                    e
                );
            }
        }
    }

    fn backend_spec(&self) -> LaunchSpec {
        LaunchSpec {
            role: ProcessRole::Backend,
            working_dir: Some(self.config.backend.root.clone()),
            command: self.config.backend.run.command.clone(),
            args: self.config.backend.run.args.clone(),
            capture: CapturePolicy::Captured,
        }
    }

    fn frontend_spec(&self) -> LaunchSpec {
        LaunchSpec {
            role: ProcessRole::Frontend,
            working_dir: Some(self.config.frontend.root.clone()),
            command: self.config.frontend.run.command.clone(),
            args: self.config.frontend.run.args.clone(),
            capture: CapturePolicy::Inherited,
        }
    }

    fn set_phase(&self, phase: LaunchPhase) {
        let previous = *self.phase_tx.borrow();
        if previous != phase {
            info!("Phase: {:?} -> {:?}", previous, phase);
            self.phase_tx.send_replace(phase);
        }
    }
}
