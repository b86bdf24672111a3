//! Core functionality for the devup launcher
//!
//! This crate contains the launcher's building blocks: toolchain probing,
//! process launching, readiness gating, and the supervisor that owns the
//! spawned children. The `devup` binary wires them together.

pub mod config;
pub mod error;
pub mod launcher;
#[cfg(unix)]
pub mod process;
pub mod readiness;
pub mod supervisor;
pub mod toolchain;

pub use config::{load_config_from_toml_path, load_config_from_toml_str, LaunchConfig};
pub use error::{CoreError, Result};
pub use launcher::{
    CapturePolicy, LaunchSpec, ManagedProcess, ProcessAdapter, ProcessExit, ProcessRole,
};
#[cfg(unix)]
pub use launcher::UnixProcessAdapter;
pub use readiness::{HttpProbe, ReadinessGate, ReadinessProbe};
pub use supervisor::{LaunchOutcome, LaunchPhase, Supervisor};
pub use toolchain::ToolchainRequirement;

/// Core utilities and helper functions
pub mod utils {
    use tracing::info;

    /// Initialize tracing for the application
    pub fn init_tracing(level: &str) -> crate::Result<()> {
        use tracing_subscriber::{fmt, EnvFilter};

        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

        fmt()
            .with_env_filter(filter)
            .try_init()
            .map_err(|e| crate::CoreError::Initialization(e.to_string()))?;

        info!("Tracing initialized with level: {}", level);
        Ok(())
    }
}
