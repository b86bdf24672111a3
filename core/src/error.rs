//! Core error types and utilities

use thiserror::Error;

/// Launcher error types
///
/// Every fatal startup condition maps to one of these variants; the CLI
/// surfaces them as a short message plus a non-zero exit status.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Required toolchain missing: {0}")]
    ToolchainMissing(String),

    #[error("Failed to spawn process: {0}")]
    ProcessSpawn(String),

    #[error("Dependency install failed: {0}")]
    DependencyInstall(String),

    #[error("Backend readiness check failed: {0}")]
    ReadinessFailed(String),

    #[error("Failed to wait for process: {0}")]
    ProcessWait(String),

    #[error("Failed to signal process: {0}")]
    ProcessSignal(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Initialization error: {0}")]
    Initialization(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CoreError {
    /// Get error code for this error type
    pub fn code(&self) -> &'static str {
        match self {
            CoreError::ToolchainMissing(_) => "DEV001",
            CoreError::ProcessSpawn(_) => "DEV002",
            CoreError::DependencyInstall(_) => "DEV003",
            CoreError::ReadinessFailed(_) => "DEV004",
            CoreError::ProcessWait(_) => "DEV005",
            CoreError::ProcessSignal(_) => "DEV006",
            CoreError::Configuration(_) => "DEV007",
            CoreError::Validation(_) => "DEV008",
            CoreError::Initialization(_) => "DEV009",
            CoreError::Io(_) => "DEV010",
        }
    }
}

/// Core-specific result type
pub type Result<T> = std::result::Result<T, CoreError>;
