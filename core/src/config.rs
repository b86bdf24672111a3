//! Configuration loading and validation for the launcher
//!
//! This module parses an optional TOML configuration into a [`LaunchConfig`],
//! applies defaults matching the stock backend/frontend project layout, and
//! performs strict validation with field-path error messages. With no config
//! file at all the launcher runs against `backend/` and `frontend/` in the
//! current directory.

use crate::toolchain::ToolchainRequirement;
use crate::{CoreError, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// A command line to run: executable plus arguments
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CommandLine {
    /// Executable name (must be in PATH or an absolute path)
    pub command: String,
    /// Arguments passed to the executable
    #[serde(default)]
    pub args: Vec<String>,
}

impl CommandLine {
    /// Construct from an executable and its arguments
    pub fn new(command: impl Into<String>, args: &[&str]) -> Self {
        Self {
            command: command.into(),
            args: args.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Render as a single display string for log and error messages
    pub fn display(&self) -> String {
        if self.args.is_empty() {
            self.command.clone()
        } else {
            format!("{} {}", self.command, self.args.join(" "))
        }
    }
}

/// Backend service settings
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct BackendConfig {
    /// Project root the backend commands run in
    pub root: PathBuf,
    /// Command that starts the backend server
    pub run: CommandLine,
    /// Blocking dependency-resolution step run before the server starts
    pub prepare: Option<CommandLine>,
    /// Health endpoint polled by the readiness gate
    pub health_url: String,
    /// Base URL printed once the environment is up
    pub api_url: String,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("backend"),
            run: CommandLine::new("go", &["run", "cmd/server/main.go"]),
            prepare: Some(CommandLine::new("go", &["mod", "tidy"])),
            health_url: "http://localhost:8080/api/v1/pets".to_string(),
            api_url: "http://localhost:8080".to_string(),
        }
    }
}

/// Frontend dev-server settings
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct FrontendConfig {
    /// Project root; the frontend is launched only if this directory exists
    pub root: PathBuf,
    /// Command that starts the dev server
    pub run: CommandLine,
    /// Blocking install step run when the dependency marker is absent
    pub install: CommandLine,
    /// Directory (relative to `root`) whose presence means deps are installed
    pub dependency_marker: PathBuf,
    /// URL printed once the environment is up
    pub serve_url: String,
}

impl Default for FrontendConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("frontend"),
            run: CommandLine::new("npm", &["start"]),
            install: CommandLine::new("npm", &["install"]),
            dependency_marker: PathBuf::from("node_modules"),
            serve_url: "http://localhost:3000".to_string(),
        }
    }
}

/// Readiness gate settings
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct ReadinessConfig {
    /// Delay before the first probe, giving the backend time to bind its port
    pub settle_secs: u64,
    /// Delay between probe attempts
    pub poll_interval_secs: u64,
    /// Number of probe attempts before the gate reports not-ready
    pub max_attempts: u32,
    /// Per-request timeout for a single probe
    pub timeout_secs: u64,
}

impl Default for ReadinessConfig {
    fn default() -> Self {
        Self {
            settle_secs: 3,
            poll_interval_secs: 1,
            max_attempts: 10,
            timeout_secs: 5,
        }
    }
}

impl ReadinessConfig {
    /// Settle delay as a [`Duration`]
    pub fn settle(&self) -> Duration {
        Duration::from_secs(self.settle_secs)
    }

    /// Poll interval as a [`Duration`]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    /// Per-request timeout as a [`Duration`]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Top-level launcher configuration
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct LaunchConfig {
    /// Backend service settings
    pub backend: BackendConfig,
    /// Frontend dev-server settings
    pub frontend: FrontendConfig,
    /// Readiness gate settings
    pub readiness: ReadinessConfig,
    /// External toolchains that must be present before anything is spawned
    pub toolchains: Vec<ToolchainRequirement>,
}

impl Default for LaunchConfig {
    fn default() -> Self {
        Self {
            backend: BackendConfig::default(),
            frontend: FrontendConfig::default(),
            readiness: ReadinessConfig::default(),
            toolchains: ToolchainRequirement::defaults(),
        }
    }
}

impl LaunchConfig {
    /// Validate the configuration and return `Result<()>` with field-path errors
    pub fn validate(&self) -> Result<()> {
        if self.backend.run.command.trim().is_empty() {
            return Err(CoreError::Validation(
                "backend.run.command: cannot be empty".to_string(),
            ));
        }
        if let Some(prepare) = &self.backend.prepare {
            if prepare.command.trim().is_empty() {
                return Err(CoreError::Validation(
                    "backend.prepare.command: cannot be empty".to_string(),
                ));
            }
        }
        if self.backend.health_url.trim().is_empty() {
            return Err(CoreError::Validation(
                "backend.healthUrl: cannot be empty".to_string(),
            ));
        }

        if self.frontend.run.command.trim().is_empty() {
            return Err(CoreError::Validation(
                "frontend.run.command: cannot be empty".to_string(),
            ));
        }
        if self.frontend.install.command.trim().is_empty() {
            return Err(CoreError::Validation(
                "frontend.install.command: cannot be empty".to_string(),
            ));
        }
        if self.frontend.dependency_marker.as_os_str().is_empty() {
            return Err(CoreError::Validation(
                "frontend.dependencyMarker: cannot be empty".to_string(),
            ));
        }

        if self.readiness.max_attempts == 0 {
            return Err(CoreError::Validation(
                "readiness.maxAttempts: must be > 0".to_string(),
            ));
        }
        if self.readiness.timeout_secs == 0 {
            return Err(CoreError::Validation(
                "readiness.timeoutSecs: must be > 0".to_string(),
            ));
        }

        for (i, tc) in self.toolchains.iter().enumerate() {
            if tc.name.trim().is_empty() {
                return Err(CoreError::Validation(format!(
                    "toolchains[{}].name: cannot be empty",
                    i
                )));
            }
            if tc.command.trim().is_empty() {
                return Err(CoreError::Validation(format!(
                    "toolchains[{}].command: cannot be empty",
                    i
                )));
            }
        }

        Ok(())
    }
}

/// Load launcher config from a TOML file path
pub fn load_config_from_toml_path(path: impl AsRef<Path>) -> Result<LaunchConfig> {
    let data = fs::read_to_string(&path).map_err(|e| {
        CoreError::Configuration(format!("Failed to read config {:?}: {}", path.as_ref(), e))
    })?;
    load_config_from_toml_str(&data)
}

/// Load launcher config from a TOML string
pub fn load_config_from_toml_str(input: &str) -> Result<LaunchConfig> {
    let cfg: LaunchConfig = toml::from_str(input)
        .map_err(|e| CoreError::Configuration(format!("TOML parse error: {}", e)))?;
    cfg.validate()?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_stock_layout() {
        let cfg = LaunchConfig::default();
        assert_eq!(cfg.backend.root, PathBuf::from("backend"));
        assert_eq!(cfg.backend.run.command, "go");
        assert_eq!(cfg.backend.health_url, "http://localhost:8080/api/v1/pets");
        assert_eq!(cfg.frontend.root, PathBuf::from("frontend"));
        assert_eq!(cfg.frontend.dependency_marker, PathBuf::from("node_modules"));
        assert_eq!(cfg.readiness.settle_secs, 3);
        assert_eq!(cfg.toolchains.len(), 2);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn empty_input_yields_defaults() {
        let cfg = load_config_from_toml_str("").expect("empty config should parse");
        assert_eq!(cfg, LaunchConfig::default());
    }

    #[test]
    fn parses_partial_overrides() {
        let input = r#"
        [backend]
        root = "server"
        healthUrl = "http://127.0.0.1:9000/healthz"

        [backend.run]
        command = "cargo"
        args = ["run"]

        [readiness]
        maxAttempts = 1
        settleSecs = 0
        "#;
        let cfg = load_config_from_toml_str(input).expect("should parse");
        assert_eq!(cfg.backend.root, PathBuf::from("server"));
        assert_eq!(cfg.backend.run.command, "cargo");
        assert_eq!(cfg.backend.health_url, "http://127.0.0.1:9000/healthz");
        assert_eq!(cfg.readiness.max_attempts, 1);
        assert_eq!(cfg.readiness.settle_secs, 0);
        // Untouched sections keep their defaults
        assert_eq!(cfg.frontend, FrontendConfig::default());
    }

    #[test]
    fn errors_on_empty_backend_command() {
        let input = r#"
        [backend.run]
        command = ""
        "#;
        let err = load_config_from_toml_str(input).unwrap_err();
        assert!(format!("{}", err).contains("backend.run.command"));
    }

    #[test]
    fn errors_on_zero_attempts() {
        let input = r#"
        [readiness]
        maxAttempts = 0
        "#;
        let err = load_config_from_toml_str(input).unwrap_err();
        assert!(format!("{}", err).contains("readiness.maxAttempts"));
    }

    #[test]
    fn errors_on_unnamed_toolchain() {
        let input = r#"
        [[toolchains]]
        name = ""
        command = "go"
        "#;
        let err = load_config_from_toml_str(input).unwrap_err();
        assert!(format!("{}", err).contains("toolchains[0].name"));
    }

    #[test]
    fn errors_on_bad_toml() {
        let err = load_config_from_toml_str("backend = 5").unwrap_err();
        assert!(format!("{}", err).contains("TOML parse error"));
    }
}
