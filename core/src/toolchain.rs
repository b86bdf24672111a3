//! Environment probing for required external toolchains
//!
//! Before any child process is spawned the launcher checks that the
//! toolchains the backend and frontend depend on are actually invocable.
//! A probe runs the toolchain's version-query command with all output
//! captured; a missing executable and a non-zero exit are treated
//! identically as "absent". Absence of any required toolchain is a hard
//! precondition failure.

use serde::Deserialize;
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

/// A single required external toolchain
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ToolchainRequirement {
    /// Human-readable name used in status lines ("Go", "Node.js")
    pub name: String,
    /// Executable invoked for the version query
    pub command: String,
    /// Arguments for the version query
    #[serde(default = "default_version_args")]
    pub args: Vec<String>,
    /// Minimum version hint shown when the toolchain is absent
    #[serde(default)]
    pub min_version: Option<String>,
}

fn default_version_args() -> Vec<String> {
    vec!["--version".to_string()]
}

impl ToolchainRequirement {
    /// The stock requirements: Go for the backend, Node.js for the frontend
    pub fn defaults() -> Vec<Self> {
        vec![
            Self {
                name: "Go".to_string(),
                command: "go".to_string(),
                args: vec!["version".to_string()],
                min_version: Some("1.21+".to_string()),
            },
            Self {
                name: "Node.js".to_string(),
                command: "node".to_string(),
                args: default_version_args(),
                min_version: Some("16+".to_string()),
            },
        ]
    }

    /// Check whether this toolchain is invocable
    ///
    /// Output is discarded, never forwarded to the user. Spawn failure and a
    /// non-zero exit status both count as absent.
    pub async fn is_present(&self) -> bool {
        let status = Command::new(&self.command)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await;

        match status {
            Ok(s) if s.success() => {
                debug!("Toolchain '{}' detected via `{}`", self.name, self.command);
                true
            }
            Ok(s) => {
                debug!(
                    "Toolchain '{}' version query exited with {}",
                    self.name, s
                );
                false
            }
            Err(e) => {
                debug!("Toolchain '{}' not invocable: {}", self.name, e);
                false
            }
        }
    }

    /// Status line shown when the toolchain is absent
    pub fn absence_hint(&self) -> String {
        match &self.min_version {
            Some(v) => format!("{} not found, please install {} {}", self.name, self.name, v),
            None => format!("{} not found", self.name),
        }
    }
}

/// Result of probing one toolchain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeReport {
    /// The requirement that was probed
    pub requirement: ToolchainRequirement,
    /// Whether the toolchain answered its version query successfully
    pub present: bool,
}

/// Probe every requirement, emitting one status line per toolchain
///
/// Returns the aggregate all-present boolean; the per-toolchain reports are
/// available through [`probe_all`] for callers that need them.
pub async fn probe_and_report(requirements: &[ToolchainRequirement]) -> bool {
    let reports = probe_all(requirements).await;
    for report in &reports {
        if report.present {
            println!("✓ {} detected", report.requirement.name);
        } else {
            println!("✗ {}", report.requirement.absence_hint());
        }
    }
    reports.iter().all(|r| r.present)
}

/// Probe every requirement without printing, returning per-toolchain reports
pub async fn probe_all(requirements: &[ToolchainRequirement]) -> Vec<ProbeReport> {
    let mut reports = Vec::with_capacity(requirements.len());
    for requirement in requirements {
        let present = requirement.is_present().await;
        reports.push(ProbeReport {
            requirement: requirement.clone(),
            present,
        });
    }
    reports
}
