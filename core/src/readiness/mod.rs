//! Backend readiness gating
//!
//! After the backend is spawned the launcher must not proceed until it is
//! actually accepting requests. The [`ReadinessProbe`] trait abstracts a
//! single check; [`HttpProbe`] implements it with a plain GET. The
//! [`ReadinessGate`] wraps a probe with the settle-then-poll policy: one
//! fixed settling delay so the first attempt is not a guaranteed failure,
//! then up to `max_attempts` probes with a fixed interval between them.
//!
//! A gate configured with `max_attempts = 1` reproduces single-shot
//! behavior; either way, when the bound is exhausted the gate reports
//! not-ready exactly once and the supervisor aborts the launch.

pub mod error;
pub mod http;

pub use error::ReadinessError;
pub use http::HttpProbe;

use crate::config::ReadinessConfig;
use async_trait::async_trait;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info};

/// Trait for readiness check implementations
///
/// Returns `Ok(())` when the backend answered, or an error describing why
/// it is not ready yet. Implementations must respect their configured
/// timeout so a single check can never hang.
#[async_trait]
pub trait ReadinessProbe: Send + Sync {
    /// Execute one readiness check
    async fn check(&self) -> Result<(), ReadinessError>;
}

/// Settle-then-poll policy around a [`ReadinessProbe`]
#[derive(Debug, Clone, Copy)]
pub struct ReadinessGate {
    /// Delay before the first attempt
    settle: Duration,
    /// Delay between attempts
    poll_interval: Duration,
    /// Attempt bound
    max_attempts: u32,
}

impl ReadinessGate {
    /// Create a gate with explicit timings
    pub fn new(settle: Duration, poll_interval: Duration, max_attempts: u32) -> Self {
        Self {
            settle,
            poll_interval,
            max_attempts,
        }
    }

    /// Build a gate from the readiness section of the launch config
    pub fn from_config(config: &ReadinessConfig) -> Self {
        Self::new(
            config.settle(),
            config.poll_interval(),
            config.max_attempts,
        )
    }

    /// Wait until the probe reports ready or the attempt bound is exhausted
    pub async fn wait_ready(&self, probe: &dyn ReadinessProbe) -> Result<(), ReadinessError> {
        if !self.settle.is_zero() {
            debug!("Settling {:?} before first readiness probe", self.settle);
            sleep(self.settle).await;
        }

        for attempt in 1..=self.max_attempts {
            match probe.check().await {
                Ok(()) => {
                    info!("Backend ready after {} attempt(s)", attempt);
                    return Ok(());
                }
                Err(e) => {
                    debug!(
                        "Readiness attempt {}/{} failed: {}",
                        attempt, self.max_attempts, e
                    );
                }
            }
            if attempt < self.max_attempts {
                sleep(self.poll_interval).await;
            }
        }

        Err(ReadinessError::AttemptsExhausted {
            attempts: self.max_attempts,
        })
    }
}
