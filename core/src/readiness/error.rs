//! Error types for readiness probing

use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while probing backend readiness
#[derive(Error, Debug)]
pub enum ReadinessError {
    /// The probe request timed out
    #[error("timeout after {0:?}")]
    Timeout(Duration),

    /// HTTP transport failure (connection refused, reset, DNS failure)
    #[error("http transport error: {0}")]
    Http(#[from] hyper::Error),

    /// The configured probe URL is not a valid URI
    #[error("invalid probe url: {0}")]
    InvalidUri(#[from] hyper::http::uri::InvalidUri),

    /// The probe request could not be built
    #[error("request build error: {0}")]
    Request(#[from] hyper::http::Error),

    /// Every attempt within the gate's bound failed
    #[error("backend did not become ready within {attempts} attempts")]
    AttemptsExhausted {
        /// Number of attempts made
        attempts: u32,
    },
}
