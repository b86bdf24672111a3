//! HTTP readiness probing

use async_trait::async_trait;
use hyper::{Body, Client, Method, Request, Uri};
use std::time::Duration;
use tokio::time::timeout;
use tracing::debug;

use super::{ReadinessError, ReadinessProbe};

/// HTTP readiness probe that makes a plain GET request
///
/// Any response received counts as ready; the status code is deliberately
/// not inspected. The backend answering at all means it has bound its port
/// and is serving requests, which is the only thing the launcher needs to
/// know before proceeding.
#[derive(Debug, Clone)]
pub struct HttpProbe {
    /// URL to request
    url: String,
    /// Per-request timeout
    timeout: Duration,
}

impl HttpProbe {
    /// Create a new HTTP probe
    pub fn new(url: String, timeout: Duration) -> Self {
        Self { url, timeout }
    }

    /// Get the target URL
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl ReadinessProbe for HttpProbe {
    async fn check(&self) -> Result<(), ReadinessError> {
        debug!("Readiness probe requesting {}", self.url);

        let client = Client::new();
        let uri: Uri = self.url.parse()?;
        let req = Request::builder()
            .method(Method::GET)
            .uri(uri)
            .body(Body::empty())?;

        match timeout(self.timeout, client.request(req)).await {
            Ok(Ok(response)) => {
                debug!(
                    "Readiness probe to {} answered with status {}",
                    self.url,
                    response.status()
                );
                Ok(())
            }
            Ok(Err(hyper_error)) => {
                debug!("Readiness probe to {} failed: {}", self.url, hyper_error);
                Err(ReadinessError::Http(hyper_error))
            }
            Err(_elapsed) => {
                debug!(
                    "Readiness probe to {} timed out after {:?}",
                    self.url, self.timeout
                );
                Err(ReadinessError::Timeout(self.timeout))
            }
        }
    }
}
