//! Rate-limited document submission.

use reqwest::StatusCode;
use tracing::{debug, info, instrument, warn};

use super::transport::{Connection, HttpTransport, Transport, JSON_CONTENT_TYPE};
use crate::config::CrptConfig;
use crate::document::Document;
use crate::error::{CrptError, Result};
use crate::ratelimit::RateLimiter;

/// Submits documents to the registration service through a rate limiter.
///
/// Only the admission decision is serialized between callers; the HTTP
/// exchanges of concurrent submissions run in parallel.
pub struct DocumentSubmitter<T: Transport = HttpTransport> {
    /// Admission gate shared by all callers
    limiter: RateLimiter,
    /// Transport used for every submission
    transport: T,
}

impl DocumentSubmitter<HttpTransport> {
    /// Create a submitter with an HTTP transport from configuration.
    ///
    /// Must be called within a tokio runtime.
    pub fn from_config(config: &CrptConfig) -> Result<Self> {
        let limiter = RateLimiter::from_config(&config.limiter)?;
        let transport = HttpTransport::from_config(&config.transport)?;
        Ok(Self::new(limiter, transport))
    }
}

impl<T: Transport> DocumentSubmitter<T> {
    /// Create a submitter from an existing limiter and transport.
    pub fn new(limiter: RateLimiter, transport: T) -> Self {
        Self { limiter, transport }
    }

    /// Submit one document.
    ///
    /// Waits for or is refused admission according to the limiter's
    /// policy, then posts the serialized document. Anything but `200 OK`
    /// is reported as `CrptError::RemoteRejected`.
    #[instrument(skip(self, document), fields(doc_id = %document.doc_id))]
    pub async fn submit(&self, document: &Document) -> Result<()> {
        self.limiter.acquire().await?;

        let body = document.to_json()?;

        let status = {
            let mut connection = self.transport.connect().await?;
            connection.post(JSON_CONTENT_TYPE, body).await?
        };

        if status != StatusCode::OK {
            warn!(status = %status, "Document rejected by remote service");
            return Err(CrptError::RemoteRejected { status });
        }

        debug!("Document submitted");
        Ok(())
    }

    /// Close the underlying rate limiter.
    pub async fn close(&self) {
        info!("Closing document submitter");
        self.limiter.close().await;
    }

    /// Get the rate limiter.
    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    /// Get the transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }
}
