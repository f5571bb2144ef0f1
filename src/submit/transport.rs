//! Transport abstraction for delivering documents.

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::StatusCode;
use tracing::{debug, trace};

use crate::config::TransportConfig;
use crate::error::Result;

/// Content type of every document body.
pub const JSON_CONTENT_TYPE: &str = "application/json";

/// Opens connections to the document registration endpoint.
///
/// This trait abstracts over the real HTTP client so the submitter can be
/// exercised against in-process stubs.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Connection type handed out by this transport.
    type Connection: Connection;

    /// Open a connection for a single exchange.
    async fn connect(&self) -> Result<Self::Connection>;
}

/// A single-use connection. It is released when dropped.
#[async_trait]
pub trait Connection: Send {
    /// POST `body` and return the response status.
    async fn post(&mut self, content_type: &str, body: String) -> Result<StatusCode>;
}

/// HTTP transport backed by `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpTransport {
    /// Create a transport for the given endpoint with default settings.
    pub fn new(endpoint: impl Into<String>) -> Result<Self> {
        Self::from_config(&TransportConfig {
            endpoint: endpoint.into(),
            ..Default::default()
        })
    }

    /// Create a transport from configuration.
    pub fn from_config(config: &TransportConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .connect_timeout(config.connect_timeout())
            .build()?;

        debug!(endpoint = %config.endpoint, "HTTP transport created");

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
        })
    }

    /// Get the endpoint documents are posted to.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl Transport for HttpTransport {
    type Connection = HttpConnection;

    async fn connect(&self) -> Result<HttpConnection> {
        // reqwest pools sockets internally; a connection here is a scoped
        // handle on the shared client.
        Ok(HttpConnection {
            client: self.client.clone(),
            endpoint: self.endpoint.clone(),
        })
    }
}

/// Connection handed out by [`HttpTransport`].
#[derive(Debug)]
pub struct HttpConnection {
    client: reqwest::Client,
    endpoint: String,
}

#[async_trait]
impl Connection for HttpConnection {
    async fn post(&mut self, content_type: &str, body: String) -> Result<StatusCode> {
        trace!(endpoint = %self.endpoint, bytes = body.len(), "Posting document");

        let response = self
            .client
            .post(&self.endpoint)
            .header(CONTENT_TYPE, content_type)
            .body(body)
            .send()
            .await?;

        Ok(response.status())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_transport_creation() {
        let transport = HttpTransport::new("http://127.0.0.1:8080/create").unwrap();
        assert_eq!(transport.endpoint(), "http://127.0.0.1:8080/create");
    }

    #[tokio::test]
    async fn test_post_sends_json_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v3/lk/documents/create"))
            .and(header("content-type", "application/json"))
            .and(body_string(r#"{"doc_id":"1"}"#))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let transport =
            HttpTransport::new(format!("{}/api/v3/lk/documents/create", server.uri())).unwrap();
        let mut connection = transport.connect().await.unwrap();
        let status = connection
            .post(JSON_CONTENT_TYPE, r#"{"doc_id":"1"}"#.to_string())
            .await
            .unwrap();

        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_post_returns_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let transport = HttpTransport::new(server.uri()).unwrap();
        let mut connection = transport.connect().await.unwrap();
        let status = connection
            .post(JSON_CONTENT_TYPE, "{}".to_string())
            .await
            .unwrap();

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }
}
