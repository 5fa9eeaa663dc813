use anyhow::Context;
use reqwest::{Client, Response};
use std::time::Duration;

use crate::error::ApiError;
use crate::middleware::ApiRequest;

/// Terminal stage of the pipeline: turns an `ApiRequest` into a network call
pub struct HttpTransport {
    /// Shared HTTP client with connection pooling
    client: Client,

    /// API base URL without trailing slash
    base_url: String,
}

impl HttpTransport {
    /// Create a new transport
    pub fn new(
        base_url: &str,
        max_connections: usize,
        connect_timeout: u64,
        request_timeout: u64,
    ) -> Result<Self, ApiError> {
        let client = Client::builder()
            .pool_max_idle_per_host(max_connections)
            .connect_timeout(Duration::from_secs(connect_timeout))
            .timeout(Duration::from_secs(request_timeout))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self::with_client(client, base_url))
    }

    /// Wrap an existing client
    pub fn with_client(client: Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Absolute URL for a path relative to the base
    pub fn url_for(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    /// Send the request once. Any status comes back as `Ok`; only transport
    /// failures are errors.
    pub async fn execute(&self, request: ApiRequest) -> Result<Response, ApiError> {
        let url = self.url_for(&request.path);

        let mut builder = self
            .client
            .request(request.method.clone(), &url)
            .headers(request.headers);
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        builder.send().await.map_err(|e| {
            // Categorize the error for better debugging
            let error_kind = if e.is_timeout() {
                "timeout"
            } else if e.is_connect() {
                "connection_failed"
            } else if e.is_request() {
                "request_error"
            } else if e.is_body() {
                "body_error"
            } else {
                "unknown"
            };

            tracing::warn!(
                error_kind = error_kind,
                error = %e,
                url = %url,
                "HTTP request error"
            );
            ApiError::Transport(e)
        })
    }

    /// Get the underlying HTTP client
    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_for_joins_paths() {
        let transport = HttpTransport::with_client(Client::new(), "http://localhost:5000/api/");
        assert_eq!(transport.base_url(), "http://localhost:5000/api");
        assert_eq!(
            transport.url_for("/auth/me"),
            "http://localhost:5000/api/auth/me"
        );
        assert_eq!(
            transport.url_for("stats/streak"),
            "http://localhost:5000/api/stats/streak"
        );
    }

    #[tokio::test]
    async fn test_connection_failure_is_transport_error() {
        let transport = HttpTransport::new("http://127.0.0.1:1", 1, 1, 2).unwrap();
        let result = transport.execute(ApiRequest::get("/stats")).await;
        assert!(matches!(result, Err(ApiError::Transport(_))));
    }
}
