use futures::future::BoxFuture;
use reqwest::Response;
use std::time::Instant;
use tracing::Instrument;

use super::{ApiRequest, Middleware, Next};
use crate::error::ApiError;

/// Logs each request with a short request id, its status and duration.
/// Headers are never logged, so credentials stay out of the logs.
#[derive(Debug, Default, Clone, Copy)]
pub struct RequestLogging;

impl Middleware for RequestLogging {
    fn handle<'a>(
        &'a self,
        request: ApiRequest,
        next: Next<'a>,
    ) -> BoxFuture<'a, Result<Response, ApiError>> {
        let request_id = uuid::Uuid::new_v4().to_string()[..8].to_string();
        let span = tracing::debug_span!(
            "request",
            id = %request_id,
            method = %request.method,
            path = %request.path,
        );

        Box::pin(
            async move {
                let started = Instant::now();
                tracing::debug!("Sending request");

                let result = next.run(request).await;
                let elapsed_ms = started.elapsed().as_millis() as u64;

                match &result {
                    Ok(response) if response.status().is_success() => {
                        tracing::debug!(status = %response.status(), elapsed_ms, "Request completed");
                    }
                    Ok(response) => {
                        tracing::warn!(status = %response.status(), elapsed_ms, "Received error response");
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, elapsed_ms, "Request failed");
                    }
                }

                result
            }
            .instrument(span),
        )
    }
}
