// Request pipeline: bearer attachment, 401 recovery, and request logging
//
// Each middleware gets the request and a `Next` handle for the rest of the
// chain; the last stage is the HTTP transport.

pub mod auth;
pub mod logging;
mod request;

use futures::future::BoxFuture;
use reqwest::Response;
use std::sync::Arc;

use crate::error::ApiError;
use crate::http_client::HttpTransport;

pub use auth::{BearerAuth, RefreshOnUnauthorized};
pub use logging::RequestLogging;
pub use request::ApiRequest;

/// One stage of the request pipeline.
///
/// Implementations either answer the request themselves or hand it (possibly
/// modified) to `next`. `Next` is `Copy`, so a stage may call it more than once.
pub trait Middleware: Send + Sync {
    fn handle<'a>(
        &'a self,
        request: ApiRequest,
        next: Next<'a>,
    ) -> BoxFuture<'a, Result<Response, ApiError>>;
}

/// The remainder of the pipeline after the current stage
#[derive(Clone, Copy)]
pub struct Next<'a> {
    middleware: &'a [Arc<dyn Middleware>],
    transport: &'a HttpTransport,
}

impl<'a> Next<'a> {
    pub fn new(middleware: &'a [Arc<dyn Middleware>], transport: &'a HttpTransport) -> Self {
        Self {
            middleware,
            transport,
        }
    }

    /// Run the remaining stages
    pub fn run(self, request: ApiRequest) -> BoxFuture<'a, Result<Response, ApiError>> {
        match self.middleware.split_first() {
            Some((current, rest)) => current.handle(
                request,
                Next {
                    middleware: rest,
                    transport: self.transport,
                },
            ),
            None => Box::pin(self.transport.execute(request)),
        }
    }
}
