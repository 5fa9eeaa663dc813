// Credential attachment and 401 recovery

use futures::future::BoxFuture;
use reqwest::{Response, StatusCode};
use std::sync::Arc;

use super::{ApiRequest, Middleware, Next};
use crate::auth::refresh::{RecoveryError, Refresher};
use crate::auth::session::Session;
use crate::auth::store::TokenStore;
use crate::error::{ApiError, Result};

/// Set the stored access token as the request's bearer credential.
///
/// A request that already carries a credential keeps it; with no stored
/// token the request goes out unauthenticated.
pub fn attach(store: &TokenStore, request: &mut ApiRequest) -> Result<()> {
    if request.bearer_token().is_some() {
        return Ok(());
    }
    if let Some(token) = store.access_token()? {
        request.set_bearer(&token)?;
    }
    Ok(())
}

/// Attaches the stored access token to every request
pub struct BearerAuth {
    store: TokenStore,
}

impl BearerAuth {
    pub fn new(store: TokenStore) -> Self {
        Self { store }
    }
}

impl Middleware for BearerAuth {
    fn handle<'a>(
        &'a self,
        mut request: ApiRequest,
        next: Next<'a>,
    ) -> BoxFuture<'a, std::result::Result<Response, ApiError>> {
        Box::pin(async move {
            attach(&self.store, &mut request)?;
            next.run(request).await
        })
    }
}

/// Recovers from an expired access token: one refresh, one replay.
///
/// Sits before `BearerAuth` in the pipeline, so the copy it keeps is the
/// request as the caller built it.
pub struct RefreshOnUnauthorized {
    session: Arc<Session>,
    refresher: Arc<Refresher>,
}

impl RefreshOnUnauthorized {
    pub fn new(session: Arc<Session>, refresher: Arc<Refresher>) -> Self {
        Self { session, refresher }
    }
}

impl Middleware for RefreshOnUnauthorized {
    fn handle<'a>(
        &'a self,
        request: ApiRequest,
        next: Next<'a>,
    ) -> BoxFuture<'a, std::result::Result<Response, ApiError>> {
        Box::pin(async move {
            let pending = request.clone();
            let sent_with = match request.bearer_token() {
                Some(token) => Some(token.to_string()),
                None => self.session.store().access_token()?,
            };

            let response = next.run(request).await?;
            if response.status() != StatusCode::UNAUTHORIZED {
                return Ok(response);
            }

            let rejection = ApiError::from_response(response).await;

            // Later stages see the replay as retried
            let mut retry = pending;
            retry.mark_retried();

            tracing::debug!(path = %retry.path, "Access token rejected, attempting refresh");
            let pair = match self.refresher.recover(sent_with.as_deref()).await {
                Ok(pair) => pair,
                Err(RecoveryError::MissingRefreshToken) => {
                    tracing::warn!("No refresh token available");
                    self.session.terminate().await;
                    return Err(rejection);
                }
                Err(RecoveryError::Exchange(e)) => {
                    tracing::error!(error = %e, "Token refresh failed");
                    self.session.terminate().await;
                    return Err(e);
                }
            };

            retry.set_bearer(&pair.access_token)?;
            // Second rejection is final for this request only
            let response = next.run(retry).await?;
            if response.status() == StatusCode::UNAUTHORIZED {
                tracing::warn!("Rejected again after refresh, giving up");
                return Err(ApiError::from_response(response).await);
            }

            Ok(response)
        })
    }
}
