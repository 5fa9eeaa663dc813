// Token refresh logic

use reqwest::Client;
use tokio::sync::Mutex;

use super::store::TokenStore;
use super::types::{CredentialPair, RefreshRequest, RefreshResponse};
use crate::error::{ApiError, Result};

/// Refresh token exchange endpoint
pub const REFRESH_PATH: &str = "/auth/refresh-token";

/// How concurrent 401s coordinate their refresh exchanges
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RefreshPolicy {
    /// Every rejected request runs its own exchange
    #[default]
    PerRequest,
    /// One exchange at a time; waiters reuse a pair rotated while they waited
    SingleFlight,
}

impl RefreshPolicy {
    /// Parse from config, falling back to the default
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().replace('_', "-").as_str() {
            "single-flight" | "singleflight" => RefreshPolicy::SingleFlight,
            _ => RefreshPolicy::PerRequest,
        }
    }
}

/// Why a 401 could not be recovered from
#[derive(Debug)]
pub enum RecoveryError {
    /// No refresh token stored; the caller gets its original rejection back
    MissingRefreshToken,
    /// The exchange failed; the caller gets this error
    Exchange(ApiError),
}

/// Exchange a refresh token for a new credential pair
pub async fn exchange_refresh_token(
    client: &Client,
    base_url: &str,
    refresh_token: &str,
) -> Result<CredentialPair> {
    tracing::info!("Refreshing access token...");

    let url = format!("{}{}", base_url, REFRESH_PATH);
    let response = client
        .post(&url)
        .json(&RefreshRequest { refresh_token })
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        let error = ApiError::from_response(response).await;
        tracing::error!(status = status.as_u16(), error = %error, "Token refresh rejected");
        return Err(ApiError::RefreshFailed {
            status: status.as_u16(),
            message: match error {
                ApiError::Unauthorized { message } | ApiError::Api { message, .. } => message,
                other => other.to_string(),
            },
        });
    }

    let data: RefreshResponse = response
        .json()
        .await
        .map_err(|e| ApiError::InvalidResponse(format!("Failed to parse refresh response: {}", e)))?;

    if !data.success {
        return Err(ApiError::RefreshFailed {
            status: status.as_u16(),
            message: "Refresh response reported failure".to_string(),
        });
    }

    if data.access_token.is_empty() || data.refresh_token.is_empty() {
        return Err(ApiError::RefreshFailed {
            status: status.as_u16(),
            message: "Refresh response does not contain a token pair".to_string(),
        });
    }

    tracing::info!("Access token refreshed");

    Ok(CredentialPair::new(data.access_token, data.refresh_token))
}

/// Runs refresh exchanges against the stored refresh token and persists the result
pub struct Refresher {
    client: Client,
    base_url: String,
    store: TokenStore,
    policy: RefreshPolicy,
    gate: Mutex<()>,
}

impl Refresher {
    pub fn new(client: Client, base_url: String, store: TokenStore, policy: RefreshPolicy) -> Self {
        Self {
            client,
            base_url,
            store,
            policy,
            gate: Mutex::new(()),
        }
    }

    pub fn policy(&self) -> RefreshPolicy {
        self.policy
    }

    /// Obtain a new pair after the service rejected `rejected_token`.
    ///
    /// On success the new pair is already persisted.
    pub async fn recover(&self, rejected_token: Option<&str>) -> std::result::Result<CredentialPair, RecoveryError> {
        match self.policy {
            RefreshPolicy::PerRequest => self.exchange_stored().await,
            RefreshPolicy::SingleFlight => {
                let _guard = self.gate.lock().await;

                let current = self.store.pair().map_err(RecoveryError::Exchange)?;
                if let Some(pair) = current {
                    if rejected_token != Some(pair.access_token.as_str()) {
                        tracing::debug!("Credential pair already rotated, reusing it");
                        return Ok(pair);
                    }
                }

                self.exchange_stored().await
            }
        }
    }

    async fn exchange_stored(&self) -> std::result::Result<CredentialPair, RecoveryError> {
        let refresh_token = self
            .store
            .refresh_token()
            .map_err(RecoveryError::Exchange)?
            .ok_or(RecoveryError::MissingRefreshToken)?;

        let pair = exchange_refresh_token(&self.client, &self.base_url, &refresh_token)
            .await
            .map_err(RecoveryError::Exchange)?;

        self.store.save_pair(&pair).map_err(RecoveryError::Exchange)?;
        Ok(pair)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::store::MemoryStore;
    use std::sync::Arc;

    #[test]
    fn test_parse_refresh_policy() {
        assert_eq!(RefreshPolicy::parse("single-flight"), RefreshPolicy::SingleFlight);
        assert_eq!(RefreshPolicy::parse("SINGLE_FLIGHT"), RefreshPolicy::SingleFlight);
        assert_eq!(RefreshPolicy::parse("per-request"), RefreshPolicy::PerRequest);
        assert_eq!(RefreshPolicy::parse(""), RefreshPolicy::PerRequest);
    }

    #[tokio::test]
    async fn test_missing_refresh_token() {
        let store = TokenStore::new(Arc::new(MemoryStore::new()));
        // Unroutable base URL: no request may be made
        let refresher = Refresher::new(
            Client::new(),
            "http://127.0.0.1:1".to_string(),
            store,
            RefreshPolicy::PerRequest,
        );

        let result = refresher.recover(Some("A1")).await;
        assert!(matches!(result, Err(RecoveryError::MissingRefreshToken)));
    }

    #[tokio::test]
    async fn test_single_flight_reuses_rotated_pair() {
        let store = TokenStore::new(Arc::new(MemoryStore::new()));
        store.save_pair(&CredentialPair::new("A2", "R2")).unwrap();

        let refresher = Refresher::new(
            Client::new(),
            "http://127.0.0.1:1".to_string(),
            store,
            RefreshPolicy::SingleFlight,
        );

        let pair = refresher.recover(Some("A1")).await.unwrap();
        assert_eq!(pair, CredentialPair::new("A2", "R2"));
    }
}
