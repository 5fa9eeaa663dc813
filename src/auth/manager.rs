use reqwest::Response;
use serde::de::DeserializeOwned;
use std::sync::Arc;

use super::refresh::{RecoveryError, RefreshPolicy, Refresher};
use super::session::Session;
use super::store::{FileStore, TokenStore};
use super::types::{AuthResponse, CredentialPair, LoginRequest, ProfileResponse, RegisterRequest, User};
use crate::config::Config;
use crate::error::{ApiError, Result};
use crate::http_client::HttpTransport;
use crate::middleware::{self, ApiRequest, BearerAuth, Middleware, Next, RefreshOnUnauthorized, RequestLogging};
use crate::navigation::Navigator;

const LOGIN_PATH: &str = "/auth/login";
const REGISTER_PATH: &str = "/auth/register";
const PROFILE_PATH: &str = "/auth/me";
const LOGOUT_PATH: &str = "/auth/logout";

/// Session manager
/// Owns the credential pair and the authenticated request channel.
///
/// Construct once at startup and share it behind an `Arc`; every component
/// that talks to the service goes through `dispatch`.
pub struct SessionManager {
    /// Terminal HTTP stage
    transport: HttpTransport,

    /// Middleware in execution order
    pipeline: Vec<Arc<dyn Middleware>>,

    /// Stored credentials, cached user, login redirect
    session: Arc<Session>,

    /// Refresh exchange runner
    refresher: Arc<Refresher>,
}

impl SessionManager {
    /// Create a session manager with the standard pipeline:
    /// logging, 401 recovery, bearer attachment
    pub fn new(
        transport: HttpTransport,
        store: TokenStore,
        navigator: Arc<dyn Navigator>,
        policy: RefreshPolicy,
    ) -> Self {
        let session = Arc::new(Session::new(store.clone(), navigator));
        let refresher = Arc::new(Refresher::new(
            transport.client().clone(),
            transport.base_url().to_string(),
            store.clone(),
            policy,
        ));

        let pipeline: Vec<Arc<dyn Middleware>> = vec![
            Arc::new(RequestLogging),
            Arc::new(RefreshOnUnauthorized::new(session.clone(), refresher.clone())),
            Arc::new(BearerAuth::new(store)),
        ];

        Self {
            transport,
            pipeline,
            session,
            refresher,
        }
    }

    /// Build from configuration with a file-backed credential store
    pub fn from_config(config: &Config, navigator: Arc<dyn Navigator>) -> Result<Self> {
        config.validate()?;
        let transport = HttpTransport::new(
            &config.api_url,
            config.http_max_connections,
            config.http_connect_timeout,
            config.http_request_timeout,
        )?;
        let store = TokenStore::new(Arc::new(FileStore::new(&config.token_store_path)))
            .with_lifetimes(config.access_token_ttl(), config.refresh_token_ttl());

        tracing::debug!(
            store = %config.token_store_path.display(),
            policy = ?config.refresh_policy,
            "Session manager configured"
        );
        Ok(Self::new(transport, store, navigator, config.refresh_policy))
    }

    /// Append a middleware; it runs after the credential has been attached
    pub fn with_middleware(mut self, middleware: Arc<dyn Middleware>) -> Self {
        self.pipeline.push(middleware);
        self
    }

    pub fn store(&self) -> &TokenStore {
        self.session.store()
    }

    pub fn refresh_policy(&self) -> RefreshPolicy {
        self.refresher.policy()
    }

    /// Authenticated iff an access token is stored
    pub fn is_authenticated(&self) -> bool {
        self.session.store().is_authenticated()
    }

    /// The signed-in user, if known
    pub async fn current_user(&self) -> Option<User> {
        self.session.user().await
    }

    /// Replace the cached user after the profile changed on the service
    pub async fn update_user(&self, user: User) {
        self.session.set_user(Some(user)).await;
    }

    /// Set the stored access token as the request's bearer credential
    pub fn attach(&self, request: &mut ApiRequest) -> Result<()> {
        middleware::auth::attach(self.session.store(), request)
    }

    /// Send a request through the pipeline.
    ///
    /// Non-401 responses come back unchanged whatever their status; a 401 is
    /// recovered from once or surfaced as an error.
    pub async fn dispatch(&self, request: ApiRequest) -> Result<Response> {
        Next::new(&self.pipeline, &self.transport).run(request).await
    }

    /// Dispatch and decode a successful JSON body; non-2xx becomes an error
    pub async fn send_json<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<T> {
        let path = request.path.clone();
        let response = self.dispatch(request).await?;
        decode(response, &path).await
    }

    /// Exchange email and password for a credential pair
    pub async fn login(&self, email: &str, password: &str) -> Result<User> {
        let request = ApiRequest::post(LOGIN_PATH).json(&LoginRequest { email, password })?;
        self.authenticate(request).await
    }

    /// Create an account and sign in with it
    pub async fn register(&self, name: &str, email: &str, password: &str) -> Result<User> {
        let request = ApiRequest::post(REGISTER_PATH).json(&RegisterRequest {
            name,
            email,
            password,
        })?;
        self.authenticate(request).await
    }

    /// Login and register share one contract. They bypass the pipeline: there
    /// is no credential to attach yet, and a rejection here is a bad password,
    /// not an expired session.
    async fn authenticate(&self, request: ApiRequest) -> Result<User> {
        let path = request.path.clone();
        tracing::info!(path = %path, "Authenticating");

        let response = self.transport.execute(request).await?;
        let auth: AuthResponse = decode(response, &path).await?;

        if !auth.success {
            return Err(ApiError::InvalidResponse(format!(
                "{} response reported failure",
                path
            )));
        }

        let pair = auth.credentials();
        self.session.establish(&pair, auth.user.clone()).await?;

        tracing::info!(
            user = auth.user.email().unwrap_or("unknown"),
            "Authentication successful"
        );
        Ok(auth.user)
    }

    /// Exchange the stored refresh token now instead of waiting for a 401.
    ///
    /// A failure here ends the session exactly as a failed recovery does.
    pub async fn refresh(&self) -> Result<CredentialPair> {
        let current = self.session.store().access_token()?;
        match self.refresher.recover(current.as_deref()).await {
            Ok(pair) => Ok(pair),
            Err(RecoveryError::MissingRefreshToken) => {
                self.session.terminate().await;
                Err(ApiError::Unauthorized {
                    message: "No refresh token available".to_string(),
                })
            }
            Err(RecoveryError::Exchange(e)) => {
                self.session.terminate().await;
                Err(e)
            }
        }
    }

    /// Notify the service (best effort), then clear local credentials
    pub async fn logout(&self) -> Result<()> {
        match self.dispatch(ApiRequest::get(LOGOUT_PATH)).await {
            Ok(response) if response.status().is_success() => {
                tracing::debug!("Logout acknowledged by service");
            }
            Ok(response) => {
                tracing::warn!(status = %response.status(), "Logout notification rejected");
            }
            Err(e) => {
                tracing::warn!(error = %e, "Logout notification failed");
            }
        }

        self.session.clear().await?;
        tracing::info!("Logged out");
        Ok(())
    }

    /// Restore the signed-in user at startup.
    ///
    /// Without a stored access token this makes no network call. Any failure,
    /// including an unrecoverable 401, resolves to `None`.
    pub async fn restore_session(&self) -> Option<User> {
        if !self.is_authenticated() {
            tracing::debug!("No stored session");
            return None;
        }

        match self
            .send_json::<ProfileResponse>(ApiRequest::get(PROFILE_PATH))
            .await
        {
            Ok(profile) => {
                self.session.set_user(Some(profile.data.clone())).await;
                tracing::info!(
                    user = profile.data.email().unwrap_or("unknown"),
                    "Session restored"
                );
                Some(profile.data)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to restore session");
                self.session.set_user(None).await;
                None
            }
        }
    }
}

/// Decode a JSON body, turning non-2xx statuses into errors
async fn decode<T: DeserializeOwned>(response: Response, path: &str) -> Result<T> {
    if !response.status().is_success() {
        return Err(ApiError::from_response(response).await);
    }

    response
        .json()
        .await
        .map_err(|e| ApiError::InvalidResponse(format!("Failed to parse response from {}: {}", path, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::store::MemoryStore;
    use crate::navigation::{RecordingNavigator, LOGIN_ROUTE};

    fn offline_manager_with(navigator: Arc<RecordingNavigator>) -> SessionManager {
        // Port 1 is never listening; tests below must not reach the network
        let transport = HttpTransport::with_client(reqwest::Client::new(), "http://127.0.0.1:1");
        SessionManager::new(
            transport,
            TokenStore::new(Arc::new(MemoryStore::new())),
            navigator,
            RefreshPolicy::PerRequest,
        )
    }

    fn offline_manager() -> SessionManager {
        offline_manager_with(Arc::new(RecordingNavigator::new()))
    }

    #[tokio::test]
    async fn test_restore_without_token_is_none() {
        let manager = offline_manager();
        assert!(manager.restore_session().await.is_none());
        assert!(manager.current_user().await.is_none());
    }

    #[tokio::test]
    async fn test_logout_clears_even_when_unreachable() {
        let manager = offline_manager();
        manager
            .store()
            .save_pair(&CredentialPair::new("A1", "R1"))
            .unwrap();

        manager.logout().await.unwrap();
        assert!(!manager.is_authenticated());
        assert_eq!(manager.store().refresh_token().unwrap(), None);
    }

    #[tokio::test]
    async fn test_refresh_without_refresh_token_ends_session() {
        let nav = Arc::new(RecordingNavigator::new());
        let manager = offline_manager_with(nav.clone());

        let err = manager.refresh().await.unwrap_err();
        assert!(err.is_unauthorized());
        assert_eq!(nav.last_target().as_deref(), Some(LOGIN_ROUTE));
    }

    #[tokio::test]
    async fn test_refresh_that_cannot_connect_ends_session() {
        let nav = Arc::new(RecordingNavigator::new());
        let manager = offline_manager_with(nav.clone());
        manager
            .store()
            .save_pair(&CredentialPair::new("A1", "R1"))
            .unwrap();

        let err = manager.refresh().await.unwrap_err();
        assert!(matches!(err, ApiError::Transport(_)));
        assert_eq!(manager.store().pair().unwrap(), None);
        assert_eq!(nav.redirect_count(), 1);
    }

    #[tokio::test]
    async fn test_update_user_replaces_cached_user() {
        let manager = offline_manager();
        manager.update_user(User(serde_json::json!({"name": "Grace"}))).await;
        assert_eq!(manager.current_user().await.unwrap().name(), Some("Grace"));
    }

    #[test]
    fn test_attach_uses_stored_token() {
        let manager = offline_manager();
        manager
            .store()
            .save_pair(&CredentialPair::new("A1", "R1"))
            .unwrap();

        let mut req = ApiRequest::get("/stats");
        manager.attach(&mut req).unwrap();
        assert_eq!(req.bearer_token(), Some("A1"));
    }
}
