// Shared session state: stored credentials, cached user, and the login redirect

use std::sync::Arc;

use tokio::sync::RwLock;

use super::store::TokenStore;
use super::types::{CredentialPair, User};
use crate::error::Result;
use crate::navigation::{Navigator, LOGIN_ROUTE};

/// State shared between the session manager and its middleware.
pub struct Session {
    store: TokenStore,
    navigator: Arc<dyn Navigator>,
    user: RwLock<Option<User>>,
}

impl Session {
    pub fn new(store: TokenStore, navigator: Arc<dyn Navigator>) -> Self {
        Self {
            store,
            navigator,
            user: RwLock::new(None),
        }
    }

    pub fn store(&self) -> &TokenStore {
        &self.store
    }

    /// The signed-in user, if one has been established or restored
    pub async fn user(&self) -> Option<User> {
        self.user.read().await.clone()
    }

    pub async fn set_user(&self, user: Option<User>) {
        *self.user.write().await = user;
    }

    /// Persist a freshly issued pair and remember who it belongs to
    pub async fn establish(&self, pair: &CredentialPair, user: User) -> Result<()> {
        self.store.save_pair(pair)?;
        self.set_user(Some(user)).await;
        Ok(())
    }

    /// Forget credentials and user
    pub async fn clear(&self) -> Result<()> {
        self.set_user(None).await;
        self.store.clear()
    }

    /// Terminal auth failure: clear everything and send the user to login
    pub async fn terminate(&self) {
        if let Err(e) = self.clear().await {
            tracing::error!(error = %e, "Failed to clear credentials");
        }
        self.navigator.redirect(LOGIN_ROUTE);
    }
}
