// Authentication module
// Manages the credential pair lifecycle: storage, refresh, and the session manager

pub mod manager;
pub mod refresh;
pub mod session;
pub mod store;
pub mod types;

pub use manager::SessionManager;
pub use refresh::RefreshPolicy;
pub use session::Session;
pub use store::{CredentialStore, FileStore, MemoryStore, TokenStore};
pub use types::{CredentialPair, User};
