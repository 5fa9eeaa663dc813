// Habit Tracker client - library root

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod http_client;
pub mod middleware;
pub mod navigation;
pub mod theme;

pub use api::ApiClient;
pub use auth::SessionManager;
pub use error::{ApiError, Result};
