// Error handling module
// Defines the error taxonomy surfaced by the session layer and API wrappers

use reqwest::{Response, StatusCode};
use thiserror::Error;

/// Maximum length for response bodies carried in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

/// Errors that can occur while talking to the remote service
#[derive(Error, Debug)]
pub enum ApiError {
    /// The service rejected the credential (HTTP 401)
    #[error("Unauthorized: {message}")]
    Unauthorized { message: String },

    /// The refresh token exchange itself was rejected
    #[error("Token refresh failed: {status} - {message}")]
    RefreshFailed { status: u16, message: String },

    /// Any other non-2xx response, passed through to the caller
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Connection, timeout or body transfer failure
    #[error("Network error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Credential store could not be read or written
    #[error("Credential store error: {0}")]
    Store(String),

    /// Request could not be built (bad header value, unserializable body)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Response body did not have the expected shape
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    /// Build an error from a non-success status and its raw body.
    ///
    /// The service reports failures as `{"error": "..."}`; that field is
    /// preferred over the raw body when present.
    pub fn from_status(status: StatusCode, body: &str) -> Self {
        let message = extract_message(status, body);
        match status {
            StatusCode::UNAUTHORIZED => ApiError::Unauthorized { message },
            _ => ApiError::Api {
                status: status.as_u16(),
                message,
            },
        }
    }

    /// Consume a response and turn it into an error
    pub async fn from_response(response: Response) -> Self {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        Self::from_status(status, &body)
    }

    /// HTTP status associated with this error, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Unauthorized { .. } => Some(401),
            ApiError::RefreshFailed { status, .. } | ApiError::Api { status, .. } => Some(*status),
            ApiError::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(401)
    }
}

/// Pull a human-readable message out of an error body
fn extract_message(status: StatusCode, body: &str) -> String {
    if let Ok(json) = serde_json::from_str::<serde_json::Value>(body) {
        for field in ["error", "message"] {
            if let Some(msg) = json.get(field).and_then(|v| v.as_str()) {
                return msg.to_string();
            }
        }
    }

    let trimmed = body.trim();
    if trimmed.is_empty() {
        return status
            .canonical_reason()
            .unwrap_or("Unknown error")
            .to_string();
    }

    truncate_body(trimmed)
}

/// Truncate a response body to avoid logging excessive data
fn truncate_body(body: &str) -> String {
    if body.len() <= MAX_ERROR_BODY_LENGTH {
        return body.to_string();
    }

    let mut end = MAX_ERROR_BODY_LENGTH;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!(
        "{}... (truncated, {} total bytes)",
        &body[..end],
        body.len()
    )
}

/// Result type alias for session and API operations
pub type Result<T> = std::result::Result<T, ApiError>;
