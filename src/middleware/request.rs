// Outbound request description passed through the middleware pipeline

use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::Method;
use serde::Serialize;

use crate::error::{ApiError, Result};

/// A request relative to the API base URL.
///
/// Cloneable so the auth middleware can hold on to it while the first attempt
/// is in flight and replay it once with a refreshed credential.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub headers: HeaderMap,
    pub query: Vec<(String, String)>,
    pub body: Option<Bytes>,
    retried: bool,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            headers: HeaderMap::new(),
            query: Vec::new(),
            body: None,
            retried: false,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Serialize `body` as the JSON payload
    pub fn json<T: Serialize + ?Sized>(mut self, body: &T) -> Result<Self> {
        let bytes = serde_json::to_vec(body)
            .map_err(|e| ApiError::InvalidRequest(format!("Failed to serialize body: {}", e)))?;
        self.headers
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        self.body = Some(Bytes::from(bytes));
        Ok(self)
    }

    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Set `Authorization: Bearer <token>`, replacing any previous credential
    pub fn set_bearer(&mut self, token: &str) -> Result<()> {
        let mut value = HeaderValue::from_str(&format!("Bearer {}", token))
            .map_err(|_| ApiError::InvalidRequest("Access token is not a valid header value".to_string()))?;
        value.set_sensitive(true);
        self.headers.insert(AUTHORIZATION, value);
        Ok(())
    }

    /// Bearer token currently carried by the request
    pub fn bearer_token(&self) -> Option<&str> {
        self.headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
    }

    /// Whether this request has already been replayed after a refresh
    pub fn is_retried(&self) -> bool {
        self.retried
    }

    pub(crate) fn mark_retried(&mut self) {
        self.retried = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_json_body_sets_content_type() {
        let req = ApiRequest::post("/behaviors")
            .json(&json!({"name": "Read"}))
            .unwrap();
        assert_eq!(req.headers.get(CONTENT_TYPE).unwrap(), "application/json");
        assert_eq!(req.body.as_deref(), Some(br#"{"name":"Read"}"#.as_slice()));
    }

    #[test]
    fn test_bearer_roundtrip() {
        let mut req = ApiRequest::get("/stats");
        assert_eq!(req.bearer_token(), None);

        req.set_bearer("A1").unwrap();
        assert_eq!(req.bearer_token(), Some("A1"));

        req.set_bearer("A2").unwrap();
        assert_eq!(req.bearer_token(), Some("A2"));
    }

    #[test]
    fn test_invalid_token_rejected() {
        let mut req = ApiRequest::get("/stats");
        assert!(matches!(
            req.set_bearer("bad\ntoken"),
            Err(ApiError::InvalidRequest(_))
        ));
    }

    #[test]
    fn test_retried_flag_survives_clone() {
        let mut req = ApiRequest::get("/stats");
        assert!(!req.is_retried());
        req.mark_retried();
        assert!(req.clone().is_retried());
    }
}
