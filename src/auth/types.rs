// Authentication types

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Access/refresh token pair issued by the service.
/// Always stored and removed together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialPair {
    pub access_token: String,
    pub refresh_token: String,
}

impl CredentialPair {
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
        }
    }
}

/// Signed-in user profile.
///
/// The session layer passes the profile through unexamined; the accessors
/// below only exist for display and theme resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct User(pub Value);

impl User {
    pub fn name(&self) -> Option<&str> {
        self.0.get("name").and_then(Value::as_str)
    }

    pub fn email(&self) -> Option<&str> {
        self.0.get("email").and_then(Value::as_str)
    }

    /// `preferences.theme`, if the profile carries one
    pub fn theme_preference(&self) -> Option<&str> {
        self.0
            .get("preferences")
            .and_then(|p| p.get("theme"))
            .and_then(Value::as_str)
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }
}

/// POST /auth/login body
#[derive(Debug, Serialize)]
pub struct LoginRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

/// POST /auth/register body
#[derive(Debug, Serialize)]
pub struct RegisterRequest<'a> {
    pub name: &'a str,
    pub email: &'a str,
    pub password: &'a str,
}

/// Login and register response
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    #[serde(default)]
    pub success: bool,
    pub user: User,
    pub access_token: String,
    pub refresh_token: String,
}

impl AuthResponse {
    pub fn credentials(&self) -> CredentialPair {
        CredentialPair::new(self.access_token.clone(), self.refresh_token.clone())
    }
}

/// POST /auth/refresh-token body
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest<'a> {
    pub refresh_token: &'a str,
}

/// POST /auth/refresh-token response
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshResponse {
    #[serde(default)]
    pub success: bool,
    pub access_token: String,
    pub refresh_token: String,
}

/// GET /auth/me response
#[derive(Debug, Deserialize)]
pub struct ProfileResponse {
    pub data: User,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_auth_response_parsing() {
        let body = json!({
            "success": true,
            "user": {"name": "Ada", "email": "ada@example.com"},
            "accessToken": "A1",
            "refreshToken": "R1"
        });
        let parsed: AuthResponse = serde_json::from_value(body).unwrap();
        assert!(parsed.success);
        assert_eq!(parsed.user.name(), Some("Ada"));
        assert_eq!(parsed.credentials(), CredentialPair::new("A1", "R1"));
    }

    #[test]
    fn test_refresh_request_is_camel_case() {
        let body = serde_json::to_value(RefreshRequest { refresh_token: "R1" }).unwrap();
        assert_eq!(body, json!({"refreshToken": "R1"}));
    }

    #[test]
    fn test_user_theme_preference() {
        let user = User(json!({"preferences": {"theme": "dark"}}));
        assert_eq!(user.theme_preference(), Some("dark"));

        let user = User(json!({"name": "Bo"}));
        assert_eq!(user.theme_preference(), None);
        assert_eq!(user.email(), None);
    }
}
