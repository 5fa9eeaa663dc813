// Endpoint wrappers for the habit tracker service
//
// Every call goes through `SessionManager::send_json`, so it carries the
// stored credential and the 401 recovery. Entity payloads stay `serde_json::Value`.

use serde_json::{json, Value};
use std::sync::Arc;

use crate::auth::{SessionManager, User};
use crate::error::Result;
use crate::middleware::ApiRequest;

/// Typed entry points over the REST API
#[derive(Clone)]
pub struct ApiClient {
    session: Arc<SessionManager>,
}

impl ApiClient {
    pub fn new(session: Arc<SessionManager>) -> Self {
        Self { session }
    }

    pub fn session(&self) -> &Arc<SessionManager> {
        &self.session
    }

    async fn get(&self, path: String) -> Result<Value> {
        self.session.send_json(ApiRequest::get(path)).await
    }

    async fn post(&self, path: String, body: &Value) -> Result<Value> {
        self.session.send_json(ApiRequest::post(path).json(body)?).await
    }

    async fn put(&self, path: String, body: &Value) -> Result<Value> {
        self.session.send_json(ApiRequest::put(path).json(body)?).await
    }

    async fn delete(&self, path: String) -> Result<Value> {
        self.session.send_json(ApiRequest::delete(path)).await
    }

    /// Profile endpoints answer with `{data: user}`; keep the cached user in step
    async fn cache_user(&self, body: &Value) {
        if let Some(user) = body.get("data").filter(|data| data.is_object()) {
            self.session.update_user(User(user.clone())).await;
        }
    }

    // ===== Account =====

    pub async fn profile(&self) -> Result<Value> {
        self.get("/auth/me".to_string()).await
    }

    pub async fn update_details(&self, details: &Value) -> Result<Value> {
        let body = self.put("/auth/updatedetails".to_string(), details).await?;
        self.cache_user(&body).await;
        Ok(body)
    }

    pub async fn update_password(&self, current_password: &str, new_password: &str) -> Result<Value> {
        let body = json!({
            "currentPassword": current_password,
            "newPassword": new_password,
        });
        self.put("/auth/updatepassword".to_string(), &body).await
    }

    pub async fn update_preferences(&self, preferences: &Value) -> Result<Value> {
        let body = self.put("/auth/preferences".to_string(), preferences).await?;
        self.cache_user(&body).await;
        Ok(body)
    }

    pub async fn forgot_password(&self, email: &str) -> Result<Value> {
        self.post("/auth/forgotpassword".to_string(), &json!({ "email": email }))
            .await
    }

    pub async fn reset_password(&self, reset_token: &str, password: &str) -> Result<Value> {
        self.put(
            format!("/auth/resetpassword/{}", reset_token),
            &json!({ "password": password }),
        )
        .await
    }

    // ===== Behaviors =====

    pub async fn behaviors(&self) -> Result<Value> {
        self.get("/behaviors".to_string()).await
    }

    /// Behaviors ranked by the service
    pub async fn top_behaviors(&self) -> Result<Value> {
        self.get("/behaviors/top".to_string()).await
    }

    pub async fn behavior(&self, id: &str) -> Result<Value> {
        self.get(format!("/behaviors/{}", id)).await
    }

    pub async fn create_behavior(&self, behavior: &Value) -> Result<Value> {
        self.post("/behaviors".to_string(), behavior).await
    }

    pub async fn update_behavior(&self, id: &str, behavior: &Value) -> Result<Value> {
        self.put(format!("/behaviors/{}", id), behavior).await
    }

    pub async fn delete_behavior(&self, id: &str) -> Result<Value> {
        self.delete(format!("/behaviors/{}", id)).await
    }

    // ===== Todos =====

    pub async fn todos(&self, behavior_id: &str) -> Result<Value> {
        self.get(format!("/behaviors/{}/todos", behavior_id)).await
    }

    pub async fn todo(&self, id: &str) -> Result<Value> {
        self.get(format!("/todos/{}", id)).await
    }

    pub async fn create_todo(&self, behavior_id: &str, todo: &Value) -> Result<Value> {
        self.post(format!("/behaviors/{}/todos", behavior_id), todo)
            .await
    }

    pub async fn update_todo(&self, id: &str, todo: &Value) -> Result<Value> {
        self.put(format!("/todos/{}", id), todo).await
    }

    pub async fn toggle_todo(&self, id: &str) -> Result<Value> {
        self.session
            .send_json(ApiRequest::put(format!("/todos/{}/toggle", id)))
            .await
    }

    pub async fn delete_todo(&self, id: &str) -> Result<Value> {
        self.delete(format!("/todos/{}", id)).await
    }

    // ===== Statistics =====

    pub async fn stats(&self) -> Result<Value> {
        self.get("/stats".to_string()).await
    }

    pub async fn behavior_stats(&self, behavior_id: &str) -> Result<Value> {
        self.get(format!("/stats/behaviors/{}", behavior_id)).await
    }

    pub async fn streak(&self) -> Result<Value> {
        self.get("/stats/streak".to_string()).await
    }

    // ===== Achievements =====

    pub async fn achievements(&self) -> Result<Value> {
        self.get("/achievements".to_string()).await
    }

    /// Ask the service to evaluate newly earned achievements
    pub async fn check_achievements(&self) -> Result<Value> {
        self.session
            .send_json(ApiRequest::post("/achievements/check"))
            .await
    }
}
