//! # Hosted Auth Client
//!
//! [`AuthProvider`] is the seam between the auth service and whoever actually
//! checks credentials. [`FirebaseAuthClient`] talks to the Identity Toolkit
//! REST API; the local provider lives in `local_auth`.
//!
//! Provider errors carry the service's own error code (`EMAIL_NOT_FOUND`,
//! `WEAK_PASSWORD`, ...). Turning codes into user-facing text is the auth
//! service's job.

use async_trait::async_trait;
use log::{debug, info};
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;

pub const DEFAULT_IDENTITY_TOOLKIT_URL: &str = "https://identitytoolkit.googleapis.com/v1";

/// Role given to accounts that carry no explicit role
pub const DEFAULT_ROLE: &str = "staff";

/// Identity returned by a successful sign-in or sign-up
#[derive(Debug, Clone, PartialEq)]
pub struct AuthUser {
    pub uid: String,
    pub email: String,
    pub display_name: Option<String>,
    pub role: String,
    /// Bearer token for the hosted backend; `None` for local accounts
    pub id_token: Option<String>,
}

/// Failure reported by an auth provider
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{code}: {message}")]
pub struct AuthError {
    pub code: String,
    pub message: String,
}

impl AuthError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self { code: code.into(), message: message.into() }
    }

    /// Error whose message is just its code
    pub fn code(code: &str) -> Self {
        Self::new(code, code)
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new("NETWORK_ERROR", message)
    }
}

/// Credential checks delegated to an identity service
#[async_trait]
pub trait AuthProvider: Send + Sync {
    fn provider_name(&self) -> &'static str;

    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthUser, AuthError>;

    async fn sign_up(&self, email: &str, password: &str, display_name: Option<&str>) -> Result<AuthUser, AuthError>;

    async fn sign_out(&self) -> Result<(), AuthError>;

    async fn send_password_reset(&self, email: &str) -> Result<(), AuthError>;
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IdentityResponse {
    local_id: String,
    #[serde(default)]
    email: String,
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    id_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
}

/// Identity Toolkit (Firebase Auth) REST client
#[derive(Clone)]
pub struct FirebaseAuthClient {
    http: Client,
    api_key: String,
    base_url: String,
}

impl FirebaseAuthClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_base_url(api_key, DEFAULT_IDENTITY_TOOLKIT_URL)
    }

    pub fn with_base_url(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    async fn call(&self, method: &str, body: serde_json::Value) -> Result<serde_json::Value, AuthError> {
        let url = format!("{}/accounts:{}", self.base_url, method);
        debug!("POST accounts:{}", method);

        let response = self
            .http
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await
            .map_err(|e| AuthError::network(e.to_string()))?;

        let status = response.status();
        let text = response.text().await.map_err(|e| AuthError::network(e.to_string()))?;

        if !status.is_success() {
            return Err(parse_error(&text));
        }

        serde_json::from_str(&text).map_err(|e| AuthError::new("INVALID_RESPONSE", e.to_string()))
    }

    fn to_user(value: serde_json::Value) -> Result<AuthUser, AuthError> {
        let identity: IdentityResponse =
            serde_json::from_value(value).map_err(|e| AuthError::new("INVALID_RESPONSE", e.to_string()))?;
        Ok(AuthUser {
            uid: identity.local_id,
            email: identity.email,
            display_name: identity.display_name.filter(|n| !n.is_empty()),
            role: DEFAULT_ROLE.to_string(),
            id_token: identity.id_token,
        })
    }
}

/// Pull the error code out of an Identity Toolkit error body
///
/// Messages look like `"EMAIL_NOT_FOUND"` or
/// `"WEAK_PASSWORD : Password should be at least 6 characters"`.
fn parse_error(body: &str) -> AuthError {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => {
            let message = envelope.error.message;
            let code = message.split(" : ").next().unwrap_or_default().trim().to_string();
            if code.is_empty() {
                AuthError::new("UNKNOWN", message)
            } else {
                AuthError::new(code, message)
            }
        }
        Err(_) => AuthError::new("UNKNOWN", body.to_string()),
    }
}

#[async_trait]
impl AuthProvider for FirebaseAuthClient {
    fn provider_name(&self) -> &'static str {
        "firebase"
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthUser, AuthError> {
        let response = self
            .call(
                "signInWithPassword",
                json!({ "email": email, "password": password, "returnSecureToken": true }),
            )
            .await?;
        let user = Self::to_user(response)?;
        info!("Signed in {} via Firebase", user.email);
        Ok(user)
    }

    async fn sign_up(&self, email: &str, password: &str, display_name: Option<&str>) -> Result<AuthUser, AuthError> {
        let response = self
            .call("signUp", json!({ "email": email, "password": password, "returnSecureToken": true }))
            .await?;
        let mut user = Self::to_user(response)?;

        if let (Some(name), Some(token)) = (display_name, user.id_token.as_deref()) {
            self.call(
                "update",
                json!({ "idToken": token, "displayName": name, "returnSecureToken": false }),
            )
            .await?;
            user.display_name = Some(name.to_string());
        }

        info!("Registered {} via Firebase", user.email);
        Ok(user)
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        // ID tokens are stateless; dropping the local session is all there is
        Ok(())
    }

    async fn send_password_reset(&self, email: &str) -> Result<(), AuthError> {
        self.call("sendOobCode", json!({ "requestType": "PASSWORD_RESET", "email": email }))
            .await?;
        info!("Password reset email requested for {}", email);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_extracts_code() {
        let body = r#"{"error":{"code":400,"message":"WEAK_PASSWORD : Password should be at least 6 characters"}}"#;
        let error = parse_error(body);
        assert_eq!(error.code, "WEAK_PASSWORD");
        assert!(error.message.contains("at least 6"));

        let plain = parse_error(r#"{"error":{"code":400,"message":"EMAIL_NOT_FOUND"}}"#);
        assert_eq!(plain.code, "EMAIL_NOT_FOUND");

        assert_eq!(parse_error("<html>bad gateway</html>").code, "UNKNOWN");
    }
}
