//! # Auth Service
//!
//! Front door for sign-in, registration, sign-out and password reset. The
//! actual credential check is delegated to an [`AuthProvider`]; this service
//! adds input validation, login rate limiting, a hard timeout on every
//! provider call, and maps provider error codes to messages a user can act
//! on. A successful sign-in is mirrored into the local session record.

use log::{info, warn};
use shared::{AuthResponse, LoginRequest, PasswordResetRequest, RegisterRequest, SessionInfo};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::backend::domain::security::LoginRateLimiter;
use crate::backend::domain::session::SessionManager;
use crate::backend::domain::validation::{validate_field, validate_password, FieldOptions, FieldType};
use crate::backend::io::clients::firebase_auth::{AuthError, AuthProvider, AuthUser};
use crate::backend::storage::firestore::FirestoreStore;

pub const GENERIC_AUTH_ERROR: &str = "Something went wrong. Please try again.";

/// User-facing text for a provider error code
pub fn message_for_code(code: &str) -> &'static str {
    match code {
        "EMAIL_NOT_FOUND" => "No account found with this email address.",
        "INVALID_PASSWORD" => "Incorrect password. Please try again.",
        "INVALID_LOGIN_CREDENTIALS" => "Invalid email or password.",
        "USER_DISABLED" => "This account has been disabled. Contact an administrator.",
        "EMAIL_EXISTS" => "An account with this email address already exists.",
        "WEAK_PASSWORD" => {
            "Password is too weak. Use at least 8 characters with upper and lower case letters, a digit and a symbol."
        }
        "INVALID_EMAIL" => "Please enter a valid email address.",
        "TOO_MANY_ATTEMPTS_TRY_LATER" => "Too many attempts. Please try again later.",
        "TIMEOUT" => "The request timed out. Please check your connection and try again.",
        "RATE_LIMITED" => "Too many failed sign-in attempts. Please wait before trying again.",
        _ => GENERIC_AUTH_ERROR,
    }
}

/// Codes that count against the login rate limit
fn is_credential_failure(code: &str) -> bool {
    matches!(code, "EMAIL_NOT_FOUND" | "INVALID_PASSWORD" | "INVALID_LOGIN_CREDENTIALS")
}

fn failure(message: impl Into<String>) -> AuthResponse {
    AuthResponse { success: false, message: message.into(), session: None }
}

#[derive(Clone)]
pub struct AuthService {
    provider: Arc<dyn AuthProvider>,
    limiter: LoginRateLimiter,
    sessions: SessionManager,
    timeout: Duration,
    firestore: Option<FirestoreStore>,
}

impl AuthService {
    pub fn new(
        provider: Arc<dyn AuthProvider>,
        limiter: LoginRateLimiter,
        sessions: SessionManager,
        timeout: Duration,
    ) -> Self {
        Self { provider, limiter, sessions, timeout, firestore: None }
    }

    /// Forward ID tokens to the Firestore store so its requests are authenticated
    pub fn with_firestore(mut self, store: FirestoreStore) -> Self {
        self.firestore = Some(store);
        self
    }

    pub fn current_session(&self) -> Option<SessionInfo> {
        self.sessions.current()
    }

    async fn with_timeout<T, F>(&self, call: F) -> Result<T, AuthError>
    where
        F: Future<Output = Result<T, AuthError>>,
    {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result,
            Err(_) => {
                warn!("⏱️ {} auth call timed out after {:?}", self.provider.provider_name(), self.timeout);
                Err(AuthError::code("TIMEOUT"))
            }
        }
    }

    fn check_email(email: &str) -> Result<String, AuthResponse> {
        let result = validate_field(email, FieldType::Email, &FieldOptions::required());
        if result.is_valid {
            Ok(result.value.to_lowercase())
        } else {
            Err(failure(result.errors.join(" ")))
        }
    }

    fn establish(&self, user: AuthUser, message: &str) -> AuthResponse {
        if let Some(store) = &self.firestore {
            store.set_id_token(user.id_token.clone());
        }
        match self.sessions.start(&user.email, &user.uid, &user.role) {
            Ok(session) => AuthResponse { success: true, message: message.to_string(), session: Some(session) },
            Err(e) => {
                warn!("Signed in {} but could not store the session: {}", user.email, e);
                failure(GENERIC_AUTH_ERROR)
            }
        }
    }

    pub async fn login(&self, request: LoginRequest) -> AuthResponse {
        let email = match Self::check_email(&request.email) {
            Ok(email) => email,
            Err(response) => return response,
        };
        if request.password.is_empty() {
            return failure("Password is required");
        }

        if let Some(remaining) = self.limiter.lockout_remaining(&email) {
            let minutes = remaining.as_secs().div_ceil(60).max(1);
            warn!("🔒 Rejected login for locked account {}", email);
            return failure(format!(
                "{} Try again in {} minute{}.",
                message_for_code("RATE_LIMITED"),
                minutes,
                if minutes == 1 { "" } else { "s" }
            ));
        }

        info!("🔑 Login attempt for {}", email);
        match self.with_timeout(self.provider.sign_in(&email, &request.password)).await {
            Ok(user) => {
                self.limiter.record_success(&email);
                self.establish(user, "Signed in successfully")
            }
            Err(e) => {
                warn!("Login failed for {}: {}", email, e);
                if is_credential_failure(&e.code) && self.limiter.record_failure(&email) {
                    return failure(message_for_code("RATE_LIMITED"));
                }
                failure(message_for_code(&e.code))
            }
        }
    }

    pub async fn register(&self, request: RegisterRequest) -> AuthResponse {
        let email = match Self::check_email(&request.email) {
            Ok(email) => email,
            Err(response) => return response,
        };
        let strength = validate_password(&request.password);
        if !strength.is_valid {
            return failure(strength.errors.join(". "));
        }

        info!("📝 Registering {}", email);
        let display_name = request.display_name.as_deref();
        match self
            .with_timeout(self.provider.sign_up(&email, &request.password, display_name))
            .await
        {
            Ok(user) => self.establish(user, "Account created successfully"),
            Err(e) => {
                warn!("Registration failed for {}: {}", email, e);
                failure(message_for_code(&e.code))
            }
        }
    }

    pub async fn logout(&self) -> AuthResponse {
        if let Err(e) = self.with_timeout(self.provider.sign_out()).await {
            warn!("Provider sign-out failed: {}", e);
        }
        if let Some(store) = &self.firestore {
            store.set_id_token(None);
        }
        self.sessions.clear();
        info!("👋 Signed out");
        AuthResponse { success: true, message: "Signed out".to_string(), session: None }
    }

    pub async fn reset_password(&self, request: PasswordResetRequest) -> AuthResponse {
        let email = match Self::check_email(&request.email) {
            Ok(email) => email,
            Err(response) => return response,
        };

        match self.with_timeout(self.provider.send_password_reset(&email)).await {
            Ok(()) => AuthResponse {
                success: true,
                message: "Password reset instructions have been sent".to_string(),
                session: None,
            },
            Err(e) => {
                warn!("Password reset failed for {}: {}", email, e);
                failure(message_for_code(&e.code))
            }
        }
    }
}
