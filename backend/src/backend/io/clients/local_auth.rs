//! Auth provider for the local backend: accounts are documents in the `users`
//! collection with salted SHA-256 password hashes. Error codes match the
//! hosted service so the auth service maps both the same way.

use async_trait::async_trait;
use chrono::Utc;
use log::{info, warn};
use serde::{Deserialize, Serialize};

use super::firebase_auth::{AuthError, AuthProvider, AuthUser, DEFAULT_ROLE};
use crate::backend::domain::security::{generate_salt, hash_password, verify_password};
use crate::backend::domain::validation::{validate_field, validate_password, FieldOptions, FieldType};
use crate::backend::storage::document::{Database, SetOptions};
use crate::backend::storage::traits::StorageError;

pub const USERS_COLLECTION: &str = "users";

/// Stored account; never leaves the backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserAccount {
    pub id: String,
    pub email: String,
    #[serde(default)]
    pub display_name: Option<String>,
    pub role: String,
    pub password_hash: String,
    pub salt: String,
    #[serde(default)]
    pub disabled: bool,
    pub created_at: String,
}

impl UserAccount {
    fn to_user(&self) -> AuthUser {
        AuthUser {
            uid: self.id.clone(),
            email: self.email.clone(),
            display_name: self.display_name.clone(),
            role: self.role.clone(),
            id_token: None,
        }
    }
}

fn storage_error(e: StorageError) -> AuthError {
    AuthError::new("STORAGE_ERROR", e.to_string())
}

#[derive(Clone)]
pub struct LocalAuthProvider {
    db: Database,
}

impl LocalAuthProvider {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<UserAccount>, AuthError> {
        let email = email.trim().to_lowercase();
        let accounts: Vec<UserAccount> = self
            .db
            .collection(USERS_COLLECTION)
            .get()
            .await
            .and_then(|snapshot| snapshot.data_as())
            .map_err(storage_error)?;
        Ok(accounts.into_iter().find(|a| a.email == email))
    }

    /// Enable or disable an account
    pub async fn set_disabled(&self, email: &str, disabled: bool) -> Result<(), AuthError> {
        let account = self
            .find_by_email(email)
            .await?
            .ok_or_else(|| AuthError::code("EMAIL_NOT_FOUND"))?;
        let mut patch = serde_json::Map::new();
        patch.insert("disabled".to_string(), serde_json::Value::Bool(disabled));
        self.db
            .collection(USERS_COLLECTION)
            .doc(&account.id)
            .set(patch, SetOptions::merge())
            .await
            .map_err(storage_error)
    }
}

#[async_trait]
impl AuthProvider for LocalAuthProvider {
    fn provider_name(&self) -> &'static str {
        "local"
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthUser, AuthError> {
        let account = self
            .find_by_email(email)
            .await?
            .ok_or_else(|| AuthError::code("EMAIL_NOT_FOUND"))?;

        if account.disabled {
            return Err(AuthError::code("USER_DISABLED"));
        }
        if !verify_password(password, &account.salt, &account.password_hash) {
            return Err(AuthError::code("INVALID_PASSWORD"));
        }

        Ok(account.to_user())
    }

    async fn sign_up(&self, email: &str, password: &str, display_name: Option<&str>) -> Result<AuthUser, AuthError> {
        let email_check = validate_field(email, FieldType::Email, &FieldOptions::required());
        if !email_check.is_valid {
            return Err(AuthError::code("INVALID_EMAIL"));
        }
        let strength = validate_password(password);
        if !strength.is_valid {
            return Err(AuthError::new("WEAK_PASSWORD", strength.errors.join("; ")));
        }

        let email = email_check.value.to_lowercase();
        if self.find_by_email(&email).await?.is_some() {
            return Err(AuthError::code("EMAIL_EXISTS"));
        }

        let salt = generate_salt();
        let account = UserAccount {
            id: uuid::Uuid::new_v4().to_string(),
            email,
            display_name: display_name.map(str::trim).filter(|n| !n.is_empty()).map(str::to_string),
            role: DEFAULT_ROLE.to_string(),
            password_hash: hash_password(password, &salt),
            salt,
            disabled: false,
            created_at: Utc::now().to_rfc3339(),
        };

        self.db
            .collection(USERS_COLLECTION)
            .doc(&account.id)
            .set_typed(&account, SetOptions::default())
            .await
            .map_err(storage_error)?;

        info!("Registered local account {}", account.email);
        Ok(account.to_user())
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        Ok(())
    }

    async fn send_password_reset(&self, email: &str) -> Result<(), AuthError> {
        if self.find_by_email(email).await?.is_none() {
            return Err(AuthError::code("EMAIL_NOT_FOUND"));
        }
        // No mail transport in local mode
        warn!("Password reset requested for {}; local accounts have no mail delivery", email);
        Ok(())
    }
}
