//! # Zoho Books Client
//!
//! OAuth (authorization code + refresh token) and the contact/invoice
//! endpoints the invoice service needs. Tokens are kept in the key/value
//! store under `zoho_tokens` and refreshed automatically when the access
//! token is within a minute of expiring.
//!
//! Each authorization attempt stores a one-time `state` under
//! `zoho_oauth_state`; the callback must echo it back within ten minutes.
//!
//! Zoho answers API calls with `{ "code": 0, "message": "success", ... }`;
//! any non-zero `code` is reported as [`ZohoError::Api`].

use log::{debug, info, warn};
use reqwest::{Client, Method, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;

use crate::backend::clock::SharedClock;
use crate::backend::config::ZohoConfig;
use crate::backend::storage::traits::{KeyValueStorage, StorageError};

pub const ZOHO_TOKENS_KEY: &str = "zoho_tokens";
pub const ZOHO_STATE_KEY: &str = "zoho_oauth_state";
pub const ZOHO_SCOPE: &str = "ZohoBooks.fullaccess.all";

const STATE_TTL_MILLIS: i64 = 10 * 60_000;

/// Refresh this long before the access token actually expires
const REFRESH_MARGIN_MILLIS: i64 = 60_000;

#[derive(Debug, Error)]
pub enum ZohoError {
    #[error("Zoho Books is not configured: {0}")]
    NotConfigured(&'static str),

    #[error("Zoho Books is not authorized; complete the OAuth flow first")]
    NotAuthorized,

    #[error("Zoho request failed: {0}")]
    Request(String),

    #[error("Zoho returned {status}: {body}")]
    Http { status: StatusCode, body: String },

    #[error("Zoho error {code}: {message}")]
    Api { code: i64, message: String },

    #[error("Zoho OAuth error: {0}")]
    OAuth(String),

    #[error("OAuth state rejected: {0}")]
    InvalidState(&'static str),

    #[error("unexpected Zoho response: {0}")]
    Decode(String),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Persisted OAuth tokens
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ZohoTokens {
    pub access_token: String,
    pub refresh_token: String,
    /// Epoch millis
    pub expires_at: i64,
}

/// The authorization attempt awaiting its callback
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PendingAuthorization {
    state: String,
    expires_at: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZohoContact {
    pub contact_id: String,
    pub contact_name: String,
    #[serde(default)]
    pub company_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContactPerson {
    pub first_name: String,
    pub email: String,
    pub is_primary_contact: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewContact {
    pub contact_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company_name: Option<String>,
    pub contact_persons: Vec<ContactPerson>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZohoInvoice {
    pub invoice_id: String,
    #[serde(default)]
    pub invoice_number: Option<String>,
    #[serde(default)]
    pub customer_id: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub total: Option<f64>,
    #[serde(default)]
    pub due_date: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LineItem {
    pub name: String,
    pub description: String,
    pub rate: f64,
    pub quantity: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewInvoice {
    pub customer_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,
    pub line_items: Vec<LineItem>,
}

pub struct ZohoClient {
    http: Client,
    config: ZohoConfig,
    storage: Arc<dyn KeyValueStorage>,
    clock: SharedClock,
    refresh_lock: Mutex<()>,
}

impl ZohoClient {
    pub fn new(config: ZohoConfig, storage: Arc<dyn KeyValueStorage>, clock: SharedClock) -> Self {
        Self {
            http: Client::new(),
            config,
            storage,
            clock,
            refresh_lock: Mutex::new(()),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.config.is_configured()
    }

    fn require_configured(&self) -> Result<(), ZohoError> {
        if self.config.client_id.trim().is_empty() {
            return Err(ZohoError::NotConfigured("client_id is missing"));
        }
        if self.config.client_secret.trim().is_empty() {
            return Err(ZohoError::NotConfigured("client_secret is missing"));
        }
        if self.config.organization_id.trim().is_empty() {
            return Err(ZohoError::NotConfigured("organization_id is missing"));
        }
        Ok(())
    }

    /// URL the user visits to grant access
    pub fn authorization_url(&self, state: &str) -> Result<String, ZohoError> {
        self.require_configured()?;
        let base = format!("{}/oauth/v2/auth", self.config.accounts_url.trim_end_matches('/'));
        let url = Url::parse_with_params(
            &base,
            &[
                ("scope", ZOHO_SCOPE),
                ("client_id", self.config.client_id.as_str()),
                ("response_type", "code"),
                ("redirect_uri", self.config.redirect_uri.as_str()),
                ("access_type", "offline"),
                ("prompt", "consent"),
                ("state", state),
            ],
        )
        .map_err(|_| ZohoError::NotConfigured("accounts_url is invalid"))?;
        Ok(url.to_string())
    }

    /// Start an authorization attempt; returns the consent URL and its state
    pub fn begin_authorization(&self) -> Result<(String, String), ZohoError> {
        let state = uuid::Uuid::new_v4().simple().to_string();
        let url = self.authorization_url(&state)?;

        let pending =
            PendingAuthorization { state: state.clone(), expires_at: self.clock.now_millis() + STATE_TTL_MILLIS };
        let serialized = serde_json::to_string(&pending).map_err(StorageError::from)?;
        self.storage.set_item(ZOHO_STATE_KEY, &serialized)?;
        debug!("Zoho authorization started");
        Ok((url, state))
    }

    /// Finish the attempt started by [`Self::begin_authorization`]
    ///
    /// The state is checked and consumed before the code is exchanged.
    pub async fn complete_authorization(&self, code: &str, state: Option<&str>) -> Result<ZohoTokens, ZohoError> {
        self.consume_state(state)?;
        self.exchange_code(code).await
    }

    fn consume_state(&self, state: Option<&str>) -> Result<(), ZohoError> {
        let state = state.filter(|s| !s.trim().is_empty()).ok_or(ZohoError::InvalidState("state is missing"))?;
        let pending = match self.storage.get_item(ZOHO_STATE_KEY)? {
            Some(raw) => serde_json::from_str::<PendingAuthorization>(&raw).ok(),
            None => None,
        };
        let Some(pending) = pending else {
            return Err(ZohoError::InvalidState("no authorization in progress"));
        };

        if pending.expires_at <= self.clock.now_millis() {
            self.storage.remove_item(ZOHO_STATE_KEY)?;
            return Err(ZohoError::InvalidState("authorization attempt expired"));
        }
        if pending.state != state {
            warn!("Zoho callback state does not match the pending authorization");
            return Err(ZohoError::InvalidState("state does not match"));
        }

        self.storage.remove_item(ZOHO_STATE_KEY)?;
        Ok(())
    }

    /// Stored tokens, if the OAuth flow has been completed
    pub fn stored_tokens(&self) -> Result<Option<ZohoTokens>, ZohoError> {
        let Some(raw) = self.storage.get_item(ZOHO_TOKENS_KEY)? else {
            return Ok(None);
        };
        match serde_json::from_str(&raw) {
            Ok(tokens) => Ok(Some(tokens)),
            Err(e) => {
                warn!("Stored Zoho tokens are unreadable ({}); re-authorization required", e);
                Ok(None)
            }
        }
    }

    fn store_tokens(&self, tokens: &ZohoTokens) -> Result<(), ZohoError> {
        let serialized = serde_json::to_string(tokens).map_err(StorageError::from)?;
        self.storage.set_item(ZOHO_TOKENS_KEY, &serialized)?;
        Ok(())
    }

    pub fn disconnect(&self) -> Result<(), ZohoError> {
        self.storage.remove_item(ZOHO_TOKENS_KEY)?;
        info!("Zoho Books tokens removed");
        Ok(())
    }

    /// Exchange an authorization code for tokens and store them
    pub async fn exchange_code(&self, code: &str) -> Result<ZohoTokens, ZohoError> {
        self.require_configured()?;
        let response = self
            .token_request(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("client_id", self.config.client_id.as_str()),
                ("client_secret", self.config.client_secret.as_str()),
                ("redirect_uri", self.config.redirect_uri.as_str()),
            ])
            .await?;

        let refresh_token = response
            .refresh_token
            .clone()
            .ok_or_else(|| ZohoError::OAuth("no refresh token in response".to_string()))?;
        let tokens = self.tokens_from(response, refresh_token)?;
        self.store_tokens(&tokens)?;
        info!("✅ Zoho Books authorized");
        Ok(tokens)
    }

    /// Use the refresh token to obtain a new access token
    pub async fn refresh_tokens(&self) -> Result<ZohoTokens, ZohoError> {
        self.require_configured()?;
        let current = self.stored_tokens()?.ok_or(ZohoError::NotAuthorized)?;
        let response = self
            .token_request(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", current.refresh_token.as_str()),
                ("client_id", self.config.client_id.as_str()),
                ("client_secret", self.config.client_secret.as_str()),
            ])
            .await?;

        // Zoho only sometimes rotates the refresh token
        let refresh_token = response.refresh_token.clone().unwrap_or(current.refresh_token);
        let tokens = self.tokens_from(response, refresh_token)?;
        self.store_tokens(&tokens)?;
        debug!("Zoho access token refreshed");
        Ok(tokens)
    }

    fn tokens_from(&self, response: TokenResponse, refresh_token: String) -> Result<ZohoTokens, ZohoError> {
        let access_token = response
            .access_token
            .ok_or_else(|| ZohoError::OAuth("no access token in response".to_string()))?;
        let expires_in = response.expires_in.unwrap_or(3600);
        Ok(ZohoTokens {
            access_token,
            refresh_token,
            expires_at: self.clock.now_millis() + expires_in * 1000,
        })
    }

    async fn token_request(&self, params: &[(&str, &str)]) -> Result<TokenResponse, ZohoError> {
        let url = format!("{}/oauth/v2/token", self.config.accounts_url.trim_end_matches('/'));
        let response = self
            .http
            .post(&url)
            .form(params)
            .send()
            .await
            .map_err(|e| ZohoError::Request(e.to_string()))?;

        let status = response.status();
        let text = response.text().await.map_err(|e| ZohoError::Request(e.to_string()))?;
        if !status.is_success() {
            return Err(ZohoError::Http { status, body: text });
        }

        let token: TokenResponse = serde_json::from_str(&text).map_err(|e| ZohoError::Decode(e.to_string()))?;
        if let Some(error) = token.error {
            return Err(ZohoError::OAuth(error));
        }
        Ok(token)
    }

    /// A valid access token, refreshing when it is about to expire
    pub async fn access_token(&self) -> Result<String, ZohoError> {
        let _guard = self.refresh_lock.lock().await;
        let tokens = self.stored_tokens()?.ok_or(ZohoError::NotAuthorized)?;
        if self.clock.now_millis() >= tokens.expires_at - REFRESH_MARGIN_MILLIS {
            return Ok(self.refresh_tokens().await?.access_token);
        }
        Ok(tokens.access_token)
    }

    async fn api<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
        field: &str,
    ) -> Result<T, ZohoError> {
        self.require_configured()?;
        let token = self.access_token().await?;
        let url = format!("{}/{}", self.config.api_url.trim_end_matches('/'), path.trim_start_matches('/'));

        let mut request = self
            .http
            .request(method.clone(), &url)
            .query(&[("organization_id", self.config.organization_id.as_str())])
            .header("Authorization", format!("Zoho-oauthtoken {}", token));
        if let Some(body) = body {
            request = request.json(body);
        }

        debug!("Zoho {} {}", method, path);
        let response = request.send().await.map_err(|e| ZohoError::Request(e.to_string()))?;
        let status = response.status();
        let text = response.text().await.map_err(|e| ZohoError::Request(e.to_string()))?;

        let mut envelope: Value = match serde_json::from_str(&text) {
            Ok(value) => value,
            Err(_) if !status.is_success() => return Err(ZohoError::Http { status, body: text }),
            Err(e) => return Err(ZohoError::Decode(e.to_string())),
        };

        let code = envelope.get("code").and_then(Value::as_i64).unwrap_or(0);
        if code != 0 {
            let message = envelope
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("unknown error")
                .to_string();
            return Err(ZohoError::Api { code, message });
        }
        if !status.is_success() {
            return Err(ZohoError::Http { status, body: text });
        }

        let payload = if field.is_empty() {
            Value::Null
        } else {
            envelope
                .get_mut(field)
                .map(Value::take)
                .ok_or_else(|| ZohoError::Decode(format!("missing '{}' in response", field)))?
        };
        serde_json::from_value(payload).map_err(|e| ZohoError::Decode(e.to_string()))
    }

    pub async fn list_contacts(&self) -> Result<Vec<ZohoContact>, ZohoError> {
        self.api(Method::GET, "contacts", None, "contacts").await
    }

    pub async fn get_contact(&self, contact_id: &str) -> Result<ZohoContact, ZohoError> {
        self.api(Method::GET, &format!("contacts/{}", contact_id), None, "contact")
            .await
    }

    pub async fn create_contact(&self, contact: &NewContact) -> Result<ZohoContact, ZohoError> {
        let body = serde_json::to_value(contact).map_err(|e| ZohoError::Decode(e.to_string()))?;
        let created: ZohoContact = self.api(Method::POST, "contacts", Some(&body), "contact").await?;
        info!("Created Zoho contact {} ({})", created.contact_name, created.contact_id);
        Ok(created)
    }

    pub async fn list_invoices(&self) -> Result<Vec<ZohoInvoice>, ZohoError> {
        self.api(Method::GET, "invoices", None, "invoices").await
    }

    pub async fn get_invoice(&self, invoice_id: &str) -> Result<ZohoInvoice, ZohoError> {
        self.api(Method::GET, &format!("invoices/{}", invoice_id), None, "invoice")
            .await
    }

    pub async fn create_invoice(&self, invoice: &NewInvoice) -> Result<ZohoInvoice, ZohoError> {
        let body = serde_json::to_value(invoice).map_err(|e| ZohoError::Decode(e.to_string()))?;
        let created: ZohoInvoice = self.api(Method::POST, "invoices", Some(&body), "invoice").await?;
        info!("Created Zoho invoice {}", created.invoice_id);
        Ok(created)
    }

    pub async fn delete_invoice(&self, invoice_id: &str) -> Result<(), ZohoError> {
        let _: Value = self
            .api(Method::DELETE, &format!("invoices/{}", invoice_id), None, "")
            .await?;
        Ok(())
    }

    pub async fn mark_invoice_sent(&self, invoice_id: &str) -> Result<(), ZohoError> {
        let _: Value = self
            .api(Method::POST, &format!("invoices/{}/status/sent", invoice_id), None, "")
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::clock::ManualClock;
    use crate::backend::storage::kv::MemoryStorage;

    fn config() -> ZohoConfig {
        ZohoConfig {
            client_id: "client-1".to_string(),
            client_secret: "secret".to_string(),
            organization_id: "org-9".to_string(),
            redirect_uri: "http://localhost:3000/api/zoho/callback".to_string(),
            ..ZohoConfig::default()
        }
    }

    #[test]
    fn test_authorization_url_carries_oauth_params() {
        let client = ZohoClient::new(config(), Arc::new(MemoryStorage::new()), ManualClock::new(0));
        let url = Url::parse(&client.authorization_url("xyz").unwrap()).unwrap();
        assert_eq!(url.path(), "/oauth/v2/auth");

        let params: std::collections::HashMap<_, _> = url.query_pairs().into_owned().collect();
        assert_eq!(params["client_id"], "client-1");
        assert_eq!(params["scope"], ZOHO_SCOPE);
        assert_eq!(params["access_type"], "offline");
        assert_eq!(params["state"], "xyz");
        assert_eq!(params["redirect_uri"], "http://localhost:3000/api/zoho/callback");
    }

    #[test]
    fn test_missing_credentials_fail_fast() {
        let client = ZohoClient::new(ZohoConfig::default(), Arc::new(MemoryStorage::new()), ManualClock::new(0));
        assert!(matches!(client.authorization_url("s"), Err(ZohoError::NotConfigured(_))));
    }

    #[tokio::test]
    async fn test_callback_state_must_match_the_pending_attempt() {
        let storage = Arc::new(MemoryStorage::new());
        let client = ZohoClient::new(config(), storage.clone(), ManualClock::new(0));

        assert!(matches!(
            client.complete_authorization("code", Some("anything")).await,
            Err(ZohoError::InvalidState("no authorization in progress"))
        ));

        let (url, state) = client.begin_authorization().unwrap();
        let params: std::collections::HashMap<_, _> = Url::parse(&url).unwrap().query_pairs().into_owned().collect();
        assert_eq!(params["state"], state);

        assert!(matches!(
            client.complete_authorization("code", None).await,
            Err(ZohoError::InvalidState("state is missing"))
        ));
        assert!(matches!(
            client.complete_authorization("code", Some("forged")).await,
            Err(ZohoError::InvalidState("state does not match"))
        ));

        // A rejected callback leaves the real attempt pending
        assert!(storage.get_item(ZOHO_STATE_KEY).unwrap().is_some());
        assert_eq!(client.stored_tokens().unwrap(), None);
    }

    #[tokio::test]
    async fn test_callback_state_expires() {
        let storage = Arc::new(MemoryStorage::new());
        let clock = ManualClock::new(0);
        let client = ZohoClient::new(config(), storage.clone(), clock.clone());

        let (_, state) = client.begin_authorization().unwrap();
        clock.advance(STATE_TTL_MILLIS);

        assert!(matches!(
            client.complete_authorization("code", Some(&state)).await,
            Err(ZohoError::InvalidState("authorization attempt expired"))
        ));
        assert!(storage.get_item(ZOHO_STATE_KEY).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unauthorized_without_tokens() {
        let client = ZohoClient::new(config(), Arc::new(MemoryStorage::new()), ManualClock::new(0));
        assert!(matches!(client.access_token().await, Err(ZohoError::NotAuthorized)));
    }
}
