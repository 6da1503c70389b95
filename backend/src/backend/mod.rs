//! # Backend Module
//!
//! Everything behind the jersey order REST API.
//!
//! ## Architecture
//!
//! ```text
//! IO Layer (REST handlers, outbound clients)
//!     ↓
//! Domain Layer (services, validation, auth)
//!     ↓
//! Data Service (cache + document store)
//!     ↓
//! Storage Layer (local JSON shim over key/value storage, or Firestore)
//! ```
//!
//! The document store is chosen once, at startup, from [`AppConfig::backend`].
//! Sessions, login attempts, Zoho tokens and the durable cache tier always
//! live in the local key/value store under the data directory.

pub mod clock;
pub mod config;
pub mod domain;
pub mod io;
pub mod storage;

use anyhow::{Context, Result};
use axum::{
    http::{HeaderValue, Method},
    routing::{get, post, put},
    Router,
};
use log::info;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};

use crate::backend::clock::{system_clock, SharedClock};
use crate::backend::config::{AppConfig, BackendKind};
use crate::backend::domain::{
    AuthService, BackupService, CustomerService, DataService, InvoiceService, LoginRateLimiter, OrderService,
    SessionManager, SubmissionService,
};
use crate::backend::io::clients::{ApiClient, AuthProvider, FirebaseAuthClient, LocalAuthProvider, ZohoClient};
use crate::backend::io::rest::{
    auth_apis, backup_apis, customer_apis, invoice_apis, logging_apis, order_apis, submission_apis, system_apis,
    validation_apis, zoho_apis,
};
use crate::backend::storage::{
    CacheManager, Database, DocumentStore, FileStorage, FirestoreConfig, FirestoreStore, KeyValueStorage,
    LocalDocumentStore,
};

/// Main application state that holds all services
#[derive(Clone)]
pub struct AppState {
    pub data_service: DataService,
    pub order_service: OrderService,
    pub customer_service: CustomerService,
    pub invoice_service: InvoiceService,
    pub submission_service: SubmissionService,
    pub backup_service: BackupService,
    pub auth_service: AuthService,
    pub zoho_client: Arc<ZohoClient>,
    pub api_client: Arc<ApiClient>,
}

/// Storage and identity backends the services are wired onto
pub struct BackendParts {
    pub store: Arc<dyn DocumentStore>,
    pub auth_provider: Arc<dyn AuthProvider>,
    /// Local key/value store for sessions, login attempts, tokens and the cache
    pub local: Arc<dyn KeyValueStorage>,
    pub clock: SharedClock,
    pub firestore: Option<FirestoreStore>,
}

/// Initialize the backend with all required services
pub async fn initialize_backend(config: &AppConfig) -> Result<AppState> {
    let data_dir = config.resolved_data_dir();
    info!("📁 Using data directory {}", data_dir.display());
    let local: Arc<dyn KeyValueStorage> = Arc::new(
        FileStorage::new(&data_dir).with_context(|| format!("Failed to open data directory {}", data_dir.display()))?,
    );

    let parts = match config.backend {
        BackendKind::Local => {
            info!("Setting up local document store");
            let store: Arc<dyn DocumentStore> = Arc::new(LocalDocumentStore::new(local.clone()));
            let auth_provider = Arc::new(LocalAuthProvider::new(Database::new(store.clone())));
            BackendParts { store, auth_provider, local, clock: system_clock(), firestore: None }
        }
        BackendKind::Firestore => {
            info!("Setting up Firestore document store for project {}", config.firebase.project_id);
            let mut firestore_config = FirestoreConfig::new(&config.firebase.project_id, &config.firebase.api_key);
            if let Some(url) = &config.firebase.firestore_url {
                firestore_config = firestore_config.with_base_url(url);
            }
            let firestore = FirestoreStore::new(firestore_config);
            let auth_provider = match &config.firebase.auth_url {
                Some(url) => FirebaseAuthClient::with_base_url(&config.firebase.api_key, url),
                None => FirebaseAuthClient::new(&config.firebase.api_key),
            };
            BackendParts {
                store: Arc::new(firestore.clone()),
                auth_provider: Arc::new(auth_provider),
                local,
                clock: system_clock(),
                firestore: Some(firestore),
            }
        }
    };

    Ok(build_state(config, parts))
}

/// Wire the domain services onto already-constructed backends
pub fn build_state(config: &AppConfig, parts: BackendParts) -> AppState {
    info!("Setting up domain model");
    let cache = Arc::new(CacheManager::with_capacity(
        parts.local.clone(),
        parts.clock.clone(),
        config.cache.memory_capacity,
    ));
    let data_service = DataService::new(Database::new(parts.store), cache, config.cache.ttl());

    let order_service = OrderService::new(data_service.clone());
    let customer_service = CustomerService::new(data_service.clone());
    let zoho_client = Arc::new(ZohoClient::new(config.zoho.clone(), parts.local.clone(), parts.clock.clone()));
    let invoice_service = InvoiceService::new(data_service.clone(), order_service.clone(), customer_service.clone())
        .with_zoho(zoho_client.clone());
    let submission_service = SubmissionService::new(data_service.clone(), order_service.clone());
    let backup_service = BackupService::new(data_service.clone());
    let api_client = Arc::new(ApiClient::new(&config.api));

    let limiter = LoginRateLimiter::with_limits(
        parts.local.clone(),
        parts.clock.clone(),
        config.auth.max_login_attempts,
        Duration::from_secs(config.auth.lockout_minutes * 60),
    );
    let sessions = SessionManager::new(
        parts.local,
        parts.clock,
        Duration::from_secs(config.auth.session_timeout_minutes * 60),
    );
    let mut auth_service = AuthService::new(
        parts.auth_provider,
        limiter,
        sessions,
        Duration::from_secs(config.auth.timeout_secs),
    );
    if let Some(firestore) = parts.firestore {
        auth_service = auth_service.with_firestore(firestore);
    }

    info!("Setting up application state ({} backend)", data_service.backend_name());
    AppState {
        data_service,
        order_service,
        customer_service,
        invoice_service,
        submission_service,
        backup_service,
        auth_service,
        zoho_client,
        api_client,
    }
}

/// Create the Axum router with all routes configured
pub fn create_router(app_state: AppState, allowed_origin: &str) -> Result<Router> {
    let origin = allowed_origin
        .parse::<HeaderValue>()
        .with_context(|| format!("allowed_origin is not a valid origin: '{}'", allowed_origin))?;
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers(Any);

    let api_routes = Router::new()
        .route("/orders", get(order_apis::list_orders).post(order_apis::create_order))
        .route("/orders/export.csv", get(order_apis::export_orders_csv))
        .route(
            "/orders/:id",
            get(order_apis::get_order).put(order_apis::update_order).delete(order_apis::delete_order),
        )
        .route("/orders/:id/status", put(order_apis::update_order_status))
        .route("/customers", get(customer_apis::list_customers).post(customer_apis::create_customer))
        .route("/customers/lookup", get(customer_apis::find_customer))
        .route(
            "/customers/:id",
            get(customer_apis::get_customer)
                .put(customer_apis::update_customer)
                .delete(customer_apis::delete_customer),
        )
        .route("/invoices", get(invoice_apis::list_invoices).post(invoice_apis::create_invoice))
        .route("/invoices/:id", get(invoice_apis::get_invoice).delete(invoice_apis::delete_invoice))
        .route("/invoices/:id/status", put(invoice_apis::update_invoice_status))
        .route("/invoices/:id/sync", post(invoice_apis::sync_invoice))
        .route("/submissions", get(submission_apis::list_submissions).post(submission_apis::submit_order))
        .route("/submissions/:id", get(submission_apis::get_submission))
        .route("/submissions/:id/convert", post(submission_apis::convert_submission))
        .route("/submissions/:id/reject", post(submission_apis::reject_submission))
        .route("/auth/login", post(auth_apis::login))
        .route("/auth/register", post(auth_apis::register))
        .route("/auth/logout", post(auth_apis::logout))
        .route("/auth/reset-password", post(auth_apis::reset_password))
        .route("/auth/session", get(auth_apis::current_session))
        .route("/backup/export", get(backup_apis::export_backup))
        .route("/backup/import", post(backup_apis::import_backup))
        .route("/validate/password", post(validation_apis::check_password))
        .route("/validate/field", post(validation_apis::check_field))
        .route("/zoho/status", get(zoho_apis::zoho_status))
        .route("/zoho/authorize", get(zoho_apis::zoho_authorize))
        .route("/zoho/callback", get(zoho_apis::zoho_callback))
        .route("/zoho/disconnect", post(zoho_apis::zoho_disconnect))
        .route("/logs", post(logging_apis::log_message))
        .route("/status", get(system_apis::get_status))
        .route("/cache/clear", post(system_apis::clear_cache))
        .route("/outbound/online", put(system_apis::set_outbound_online))
        .route("/outbound/flush", post(system_apis::flush_outbound_queue));

    Ok(Router::new().nest("/api", api_routes).layer(cors).with_state(app_state))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::storage::MemoryStorage;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn test_router() -> Router {
        test_router_with(AppConfig::default())
    }

    fn test_router_with(config: AppConfig) -> Router {
        let local: Arc<dyn KeyValueStorage> = Arc::new(MemoryStorage::new());
        let store: Arc<dyn DocumentStore> = Arc::new(LocalDocumentStore::new(local.clone()));
        let parts = BackendParts {
            auth_provider: Arc::new(LocalAuthProvider::new(Database::new(store.clone()))),
            store,
            local,
            clock: system_clock(),
            firestore: None,
        };
        create_router(build_state(&config, parts), &config.allowed_origin).unwrap()
    }

    async fn send(router: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let response = router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::String(String::from_utf8_lossy(&bytes).into()));
        (status, value)
    }

    fn order_body() -> Value {
        json!({
            "customerName": "Jamie Rivera",
            "email": "jamie@example.com",
            "jerseySize": "M",
            "quantity": 2,
            "unitPrice": 30.0
        })
    }

    #[tokio::test]
    async fn test_order_crud_routes() {
        let router = test_router();

        let (status, created) = send(&router, "POST", "/api/orders", Some(order_body())).await;
        assert_eq!(status, StatusCode::CREATED);
        let id = created["order"]["id"].as_str().unwrap().to_string();

        let (status, listed) = send(&router, "GET", "/api/orders?orderBy=quantity&direction=desc&limit=5", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(listed["orders"].as_array().unwrap().len(), 1);

        let (status, updated) =
            send(&router, "PUT", &format!("/api/orders/{}/status", id), Some(json!({"status": "shipped"}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["order"]["status"], "shipped");

        let (status, _) = send(&router, "DELETE", &format!("/api/orders/{}", id), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, body) = send(&router, "GET", &format!("/api/orders/{}", id), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn test_invalid_order_is_bad_request() {
        let router = test_router();
        let mut body = order_body();
        body["email"] = json!("nope");

        let (status, response) = send(&router, "POST", "/api/orders", Some(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(response["success"], false);
        assert!(response["message"].as_str().unwrap().contains("Invalid order"));
    }

    #[tokio::test]
    async fn test_csv_export_route() {
        let router = test_router();
        send(&router, "POST", "/api/orders", Some(order_body())).await;

        let request = Request::builder().uri("/api/orders/export.csv").body(Body::empty()).unwrap();
        let response = router.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["content-type"], "text/csv; charset=utf-8");
    }

    #[tokio::test]
    async fn test_auth_flow_routes() {
        let router = test_router();

        let (status, _) = send(&router, "GET", "/api/auth/session", None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let credentials = json!({"email": "coach@club.org", "password": "Password1!"});
        let (status, registered) = send(&router, "POST", "/api/auth/register", Some(credentials.clone())).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(registered["success"], true);

        let (status, _) = send(&router, "POST", "/api/auth/logout", None).await;
        assert_eq!(status, StatusCode::OK);

        let wrong = json!({"email": "coach@club.org", "password": "Password2!"});
        let (status, failed) = send(&router, "POST", "/api/auth/login", Some(wrong)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(failed["success"], false);

        let (status, session) = send(&router, "POST", "/api/auth/login", Some(credentials)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(session["session"]["username"], "coach@club.org");

        let (status, current) = send(&router, "GET", "/api/auth/session", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(current["username"], "coach@club.org");
    }

    #[tokio::test]
    async fn test_submission_to_order_routes() {
        let router = test_router();
        let submission = json!({
            "customerName": "Sam Neil",
            "email": "sam@club.org",
            "jerseySize": "L",
            "quantity": 4
        });

        let (status, created) = send(&router, "POST", "/api/submissions", Some(submission)).await;
        assert_eq!(status, StatusCode::CREATED);
        let id = created["submission"]["id"].as_str().unwrap().to_string();

        let convert = format!("/api/submissions/{}/convert", id);
        let (status, order) = send(&router, "POST", &convert, Some(json!({"unitPrice": 20.0}))).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(order["order"]["source"], "portal");

        let (status, again) = send(&router, "POST", &convert, Some(json!({"unitPrice": 20.0}))).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(again["success"], false);
    }

    #[tokio::test]
    async fn test_validation_and_logging_routes() {
        let router = test_router();

        let (status, weak) = send(&router, "POST", "/api/validate/password", Some(json!({"password": "Password1"}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(weak["isValid"], false);
        assert_eq!(weak["hasSymbol"], false);

        let field = json!({"value": "user@example.com", "fieldType": "email", "required": true});
        let (status, checked) = send(&router, "POST", "/api/validate/field", Some(field)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(checked["isValid"], true);

        let log = json!({"level": "error", "message": "Render failed", "component": "orders-table"});
        let (status, logged) = send(&router, "POST", "/api/logs", Some(log)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(logged["success"], true);
    }

    #[tokio::test]
    async fn test_zoho_routes_without_credentials() {
        let router = test_router();

        let (status, zoho) = send(&router, "GET", "/api/zoho/status", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(zoho["configured"], false);
        assert_eq!(zoho["connected"], false);

        let (status, _) = send(&router, "GET", "/api/zoho/authorize", None).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_zoho_callback_requires_the_issued_state() {
        let mut config = AppConfig::default();
        config.zoho.client_id = "client-1".to_string();
        config.zoho.client_secret = "secret".to_string();
        config.zoho.organization_id = "org-9".to_string();
        let router = test_router_with(config);

        let (status, body) = send(&router, "GET", "/api/zoho/callback?code=abc", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["message"].as_str().unwrap_or_default().contains("state"));

        let (status, authorize) = send(&router, "GET", "/api/zoho/authorize", None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(!authorize["state"].as_str().unwrap().is_empty());

        let (status, _) = send(&router, "GET", "/api/zoho/callback?code=abc&state=forged", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (_, zoho) = send(&router, "GET", "/api/zoho/status", None).await;
        assert_eq!(zoho["connected"], false);
    }

    #[tokio::test]
    async fn test_outbound_queue_routes() {
        let router = test_router();

        let (status, system) = send(&router, "GET", "/api/status", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(system["outbound"], json!({"online": true, "queued": 0}));

        let (status, outbound) = send(&router, "PUT", "/api/outbound/online", Some(json!({"online": false}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(outbound["online"], false);

        let (status, report) = send(&router, "POST", "/api/outbound/flush", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(report, json!({"sent": 0, "failed": 0}));

        let (_, system) = send(&router, "GET", "/api/status", None).await;
        assert_eq!(system["outbound"]["online"], false);
    }

    #[tokio::test]
    async fn test_backup_routes() {
        let router = test_router();
        send(&router, "POST", "/api/orders", Some(order_body())).await;

        let (status, backup) = send(&router, "GET", "/api/backup/export", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(backup["collections"]["orders"].as_array().unwrap().len(), 1);

        let (status, restored) = send(&router, "POST", "/api/backup/import", Some(backup)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(restored["restoredRecords"], 1);
    }

    #[test]
    fn test_invalid_origin_is_rejected() {
        let local: Arc<dyn KeyValueStorage> = Arc::new(MemoryStorage::new());
        let store: Arc<dyn DocumentStore> = Arc::new(LocalDocumentStore::new(local.clone()));
        let parts = BackendParts {
            auth_provider: Arc::new(LocalAuthProvider::new(Database::new(store.clone()))),
            store,
            local,
            clock: system_clock(),
            firestore: None,
        };
        let state = build_state(&AppConfig::default(), parts);
        assert!(create_router(state, "bad\norigin").is_err());
    }
}
