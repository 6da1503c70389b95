//! # Outbound Clients
//!
//! HTTP clients for the hosted collaborators: the identity service, a
//! generic REST backend and Zoho Books. `local_auth` is the in-process
//! stand-in for the identity service when running on the local backend.

pub mod api_client;
pub mod firebase_auth;
pub mod local_auth;
pub mod zoho;

pub use api_client::{ApiClient, ApiError, ApiResponse, FlushReport, QueuedRequest};
pub use firebase_auth::{AuthError, AuthProvider, AuthUser, FirebaseAuthClient};
pub use local_auth::{LocalAuthProvider, UserAccount};
pub use zoho::{ZohoClient, ZohoError, ZohoTokens};
