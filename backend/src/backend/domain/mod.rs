//! # Domain Module
//!
//! Business logic for the jersey order management system. Services here never
//! talk to a concrete store; they go through [`DataService`], which owns the
//! cache and whichever document store was selected at startup.
//!
//! ## Module Organization
//!
//! - **validation**: Field and record validators, password strength
//! - **security**: Password hashing, input sanitizing, login rate limiting
//! - **session**: The signed-in session record and its expiry
//! - **auth_service**: Login, registration, logout, password reset
//! - **data_service**: Cached reads and invalidating writes over the document store
//! - **order_service**, **customer_service**, **invoice_service**: Staff CRUD
//! - **submission_service**: Public portal submissions and their conversion to orders
//! - **backup_service**: Export and restore of every domain collection
//!
//! ## Business Rules
//!
//! - Records are validated before they are written; invalid input is an error,
//!   never a partial write
//! - Portal input is HTML-escaped before it is stored
//! - Every write invalidates the cached queries of its collection

pub mod auth_service;
pub mod backup_service;
pub mod customer_service;
pub mod data_service;
pub mod invoice_service;
pub mod order_service;
pub mod security;
pub mod session;
pub mod submission_service;
pub mod validation;

pub use auth_service::AuthService;
pub use backup_service::BackupService;
pub use customer_service::CustomerService;
pub use data_service::DataService;
pub use invoice_service::InvoiceService;
pub use order_service::OrderService;
pub use security::LoginRateLimiter;
pub use session::SessionManager;
pub use submission_service::SubmissionService;
