//! # REST API Interface Layer
//!
//! HTTP endpoints for the jersey order backend, nested under `/api`.
//! Handlers translate requests into service calls and service errors into
//! status codes; they hold no business logic.
//!
//! ## Error format
//!
//! Every failure body is `{ "success": false, "message": "..." }`. Errors
//! whose text says "not found" map to 404, everything else to the handler's
//! fallback status.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use shared::ApiMessage;

pub mod auth_apis;
pub mod backup_apis;
pub mod customer_apis;
pub mod invoice_apis;
pub mod logging_apis;
pub mod order_apis;
pub mod submission_apis;
pub mod system_apis;
pub mod validation_apis;
pub mod zoho_apis;

/// `{ success: false, message }` with the given status
pub(crate) fn failure(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(ApiMessage::failure(message))).into_response()
}

/// Map a service error, using 404 for missing records
pub(crate) fn service_failure(error: &anyhow::Error, fallback: StatusCode) -> Response {
    let message = error.to_string();
    let status = if message.contains("not found") { StatusCode::NOT_FOUND } else { fallback };
    failure(status, message)
}
