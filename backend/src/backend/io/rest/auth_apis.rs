//! # REST API for Authentication
//!
//! The auth service never fails with an `Err`; it answers with an
//! [`AuthResponse`](shared::AuthResponse) whose `success` flag picks the status.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
};
use log::info;
use shared::{AuthResponse, LoginRequest, PasswordResetRequest, RegisterRequest};

use super::failure;
use crate::backend::AppState;

fn respond(response: AuthResponse, failure_status: StatusCode) -> axum::response::Response {
    let status = if response.success { StatusCode::OK } else { failure_status };
    (status, Json(response)).into_response()
}

pub async fn login(State(state): State<AppState>, Json(request): Json<LoginRequest>) -> impl IntoResponse {
    info!("POST /api/auth/login - email: {}", request.email);
    respond(state.auth_service.login(request).await, StatusCode::UNAUTHORIZED)
}

pub async fn register(State(state): State<AppState>, Json(request): Json<RegisterRequest>) -> impl IntoResponse {
    info!("POST /api/auth/register - email: {}", request.email);
    respond(state.auth_service.register(request).await, StatusCode::BAD_REQUEST)
}

pub async fn logout(State(state): State<AppState>) -> impl IntoResponse {
    info!("POST /api/auth/logout");
    respond(state.auth_service.logout().await, StatusCode::INTERNAL_SERVER_ERROR)
}

pub async fn reset_password(
    State(state): State<AppState>,
    Json(request): Json<PasswordResetRequest>,
) -> impl IntoResponse {
    info!("POST /api/auth/reset-password - email: {}", request.email);
    respond(state.auth_service.reset_password(request).await, StatusCode::BAD_REQUEST)
}

/// Current session, or 401 when nobody is signed in
pub async fn current_session(State(state): State<AppState>) -> impl IntoResponse {
    info!("GET /api/auth/session");

    match state.auth_service.current_session() {
        Some(session) => (StatusCode::OK, Json(session)).into_response(),
        None => failure(StatusCode::UNAUTHORIZED, "Not signed in"),
    }
}
