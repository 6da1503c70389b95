//! # REST API for the Zoho Books connection
//!
//! Drives the OAuth authorization-code flow: hand out the consent URL,
//! accept the redirect with the code, report and drop the connection.
//! A callback whose `state` does not match the pending attempt is refused
//! with 400 before any code exchange.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use shared::ApiMessage;

use super::failure;
use crate::backend::io::clients::zoho::ZohoError;
use crate::backend::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ZohoStatusResponse {
    pub configured: bool,
    pub connected: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizeResponse {
    pub authorization_url: String,
    pub state: String,
}

#[derive(Debug, Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

fn zoho_failure(error: &ZohoError) -> axum::response::Response {
    let status = match error {
        ZohoError::NotConfigured(_) => StatusCode::SERVICE_UNAVAILABLE,
        ZohoError::NotAuthorized => StatusCode::UNAUTHORIZED,
        ZohoError::InvalidState(_) => StatusCode::BAD_REQUEST,
        ZohoError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        _ => StatusCode::BAD_GATEWAY,
    };
    failure(status, error.to_string())
}

pub async fn zoho_status(State(state): State<AppState>) -> impl IntoResponse {
    info!("GET /api/zoho/status");

    let connected = match state.zoho_client.stored_tokens() {
        Ok(tokens) => tokens.is_some(),
        Err(e) => {
            warn!("Could not read Zoho tokens: {}", e);
            false
        }
    };
    Json(ZohoStatusResponse { configured: state.zoho_client.is_configured(), connected })
}

pub async fn zoho_authorize(State(state): State<AppState>) -> impl IntoResponse {
    info!("GET /api/zoho/authorize");

    match state.zoho_client.begin_authorization() {
        Ok((url, oauth_state)) => {
            (StatusCode::OK, Json(AuthorizeResponse { authorization_url: url, state: oauth_state })).into_response()
        }
        Err(e) => {
            error!("Failed to build Zoho authorization URL: {}", e);
            zoho_failure(&e)
        }
    }
}

/// OAuth redirect target
pub async fn zoho_callback(State(state): State<AppState>, Query(params): Query<CallbackParams>) -> impl IntoResponse {
    info!("GET /api/zoho/callback");

    if let Some(error) = params.error {
        warn!("Zoho authorization was declined: {}", error);
        return failure(StatusCode::BAD_REQUEST, format!("Authorization declined: {}", error));
    }
    let Some(code) = params.code.filter(|c| !c.trim().is_empty()) else {
        return failure(StatusCode::BAD_REQUEST, "Missing authorization code");
    };

    match state.zoho_client.complete_authorization(&code, params.state.as_deref()).await {
        Ok(_) => (StatusCode::OK, Json(ApiMessage::ok("Zoho Books connected"))).into_response(),
        Err(e @ ZohoError::InvalidState(_)) => {
            warn!("Refusing Zoho callback: {}", e);
            zoho_failure(&e)
        }
        Err(e) => {
            error!("Zoho code exchange failed: {}", e);
            zoho_failure(&e)
        }
    }
}

pub async fn zoho_disconnect(State(state): State<AppState>) -> impl IntoResponse {
    info!("POST /api/zoho/disconnect");

    match state.zoho_client.disconnect() {
        Ok(()) => (StatusCode::OK, Json(ApiMessage::ok("Zoho Books disconnected"))).into_response(),
        Err(e) => {
            error!("Failed to disconnect Zoho Books: {}", e);
            zoho_failure(&e)
        }
    }
}
