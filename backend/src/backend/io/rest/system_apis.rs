//! Health, cache maintenance and outbound queue endpoints.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
};
use log::info;
use serde::{Deserialize, Serialize};

use crate::backend::storage::cache::CacheStats;
use crate::backend::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub backend: &'static str,
    pub authenticated: bool,
    pub cache: CacheStats,
    pub outbound: OutboundStatus,
}

/// State of the outbound REST client
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutboundStatus {
    pub online: bool,
    pub queued: usize,
}

#[derive(Debug, Deserialize)]
pub struct SetOnlineRequest {
    pub online: bool,
}

fn outbound_status(state: &AppState) -> OutboundStatus {
    OutboundStatus { online: state.api_client.is_online(), queued: state.api_client.queue_len() }
}

pub async fn get_status(State(state): State<AppState>) -> impl IntoResponse {
    Json(StatusResponse {
        backend: state.data_service.backend_name(),
        authenticated: state.auth_service.current_session().is_some(),
        cache: state.data_service.cache().stats(),
        outbound: outbound_status(&state),
    })
}

/// Drop every cached query
pub async fn clear_cache(State(state): State<AppState>) -> impl IntoResponse {
    info!("POST /api/cache/clear");
    state.data_service.cache().clear();
    (StatusCode::OK, Json(shared::ApiMessage::ok("Cache cleared")))
}

/// Mark the outbound client online or offline; going online replays the queue
pub async fn set_outbound_online(
    State(state): State<AppState>,
    Json(request): Json<SetOnlineRequest>,
) -> impl IntoResponse {
    info!("PUT /api/outbound/online - online: {}", request.online);
    state.api_client.set_online(request.online);
    if request.online {
        let report = state.api_client.flush_queue().await;
        if report.sent + report.failed > 0 {
            info!("Outbound queue replayed: {} sent, {} failed", report.sent, report.failed);
        }
    }
    (StatusCode::OK, Json(outbound_status(&state)))
}

/// Replay queued outbound requests now
pub async fn flush_outbound_queue(State(state): State<AppState>) -> impl IntoResponse {
    info!("POST /api/outbound/flush");
    let report = state.api_client.flush_queue().await;
    (StatusCode::OK, Json(report))
}
