//! # REST API for Backup and Restore

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
};
use log::{error, info};
use shared::BackupDocument;

use super::service_failure;
use crate::backend::AppState;

/// Full backup as a JSON document
pub async fn export_backup(State(state): State<AppState>) -> impl IntoResponse {
    info!("GET /api/backup/export");

    match state.backup_service.export().await {
        Ok(document) => (StatusCode::OK, Json(document)).into_response(),
        Err(e) => {
            error!("Failed to export backup: {:#}", e);
            service_failure(&e, StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// Replace collections with those in the uploaded backup
pub async fn import_backup(State(state): State<AppState>, Json(document): Json<BackupDocument>) -> impl IntoResponse {
    info!("POST /api/backup/import - {} collections", document.collections.len());

    match state.backup_service.import(document).await {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(e) => {
            error!("Failed to import backup: {:#}", e);
            service_failure(&e, StatusCode::BAD_REQUEST)
        }
    }
}
