//! # REST API for Portal Submissions
//!
//! `POST /api/submissions` is the public entry point; the rest is for staff.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use log::{error, info};
use shared::{ConvertSubmissionRequest, ListQuery, SubmitOrderRequest};

use super::{failure, service_failure};
use crate::backend::AppState;

pub async fn submit_order(State(state): State<AppState>, Json(request): Json<SubmitOrderRequest>) -> impl IntoResponse {
    info!("POST /api/submissions - email: {}", request.email);

    match state.submission_service.submit(request).await {
        Ok(response) => (StatusCode::CREATED, Json(response)).into_response(),
        Err(e) => {
            error!("Failed to store submission: {:#}", e);
            service_failure(&e, StatusCode::BAD_REQUEST)
        }
    }
}

pub async fn list_submissions(State(state): State<AppState>, Query(params): Query<ListQuery>) -> impl IntoResponse {
    info!("GET /api/submissions - query: {:?}", params);

    match state.submission_service.list_submissions(&params).await {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(e) => {
            error!("Failed to list submissions: {:#}", e);
            service_failure(&e, StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

pub async fn get_submission(State(state): State<AppState>, Path(submission_id): Path<String>) -> impl IntoResponse {
    info!("GET /api/submissions/{}", submission_id);

    match state.submission_service.get_submission(&submission_id).await {
        Ok(Some(submission)) => (StatusCode::OK, Json(submission)).into_response(),
        Ok(None) => failure(StatusCode::NOT_FOUND, format!("Submission not found: {}", submission_id)),
        Err(e) => {
            error!("Failed to get submission: {:#}", e);
            service_failure(&e, StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

pub async fn convert_submission(
    State(state): State<AppState>,
    Path(submission_id): Path<String>,
    Json(request): Json<ConvertSubmissionRequest>,
) -> impl IntoResponse {
    info!("POST /api/submissions/{}/convert - unit price: {}", submission_id, request.unit_price);

    match state.submission_service.convert_to_order(&submission_id, request).await {
        Ok(response) => (StatusCode::CREATED, Json(response)).into_response(),
        Err(e) => {
            error!("Failed to convert submission: {:#}", e);
            service_failure(&e, StatusCode::CONFLICT)
        }
    }
}

pub async fn reject_submission(State(state): State<AppState>, Path(submission_id): Path<String>) -> impl IntoResponse {
    info!("POST /api/submissions/{}/reject", submission_id);

    match state.submission_service.reject(&submission_id).await {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(e) => {
            error!("Failed to reject submission: {:#}", e);
            service_failure(&e, StatusCode::CONFLICT)
        }
    }
}
