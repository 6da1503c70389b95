//! # REST API for Invoices

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use log::{error, info};
use shared::{CreateInvoiceRequest, ListQuery, UpdateInvoiceStatusRequest};

use super::{failure, service_failure};
use crate::backend::AppState;

pub async fn list_invoices(State(state): State<AppState>, Query(params): Query<ListQuery>) -> impl IntoResponse {
    info!("GET /api/invoices - query: {:?}", params);

    match state.invoice_service.list_invoices(&params).await {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(e) => {
            error!("Failed to list invoices: {:#}", e);
            service_failure(&e, StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

pub async fn create_invoice(
    State(state): State<AppState>,
    Json(request): Json<CreateInvoiceRequest>,
) -> impl IntoResponse {
    info!("POST /api/invoices - order: {}", request.order_id);

    match state.invoice_service.create_invoice(request).await {
        Ok(response) => (StatusCode::CREATED, Json(response)).into_response(),
        Err(e) => {
            error!("Failed to create invoice: {:#}", e);
            service_failure(&e, StatusCode::BAD_REQUEST)
        }
    }
}

pub async fn get_invoice(State(state): State<AppState>, Path(invoice_id): Path<String>) -> impl IntoResponse {
    info!("GET /api/invoices/{}", invoice_id);

    match state.invoice_service.get_invoice(&invoice_id).await {
        Ok(Some(invoice)) => (StatusCode::OK, Json(invoice)).into_response(),
        Ok(None) => failure(StatusCode::NOT_FOUND, format!("Invoice not found: {}", invoice_id)),
        Err(e) => {
            error!("Failed to get invoice: {:#}", e);
            service_failure(&e, StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

pub async fn update_invoice_status(
    State(state): State<AppState>,
    Path(invoice_id): Path<String>,
    Json(request): Json<UpdateInvoiceStatusRequest>,
) -> impl IntoResponse {
    info!("PUT /api/invoices/{}/status - {:?}", invoice_id, request.status);

    match state.invoice_service.update_status(&invoice_id, request.status).await {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(e) => {
            error!("Failed to update invoice status: {:#}", e);
            service_failure(&e, StatusCode::BAD_REQUEST)
        }
    }
}

pub async fn delete_invoice(State(state): State<AppState>, Path(invoice_id): Path<String>) -> impl IntoResponse {
    info!("DELETE /api/invoices/{}", invoice_id);

    match state.invoice_service.delete_invoice(&invoice_id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => {
            error!("Failed to delete invoice: {:#}", e);
            service_failure(&e, StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// Push an invoice to Zoho Books
pub async fn sync_invoice(State(state): State<AppState>, Path(invoice_id): Path<String>) -> impl IntoResponse {
    info!("POST /api/invoices/{}/sync", invoice_id);

    match state.invoice_service.sync_to_zoho(&invoice_id).await {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(e) => {
            error!("Failed to sync invoice: {:#}", e);
            let status = if e.to_string().contains("not configured") {
                StatusCode::SERVICE_UNAVAILABLE
            } else {
                StatusCode::BAD_GATEWAY
            };
            service_failure(&e, status)
        }
    }
}
