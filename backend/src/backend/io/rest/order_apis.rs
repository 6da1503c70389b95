//! # REST API for Orders
//!
//! Endpoints for creating, listing, updating and deleting jersey orders, and
//! for downloading them as CSV.

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json},
};
use log::{error, info};
use shared::{CreateOrderRequest, ListQuery, UpdateOrderRequest, UpdateOrderStatusRequest};

use super::{failure, service_failure};
use crate::backend::AppState;

/// List orders (`?orderBy=&direction=&limit=`)
pub async fn list_orders(State(state): State<AppState>, Query(params): Query<ListQuery>) -> impl IntoResponse {
    info!("GET /api/orders - query: {:?}", params);

    match state.order_service.list_orders(&params).await {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(e) => {
            error!("Failed to list orders: {:#}", e);
            service_failure(&e, StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

pub async fn create_order(
    State(state): State<AppState>,
    Json(request): Json<CreateOrderRequest>,
) -> impl IntoResponse {
    info!("POST /api/orders - customer: {}", request.customer_name);

    match state.order_service.create_order(request).await {
        Ok(response) => (StatusCode::CREATED, Json(response)).into_response(),
        Err(e) => {
            error!("Failed to create order: {:#}", e);
            service_failure(&e, StatusCode::BAD_REQUEST)
        }
    }
}

pub async fn get_order(State(state): State<AppState>, Path(order_id): Path<String>) -> impl IntoResponse {
    info!("GET /api/orders/{}", order_id);

    match state.order_service.get_order(&order_id).await {
        Ok(Some(order)) => (StatusCode::OK, Json(order)).into_response(),
        Ok(None) => failure(StatusCode::NOT_FOUND, format!("Order not found: {}", order_id)),
        Err(e) => {
            error!("Failed to get order: {:#}", e);
            service_failure(&e, StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

pub async fn update_order(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
    Json(request): Json<UpdateOrderRequest>,
) -> impl IntoResponse {
    info!("PUT /api/orders/{} - request: {:?}", order_id, request);

    match state.order_service.update_order(&order_id, request).await {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(e) => {
            error!("Failed to update order: {:#}", e);
            service_failure(&e, StatusCode::BAD_REQUEST)
        }
    }
}

pub async fn update_order_status(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
    Json(request): Json<UpdateOrderStatusRequest>,
) -> impl IntoResponse {
    info!("PUT /api/orders/{}/status - {:?}", order_id, request.status);

    match state.order_service.update_status(&order_id, request.status).await {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(e) => {
            error!("Failed to update order status: {:#}", e);
            service_failure(&e, StatusCode::BAD_REQUEST)
        }
    }
}

pub async fn delete_order(State(state): State<AppState>, Path(order_id): Path<String>) -> impl IntoResponse {
    info!("DELETE /api/orders/{}", order_id);

    match state.order_service.delete_order(&order_id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => {
            error!("Failed to delete order: {:#}", e);
            service_failure(&e, StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// Download every order as CSV
pub async fn export_orders_csv(State(state): State<AppState>) -> impl IntoResponse {
    info!("GET /api/orders/export.csv");

    match state.order_service.export_csv().await {
        Ok(csv) => (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
                (header::CONTENT_DISPOSITION, "attachment; filename=\"orders.csv\""),
            ],
            csv,
        )
            .into_response(),
        Err(e) => {
            error!("Failed to export orders: {:#}", e);
            service_failure(&e, StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}
