//! # REST API for Customers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use log::{error, info};
use serde::Deserialize;
use shared::{CreateCustomerRequest, ListQuery, UpdateCustomerRequest};

use super::{failure, service_failure};
use crate::backend::AppState;

#[derive(Debug, Deserialize)]
pub struct EmailLookup {
    pub email: String,
}

pub async fn list_customers(State(state): State<AppState>, Query(params): Query<ListQuery>) -> impl IntoResponse {
    info!("GET /api/customers - query: {:?}", params);

    match state.customer_service.list_customers(&params).await {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(e) => {
            error!("Failed to list customers: {:#}", e);
            service_failure(&e, StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

pub async fn create_customer(
    State(state): State<AppState>,
    Json(request): Json<CreateCustomerRequest>,
) -> impl IntoResponse {
    info!("POST /api/customers - name: {}", request.name);

    match state.customer_service.create_customer(request).await {
        Ok(response) => (StatusCode::CREATED, Json(response)).into_response(),
        Err(e) => {
            error!("Failed to create customer: {:#}", e);
            let status = if e.to_string().contains("already exists") {
                StatusCode::CONFLICT
            } else {
                StatusCode::BAD_REQUEST
            };
            service_failure(&e, status)
        }
    }
}

/// Find a customer by email (`?email=`)
pub async fn find_customer(State(state): State<AppState>, Query(lookup): Query<EmailLookup>) -> impl IntoResponse {
    info!("GET /api/customers/lookup - email: {}", lookup.email);

    match state.customer_service.find_by_email(&lookup.email).await {
        Ok(Some(customer)) => (StatusCode::OK, Json(customer)).into_response(),
        Ok(None) => failure(StatusCode::NOT_FOUND, format!("Customer not found: {}", lookup.email)),
        Err(e) => {
            error!("Failed to look up customer: {:#}", e);
            service_failure(&e, StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

pub async fn get_customer(State(state): State<AppState>, Path(customer_id): Path<String>) -> impl IntoResponse {
    info!("GET /api/customers/{}", customer_id);

    match state.customer_service.get_customer(&customer_id).await {
        Ok(Some(customer)) => (StatusCode::OK, Json(customer)).into_response(),
        Ok(None) => failure(StatusCode::NOT_FOUND, format!("Customer not found: {}", customer_id)),
        Err(e) => {
            error!("Failed to get customer: {:#}", e);
            service_failure(&e, StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

pub async fn update_customer(
    State(state): State<AppState>,
    Path(customer_id): Path<String>,
    Json(request): Json<UpdateCustomerRequest>,
) -> impl IntoResponse {
    info!("PUT /api/customers/{} - request: {:?}", customer_id, request);

    match state.customer_service.update_customer(&customer_id, request).await {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(e) => {
            error!("Failed to update customer: {:#}", e);
            service_failure(&e, StatusCode::BAD_REQUEST)
        }
    }
}

pub async fn delete_customer(State(state): State<AppState>, Path(customer_id): Path<String>) -> impl IntoResponse {
    info!("DELETE /api/customers/{}", customer_id);

    match state.customer_service.delete_customer(&customer_id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => {
            error!("Failed to delete customer: {:#}", e);
            service_failure(&e, StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}
