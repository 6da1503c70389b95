//! # REST API for Validation
//!
//! Lets forms check input with the same rules the services enforce.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json},
};
use log::info;
use serde::Deserialize;
use shared::PasswordCheckRequest;

use super::failure;
use crate::backend::domain::validation::{validate_field, validate_password, FieldOptions, FieldType};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldCheckRequest {
    pub value: String,
    /// email | phone | name | orderId | invoiceId | number | string
    pub field_type: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub label: Option<String>,
}

fn parse_field_type(name: &str) -> Option<FieldType> {
    match name.trim().to_ascii_lowercase().as_str() {
        "email" => Some(FieldType::Email),
        "phone" => Some(FieldType::Phone),
        "name" => Some(FieldType::Name),
        "orderid" => Some(FieldType::OrderId),
        "invoiceid" => Some(FieldType::InvoiceId),
        "number" => Some(FieldType::Number),
        "string" | "text" => Some(FieldType::String),
        _ => None,
    }
}

/// Password strength report; always 200, check `isValid`
pub async fn check_password(Json(request): Json<PasswordCheckRequest>) -> impl IntoResponse {
    info!("POST /api/validate/password");
    (StatusCode::OK, Json(validate_password(&request.password)))
}

pub async fn check_field(Json(request): Json<FieldCheckRequest>) -> impl IntoResponse {
    info!("POST /api/validate/field - type: {}", request.field_type);

    let Some(field_type) = parse_field_type(&request.field_type) else {
        return failure(StatusCode::BAD_REQUEST, format!("Unknown field type '{}'", request.field_type));
    };
    let mut options = if request.required { FieldOptions::required() } else { FieldOptions::default() };
    if let Some(label) = request.label {
        options = options.label(label);
    }
    (StatusCode::OK, Json(validate_field(&request.value, field_type, &options))).into_response()
}
