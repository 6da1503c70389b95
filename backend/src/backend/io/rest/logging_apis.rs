//! Client-side log and error reports, forwarded into the server log.

use axum::{extract::State, http::StatusCode, response::Json};
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};

use crate::backend::AppState;

#[derive(Debug, Deserialize)]
pub struct LogRequest {
    pub level: String,
    pub message: String,
    pub component: Option<String>,
    /// Page the report came from
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub stack: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct LogResponse {
    pub success: bool,
}

pub async fn log_message(
    State(_app_state): State<AppState>,
    Json(request): Json<LogRequest>,
) -> Result<Json<LogResponse>, StatusCode> {
    if request.message.trim().is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }

    let component = request.component.as_deref().unwrap_or("client");
    let mut message = format!("[{}] {}", component, request.message);
    if let Some(url) = &request.url {
        message.push_str(&format!(" (at {})", url));
    }

    match request.level.to_lowercase().as_str() {
        "debug" => debug!("{}", message),
        "info" => info!("{}", message),
        "warn" | "warning" => warn!("{}", message),
        "error" => {
            error!("{}", message);
            if let Some(stack) = &request.stack {
                error!("[{}] stack: {}", component, stack);
            }
        }
        _ => info!("{}", message),
    }

    Ok(Json(LogResponse { success: true }))
}
