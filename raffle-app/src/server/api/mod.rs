//! REST API handlers grouped by domain.

pub mod chat;
pub mod connection;
pub mod logs;
pub mod raffle;
pub mod settings;

#[cfg(test)]
mod tests;

use axum::Json;
use axum::http::StatusCode;
use serde::Serialize;
use serde_json::{Value, json};

pub type ApiError = (StatusCode, Json<Value>);
pub type ApiResult = Result<Json<Value>, ApiError>;

/// Standard success response.
pub fn ok_json<T: Serialize>(data: &T) -> ApiResult {
    let data = serde_json::to_value(data).map_err(|e| err_json(500, &e.to_string()))?;
    Ok(Json(json!({ "status": "ok", "data": data })))
}

/// Standard error response.
pub fn err_json(status: u16, message: &str) -> ApiError {
    (
        StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
        Json(json!({ "status": "error", "error": message })),
    )
}
