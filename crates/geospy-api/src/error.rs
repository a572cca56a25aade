//! API error types

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use geospy_core::CacheError;
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            ApiError::Cache(e) => match e {
                CacheError::NotFound(name) => (
                    StatusCode::NOT_FOUND,
                    "CACHE_NOT_FOUND",
                    format!("Cache not found: {}", name),
                ),
                CacheError::InvalidConfig(msg) => {
                    (StatusCode::BAD_REQUEST, "INVALID_CONFIG", msg.clone())
                }
                _ => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    e.to_string(),
                ),
            },
        };

        let body = axum::Json(json!({
            "error": {
                "code": code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}
