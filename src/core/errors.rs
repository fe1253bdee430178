use axum::http::{header, HeaderValue, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;
use thiserror::Error;

use crate::rag::RagError;

/// Seconds a client should wait before retrying an overloaded request.
const RETRY_AFTER_SECS: &str = "5";

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<RagError> for ApiError {
    fn from(err: RagError) -> Self {
        match err {
            RagError::Overloaded(inner) => {
                tracing::warn!("Upstream model still overloaded after retries: {}", inner);
                ApiError::ServiceUnavailable(
                    "The language model service is overloaded, try again shortly".to_string(),
                )
            }
            RagError::Catalog(inner) => {
                tracing::error!("Schema introspection failed: {}", inner);
                ApiError::Internal("Failed to read the database schema".to_string())
            }
            RagError::Upstream(inner) => {
                tracing::error!("Model call failed: {}", inner);
                ApiError::Internal("The language model request failed".to_string())
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match &self {
            ApiError::ServiceUnavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg.clone()),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
        };

        let body = Json(json!({ "error": message }));
        let mut response = (status, body).into_response();
        if status == StatusCode::SERVICE_UNAVAILABLE {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from_static(RETRY_AFTER_SECS));
        }
        response
    }
}
