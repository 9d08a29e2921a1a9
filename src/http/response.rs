//! Uniform response shape.
//!
//! Every API response body is `{ "data": T | null, "error": string | null }`.
//! Errors are mapped to a status code by kind; only the user-safe message is
//! serialized. Storage failures are logged here with full detail.

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult, ErrorKind};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self { data: Some(data), error: None }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self { data: None, error: Some(message.into()) }
    }
}

pub fn status_for(err: &CoreError) -> StatusCode {
    match (err, err.kind()) {
        (CoreError::Unauthenticated, _) => StatusCode::UNAUTHORIZED,
        (_, ErrorKind::Validation) => StatusCode::BAD_REQUEST,
        (_, ErrorKind::Authorization) => StatusCode::FORBIDDEN,
        (_, ErrorKind::Conflict) => StatusCode::CONFLICT,
        (_, ErrorKind::RateLimit) => StatusCode::TOO_MANY_REQUESTS,
        (_, ErrorKind::NotFound) => StatusCode::NOT_FOUND,
        (_, ErrorKind::Storage) => StatusCode::SERVICE_UNAVAILABLE,
    }
}

/// Convert an operation result into an HTTP response.
pub fn respond<T: Serialize>(result: CoreResult<T>, success: StatusCode) -> Response {
    match result {
        Ok(data) => (success, Json(ApiResponse::success(data))).into_response(),
        Err(err) => error_response(&err),
    }
}

pub fn error_response(err: &CoreError) -> Response {
    let status = status_for(err);
    match err.kind() {
        ErrorKind::Storage => tracing::error!(error = %err, "Storage failure"),
        ErrorKind::Authorization => tracing::debug!(error = %err, "Request not permitted"),
        _ => tracing::debug!(code = err.code(), "Request rejected"),
    }

    let body: ApiResponse<()> = ApiResponse::failure(err.user_message());
    let mut response = (status, Json(body)).into_response();
    if let Some(retry_after) = err.retry_after() {
        response
            .headers_mut()
            .insert(header::RETRY_AFTER, HeaderValue::from(retry_after.as_secs().max(1)));
    }
    response
}
