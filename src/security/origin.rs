//! Origin check for state-changing requests.
//!
//! Requests with `POST`, `PUT`, `PATCH` or `DELETE` must carry an `Origin`
//! header whose `host[:port]` equals the expected host. The expected host is
//! taken from configuration, or from the request's own `Host` header when none
//! is configured. A missing or unparsable `Origin` is a mismatch.

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, Method, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;
use url::Url;

use crate::http::response::ApiResponse;
use crate::observability::metrics;

/// Why a request failed the origin check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OriginRejection {
    MissingOrigin,
    MalformedOrigin,
    MissingHost,
    Mismatch { origin: String, expected: String },
}

#[derive(Debug, Clone)]
pub struct OriginPolicy {
    pub enabled: bool,
    pub expected_host: Option<String>,
}

impl OriginPolicy {
    pub fn new(enabled: bool, expected_host: Option<String>) -> Self {
        Self { enabled, expected_host }
    }

    pub fn is_state_changing(method: &Method) -> bool {
        matches!(*method, Method::POST | Method::PUT | Method::PATCH | Method::DELETE)
    }

    /// Check one request's method and headers.
    pub fn check(&self, method: &Method, headers: &HeaderMap) -> Result<(), OriginRejection> {
        if !self.enabled || !Self::is_state_changing(method) {
            return Ok(());
        }

        let origin = headers
            .get(header::ORIGIN)
            .and_then(|v| v.to_str().ok())
            .ok_or(OriginRejection::MissingOrigin)?;
        let url = Url::parse(origin).map_err(|_| OriginRejection::MalformedOrigin)?;
        let host = url.host_str().ok_or(OriginRejection::MalformedOrigin)?;
        let origin_host = match url.port() {
            Some(port) => format!("{}:{}", host, port),
            None => host.to_string(),
        };

        let expected = match &self.expected_host {
            Some(h) => h.clone(),
            None => headers
                .get(header::HOST)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
                .ok_or(OriginRejection::MissingHost)?,
        };

        if origin_host.eq_ignore_ascii_case(&expected) {
            Ok(())
        } else {
            Err(OriginRejection::Mismatch { origin: origin_host, expected })
        }
    }
}

pub async fn origin_check_middleware(
    State(policy): State<Arc<OriginPolicy>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    match policy.check(request.method(), request.headers()) {
        Ok(()) => next.run(request).await,
        Err(rejection) => {
            tracing::warn!(
                method = %request.method(),
                path = %request.uri().path(),
                rejection = ?rejection,
                "Origin check failed"
            );
            metrics::record_origin_rejected();
            let body: ApiResponse<()> = ApiResponse::failure("not permitted");
            (StatusCode::FORBIDDEN, Json(body)).into_response()
        }
    }
}
