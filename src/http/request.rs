//! Request inspection.
//!
//! # Responsibilities
//! - Derive the client key used by the rate limiter and audit trail
//! - Resolve the calling principal from credentials
//! - Parse resource ids from paths
//!
//! # Design Decisions
//! - `X-Forwarded-For` is only honored when configured; otherwise the peer
//!   address is the network origin
//! - Unparsable ids are reported as not found

use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::{header, request::Parts, Extensions, HeaderMap};
use std::convert::Infallible;
use std::net::SocketAddr;

use crate::domain::{Caller, PollId};
use crate::error::CoreError;
use crate::http::server::AppState;
use crate::identity::{Credentials, IdentityResolver};

pub const X_REQUEST_ID: &str = "x-request-id";

/// Maximum characters of the user agent kept in a client key.
const MAX_SIGNATURE_CHARS: usize = 128;

/// Client key attached to the request by the rate-limit layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientKey(pub String);

/// Network origin of the request.
pub fn client_ip(headers: &HeaderMap, extensions: &Extensions, trust_forwarded_for: bool) -> String {
    if trust_forwarded_for {
        let forwarded = headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty());
        if let Some(ip) = forwarded {
            return ip.to_string();
        }
    }

    extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// `"<ip>|<user-agent>"`.
pub fn client_key_from(headers: &HeaderMap, extensions: &Extensions, trust_forwarded_for: bool) -> String {
    let ip = client_ip(headers, extensions, trust_forwarded_for);
    let signature: String = headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-")
        .chars()
        .take(MAX_SIGNATURE_CHARS)
        .collect();
    format!("{}|{}", ip, signature)
}

pub fn client_key<B>(request: &axum::http::Request<B>, trust_forwarded_for: bool) -> String {
    client_key_from(request.headers(), request.extensions(), trust_forwarded_for)
}

pub fn parse_poll_id(raw: &str) -> Result<PollId, CoreError> {
    raw.parse().map_err(|_| CoreError::NotFound)
}

impl FromRequestParts<AppState> for Caller {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let principal = state.sessions.resolve(&Credentials::from_headers(&parts.headers));
        let origin = match parts.extensions.get::<ClientKey>() {
            Some(ClientKey(key)) => key.clone(),
            None => client_key_from(
                &parts.headers,
                &parts.extensions,
                state.config.rate_limit.trust_forwarded_for,
            ),
        };
        Ok(Caller { principal, origin: Some(origin) })
    }
}
