//! Identity resolution.
//!
//! Answers "who is asking" and nothing else. Resolution never fails: absent,
//! unknown or expired credentials resolve to `Principal::Anonymous`.

pub mod sessions;

use axum::http::{header, HeaderMap};

use crate::domain::Principal;

pub use sessions::SessionRegistry;

/// Credentials carried by an inbound request.
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    pub bearer_token: Option<String>,
}

impl Credentials {
    pub fn bearer(token: impl Into<String>) -> Self {
        Self { bearer_token: Some(token.into()) }
    }

    /// Extract an `Authorization: Bearer <token>` header.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let bearer_token = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string);
        Self { bearer_token }
    }
}

pub trait IdentityResolver: Send + Sync {
    fn resolve(&self, credentials: &Credentials) -> Principal;
}
