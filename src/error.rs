//! Error taxonomy of the access-control core.
//!
//! Every rejection is a normal return value. Only [`CoreError::user_message`]
//! crosses the boundary to clients; authorization reasons go to the audit
//! trail and storage details to the operational log.

use std::time::Duration;
use thiserror::Error;

use crate::security::validation::ValidationError;
use crate::store::StoreError;

/// Coarse class of a failure, used for status mapping and propagation policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Authorization,
    Conflict,
    RateLimit,
    NotFound,
    Storage,
}

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("{0}")]
    Validation(#[from] ValidationError),

    /// Option index negative, non-integer, or beyond the poll's options.
    #[error("invalid option")]
    InvalidOption,

    #[error("authentication required")]
    Unauthenticated,

    /// Denied by policy. `reason` is for the audit trail only.
    #[error("not permitted: {reason}")]
    NotPermitted { reason: String },

    #[error("already voted")]
    AlreadyVoted,

    /// Change refused because of existing state.
    #[error("{0}")]
    Conflict(&'static str),

    #[error("rate limited, retry after {}s", .retry_after.as_secs())]
    RateLimited { retry_after: Duration },

    #[error("not found")]
    NotFound,

    #[error("storage failure: {0}")]
    Storage(#[from] StoreError),
}

pub type CoreResult<T> = Result<T, CoreError>;

impl CoreError {
    /// Map a store error where absence means "not found" for the caller.
    pub fn from_lookup(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => CoreError::NotFound,
            other => CoreError::Storage(other),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::Validation(ValidationError::DuplicateOption { .. }) => ErrorKind::Conflict,
            CoreError::Validation(_) | CoreError::InvalidOption => ErrorKind::Validation,
            CoreError::Unauthenticated | CoreError::NotPermitted { .. } => ErrorKind::Authorization,
            CoreError::AlreadyVoted | CoreError::Conflict(_) => ErrorKind::Conflict,
            CoreError::RateLimited { .. } => ErrorKind::RateLimit,
            CoreError::NotFound => ErrorKind::NotFound,
            CoreError::Storage(_) => ErrorKind::Storage,
        }
    }

    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            CoreError::Validation(ValidationError::DuplicateOption { .. }) => "duplicate_option",
            CoreError::Validation(_) => "validation_error",
            CoreError::InvalidOption => "invalid_option",
            CoreError::Unauthenticated => "unauthenticated",
            CoreError::NotPermitted { .. } => "not_permitted",
            CoreError::AlreadyVoted => "already_voted",
            CoreError::Conflict(_) => "conflict",
            CoreError::RateLimited { .. } => "rate_limited",
            CoreError::NotFound => "not_found",
            CoreError::Storage(_) => "storage_error",
        }
    }

    /// Text that is safe to show to the end user.
    pub fn user_message(&self) -> String {
        match self {
            CoreError::Validation(e) => e.to_string(),
            CoreError::NotPermitted { .. } => "not permitted".to_string(),
            CoreError::RateLimited { .. } => "too many votes, try again later".to_string(),
            CoreError::Storage(_) => "something went wrong, please try again".to_string(),
            other => other.to_string(),
        }
    }

    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            CoreError::RateLimited { retry_after } => Some(*retry_after),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_internal_details_not_exposed() {
        let denied = CoreError::NotPermitted { reason: "not owner of poll 42".into() };
        assert_eq!(denied.user_message(), "not permitted");
        assert_eq!(denied.kind(), ErrorKind::Authorization);

        let storage = CoreError::Storage(StoreError::Unavailable("db-7 refused".into()));
        assert!(!storage.user_message().contains("db-7"));
        assert_eq!(storage.kind(), ErrorKind::Storage);
    }

    #[test]
    fn test_validation_and_conflict_are_verbatim() {
        let err = CoreError::from(ValidationError::EmptyQuestion);
        assert_eq!(err.user_message(), "question is required");
        assert_eq!(CoreError::AlreadyVoted.user_message(), "already voted");

        let dup = CoreError::from(ValidationError::DuplicateOption { position: 2 });
        assert_eq!(dup.kind(), ErrorKind::Conflict);
        assert_eq!(dup.code(), "duplicate_option");

        let locked = CoreError::Conflict("poll already has votes, options cannot change");
        assert_eq!(locked.kind(), ErrorKind::Conflict);
        assert_eq!(locked.code(), "conflict");
        assert_eq!(locked.user_message(), "poll already has votes, options cannot change");
    }

    #[test]
    fn test_lookup_mapping() {
        assert!(matches!(CoreError::from_lookup(StoreError::NotFound), CoreError::NotFound));
        assert!(matches!(CoreError::from_lookup(StoreError::Timeout(5)), CoreError::Storage(_)));
    }
}
