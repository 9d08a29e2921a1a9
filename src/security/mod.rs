//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → rate_limit.rs (per-client ceiling, 429 + Retry-After)
//!     → origin.rs (state-changing requests must come from the expected host, 403)
//!     → handler
//!         → validation.rs (raw input rules, first failure wins)
//!         → sanitize.rs (strip markup, escape) before storage
//! Outgoing response:
//!     → headers.rs (security headers)
//! ```
//!
//! # Design Decisions
//! - Defense in depth: multiple layers of protection
//! - Fail closed: reject on any security check failure
//! - No trust in client input

pub mod headers;
pub mod origin;
pub mod rate_limit;
pub mod sanitize;
pub mod validation;

pub use rate_limit::{RateDecision, RateLimiter};
pub use sanitize::sanitize;
pub use validation::{validate_cleaned, validate_poll, ValidationError};
