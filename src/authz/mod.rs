//! Access control.
//!
//! # Data Flow
//! ```text
//! Caller + resource
//!     → engine.rs (ownership, then role)
//!         → roles.rs (fail-closed lookup against the store)
//!     → Decision::Allow | Decision::Deny { reason }
//!         → deny: audit "authorization_denied"
//! ```
//!
//! # Design Decisions
//! - Deny by default
//! - No decision or role is cached across calls

pub mod engine;
pub mod roles;

pub use engine::{AuthorizationEngine, Decision, DenyReason, Operation};
pub use roles::RoleStore;
