//! Audit subsystem.
//!
//! # Design Decisions
//! - Append-only: no update or delete is exposed
//! - Recording never blocks or fails the primary operation beyond a short,
//!   configured deadline

pub mod recorder;

pub use recorder::AuditRecorder;
