//! Vote integrity.
//!
//! # Design Decisions
//! - The ledger is authoritative for duplicates; the pre-check only gives a
//!   fast, friendly `AlreadyVoted`
//! - The per-principal ceiling is independent of the per-client request
//!   limiter in `security::rate_limit`
//! - Anonymous votes are not accepted

pub mod coordinator;
pub mod tracker;

pub use coordinator::{OptionChoice, VoteCoordinator, VoteReceipt};
pub use tracker::{VoteRateTracker, VoteSlot};
