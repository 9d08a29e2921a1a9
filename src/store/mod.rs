//! Persistence boundary.
//!
//! # Data Flow
//! ```text
//! service / authz / votes / audit
//!     → Arc<dyn Storage>
//!         → timed.rs  (per-call timeout, timeout = storage failure)
//!         → memory.rs (in-process tables, uniqueness constraints, snapshot)
//! ```
//!
//! # Design Decisions
//! - Uniqueness of (poll_id, voter) and (principal_id, role) is enforced by the
//!   store at insert time; callers' pre-checks only produce friendlier errors
//! - Deleting a poll deletes its votes in the same critical section
//! - Audit records can only be appended and listed

pub mod memory;
pub mod timed;

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{
    AuditRecord, NewAuditRecord, NewPoll, NewVote, Poll, PollId, PollUpdate, PrincipalId,
    RoleAssignment, VoteId,
};

pub use memory::MemoryStore;
pub use timed::TimedStore;

/// Errors surfaced by a storage backend.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The addressed row does not exist.
    #[error("record not found")]
    NotFound,

    /// A write would violate a uniqueness or locking constraint.
    #[error("constraint violation: {0}")]
    ConstraintViolation(String),

    /// A written value points past the end of the row it references.
    #[error("out of range: {0}")]
    OutOfRange(String),

    /// The backend could not be reached or refused the operation.
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    /// The operation did not complete in time.
    #[error("storage operation timed out after {0} ms")]
    Timeout(u64),

    #[error("snapshot I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("snapshot format error: {0}")]
    Serde(#[from] serde_json::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Abstract operations consumed from the persistence collaborator.
#[async_trait]
pub trait Storage: Send + Sync {
    async fn get_poll(&self, id: PollId) -> StoreResult<Poll>;

    async fn list_polls(&self) -> StoreResult<Vec<Poll>>;

    async fn insert_poll(&self, poll: NewPoll) -> StoreResult<PollId>;

    /// Fails with `ConstraintViolation` if the options would change while the
    /// poll has votes. The check and the write are one atomic step.
    async fn update_poll(&self, id: PollId, update: PollUpdate) -> StoreResult<()>;

    /// Removes the poll and every vote that references it.
    async fn delete_poll(&self, id: PollId) -> StoreResult<()>;

    async fn get_role(&self, principal: &PrincipalId, role: &str) -> StoreResult<bool>;

    /// Returns `false` when the assignment already existed.
    async fn insert_role(&self, assignment: RoleAssignment) -> StoreResult<bool>;

    /// Returns `false` when there was nothing to delete.
    async fn delete_role(&self, principal: &PrincipalId, role: &str) -> StoreResult<bool>;

    async fn vote_exists(&self, poll: PollId, voter: &PrincipalId) -> StoreResult<bool>;

    /// Fails with `ConstraintViolation` if the voter already voted on the poll,
    /// with `OutOfRange` if the option index is not below the poll's current
    /// option count and with `NotFound` if the poll is gone.
    async fn insert_vote(&self, vote: NewVote) -> StoreResult<VoteId>;

    /// Number of votes per option index, `len == poll.options.len()`.
    async fn vote_counts(&self, poll: PollId) -> StoreResult<Vec<u64>>;

    async fn append_audit_record(&self, record: NewAuditRecord) -> StoreResult<()>;

    /// Most recent first.
    async fn list_audit_records(&self, limit: usize) -> StoreResult<Vec<AuditRecord>>;
}
