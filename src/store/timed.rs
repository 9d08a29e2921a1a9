//! Timeout enforcement for storage calls.
//!
//! # Design Decisions
//! - Every call gets the same deadline; nothing in the core waits unbounded
//! - An elapsed deadline becomes `StoreError::Timeout` and is treated like any
//!   other storage failure by callers (role lookups fail closed)

use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use super::{Storage, StoreError, StoreResult};
use crate::domain::{
    AuditRecord, NewAuditRecord, NewPoll, NewVote, Poll, PollId, PollUpdate, PrincipalId,
    RoleAssignment, VoteId,
};

/// Decorator that bounds every call to the wrapped store.
pub struct TimedStore {
    inner: Arc<dyn Storage>,
    timeout: Duration,
}

impl TimedStore {
    pub fn new(inner: Arc<dyn Storage>, timeout: Duration) -> Self {
        Self { inner, timeout }
    }

    async fn bounded<T>(&self, op: &'static str, fut: impl Future<Output = StoreResult<T>>) -> StoreResult<T> {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(operation = op, timeout_ms = self.timeout.as_millis() as u64, "Storage call timed out");
                Err(StoreError::Timeout(self.timeout.as_millis() as u64))
            }
        }
    }
}

#[async_trait]
impl Storage for TimedStore {
    async fn get_poll(&self, id: PollId) -> StoreResult<Poll> {
        self.bounded("get_poll", self.inner.get_poll(id)).await
    }

    async fn list_polls(&self) -> StoreResult<Vec<Poll>> {
        self.bounded("list_polls", self.inner.list_polls()).await
    }

    async fn insert_poll(&self, poll: NewPoll) -> StoreResult<PollId> {
        self.bounded("insert_poll", self.inner.insert_poll(poll)).await
    }

    async fn update_poll(&self, id: PollId, update: PollUpdate) -> StoreResult<()> {
        self.bounded("update_poll", self.inner.update_poll(id, update)).await
    }

    async fn delete_poll(&self, id: PollId) -> StoreResult<()> {
        self.bounded("delete_poll", self.inner.delete_poll(id)).await
    }

    async fn get_role(&self, principal: &PrincipalId, role: &str) -> StoreResult<bool> {
        self.bounded("get_role", self.inner.get_role(principal, role)).await
    }

    async fn insert_role(&self, assignment: RoleAssignment) -> StoreResult<bool> {
        self.bounded("insert_role", self.inner.insert_role(assignment)).await
    }

    async fn delete_role(&self, principal: &PrincipalId, role: &str) -> StoreResult<bool> {
        self.bounded("delete_role", self.inner.delete_role(principal, role)).await
    }

    async fn vote_exists(&self, poll: PollId, voter: &PrincipalId) -> StoreResult<bool> {
        self.bounded("vote_exists", self.inner.vote_exists(poll, voter)).await
    }

    async fn insert_vote(&self, vote: NewVote) -> StoreResult<VoteId> {
        self.bounded("insert_vote", self.inner.insert_vote(vote)).await
    }

    async fn vote_counts(&self, poll: PollId) -> StoreResult<Vec<u64>> {
        self.bounded("vote_counts", self.inner.vote_counts(poll)).await
    }

    async fn append_audit_record(&self, record: NewAuditRecord) -> StoreResult<()> {
        self.bounded("append_audit_record", self.inner.append_audit_record(record)).await
    }

    async fn list_audit_records(&self, limit: usize) -> StoreResult<Vec<AuditRecord>> {
        self.bounded("list_audit_records", self.inner.list_audit_records(limit)).await
    }
}
