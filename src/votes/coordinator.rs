//! Vote submission.
//!
//! Gates, in order, each short-circuiting with no partial effect:
//! 1. principal must be authenticated
//! 2. option index must be a non-negative integer
//! 3. poll must exist
//! 4. option index must be in range
//! 5. no prior vote by this principal on this poll
//! 6. principal under the per-window vote ceiling
//! 7. insert; the store's (poll_id, voter) constraint is the final guard
//!
//! Gates 5 to 7 run while holding the principal's [`VoteSlot`], so concurrent
//! submissions by one principal cannot all pass the ceiling before any of
//! them is recorded.
//!
//! [`VoteSlot`]: super::tracker::VoteSlot

use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;

use super::tracker::VoteRateTracker;
use crate::audit::AuditRecorder;
use crate::domain::{actions, Caller, NewVote, PollId, ResourceType, VoteId};
use crate::error::{CoreError, CoreResult};
use crate::observability::metrics;
use crate::store::{Storage, StoreError};

/// An option index as submitted, before it is known to be usable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OptionChoice(Option<i64>);

impl OptionChoice {
    /// Only JSON integers are choices; floats, strings, null etc. are not.
    pub fn from_json(value: &serde_json::Value) -> Self {
        Self(value.as_i64())
    }

    fn index(self) -> Option<usize> {
        self.0.and_then(|i| usize::try_from(i).ok())
    }
}

impl From<i64> for OptionChoice {
    fn from(i: i64) -> Self {
        Self(Some(i))
    }
}

impl From<i32> for OptionChoice {
    fn from(i: i32) -> Self {
        Self(Some(i64::from(i)))
    }
}

impl From<usize> for OptionChoice {
    fn from(i: usize) -> Self {
        Self(i64::try_from(i).ok())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct VoteReceipt {
    pub vote_id: VoteId,
    pub poll_id: PollId,
    pub option_index: usize,
}

#[derive(Clone)]
pub struct VoteCoordinator {
    store: Arc<dyn Storage>,
    tracker: Arc<VoteRateTracker>,
    audit: AuditRecorder,
}

impl VoteCoordinator {
    pub fn new(store: Arc<dyn Storage>, tracker: Arc<VoteRateTracker>, audit: AuditRecorder) -> Self {
        Self { store, tracker, audit }
    }

    pub fn tracker(&self) -> &Arc<VoteRateTracker> {
        &self.tracker
    }

    pub async fn submit_vote(
        &self,
        caller: &Caller,
        poll_id: PollId,
        choice: impl Into<OptionChoice>,
    ) -> CoreResult<VoteReceipt> {
        let result = self.try_submit(caller, poll_id, choice.into()).await;
        metrics::record_vote(match &result {
            Ok(_) => "accepted",
            Err(e) => e.code(),
        });
        result
    }

    async fn try_submit(&self, caller: &Caller, poll_id: PollId, choice: OptionChoice) -> CoreResult<VoteReceipt> {
        let Some(voter) = caller.principal.id() else {
            self.audit
                .record(
                    caller,
                    actions::AUTHORIZATION_DENIED,
                    ResourceType::Vote,
                    Some(poll_id.to_string()),
                    "cast_vote: principal is anonymous",
                )
                .await;
            return Err(CoreError::Unauthenticated);
        };

        let index = choice.index().ok_or(CoreError::InvalidOption)?;

        let poll = self.store.get_poll(poll_id).await.map_err(CoreError::from_lookup)?;
        if index >= poll.options.len() {
            return Err(CoreError::InvalidOption);
        }

        // held until the vote is recorded
        let mut slot = self.tracker.acquire(voter).await;

        if self.store.vote_exists(poll_id, voter).await? {
            return Err(CoreError::AlreadyVoted);
        }

        if let Err(retry_after) = slot.check_at(Instant::now()) {
            tracing::warn!(principal = %voter, "Vote ceiling reached");
            metrics::record_rate_limited("vote");
            return Err(CoreError::RateLimited { retry_after });
        }

        let vote_id = match self
            .store
            .insert_vote(NewVote {
                poll_id,
                voter: voter.clone(),
                option_index: index,
            })
            .await
        {
            Ok(id) => id,
            Err(StoreError::ConstraintViolation(_)) => {
                tracing::debug!(principal = %voter, poll_id = %poll_id, "Concurrent duplicate vote rejected by store");
                return Err(CoreError::AlreadyVoted);
            }
            Err(StoreError::OutOfRange(_)) => {
                tracing::debug!(principal = %voter, poll_id = %poll_id, "Options changed before the vote was stored");
                return Err(CoreError::InvalidOption);
            }
            Err(e) => return Err(CoreError::from_lookup(e)),
        };
        slot.record_at(Instant::now());
        drop(slot);

        tracing::info!(principal = %voter, poll_id = %poll_id, option = index, "Vote recorded");
        self.audit
            .record(
                caller,
                actions::VOTE_CAST,
                ResourceType::Vote,
                Some(poll_id.to_string()),
                format!("option {}", index),
            )
            .await;

        Ok(VoteReceipt { vote_id, poll_id, option_index: index })
    }
}
