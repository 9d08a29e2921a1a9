//! Operations exposed to the presentation layer.
//!
//! Each operation follows the same pipeline:
//! validate raw input → load resource → authorize → act → audit.

use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

use crate::audit::AuditRecorder;
use crate::authz::{AuthorizationEngine, RoleStore};
use crate::config::AppConfig;
use crate::domain::{
    actions, AuditRecord, Caller, NewPoll, Poll, PollId, PollUpdate, PrincipalId, ResourceType,
};
use crate::error::{CoreError, CoreResult};
use crate::security::{sanitize, validate_cleaned, validate_poll};
use crate::store::{Storage, StoreError};
use crate::votes::{OptionChoice, VoteCoordinator, VoteRateTracker, VoteReceipt};

/// Upper bound for a single audit listing.
pub const MAX_AUDIT_PAGE: usize = 500;

#[derive(Debug, Clone, Serialize)]
pub struct Created {
    pub id: PollId,
}

/// A poll with its per-option tallies.
#[derive(Debug, Clone, Serialize)]
pub struct PollView {
    #[serde(flatten)]
    pub poll: Poll,
    pub results: Vec<u64>,
    pub total_votes: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct PollSummary {
    pub id: PollId,
    pub question: String,
    pub option_count: usize,
    pub created_at: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct RoleChange {
    pub principal_id: PrincipalId,
    pub role: String,
    /// False when the grant or revoke was a no-op.
    pub changed: bool,
}

pub struct PollService {
    store: Arc<dyn Storage>,
    authz: AuthorizationEngine,
    votes: VoteCoordinator,
    audit: AuditRecorder,
}

impl PollService {
    pub fn new(store: Arc<dyn Storage>, config: &AppConfig) -> Self {
        let audit = AuditRecorder::new(store.clone(), Duration::from_millis(config.timeouts.audit_ms));
        let authz = AuthorizationEngine::new(RoleStore::new(store.clone()), audit.clone());
        let tracker = Arc::new(VoteRateTracker::from_config(&config.votes));
        let votes = VoteCoordinator::new(store.clone(), tracker, audit.clone());
        Self { store, authz, votes, audit }
    }

    pub fn authz(&self) -> &AuthorizationEngine {
        &self.authz
    }

    pub fn vote_tracker(&self) -> &Arc<VoteRateTracker> {
        self.votes.tracker()
    }

    pub async fn create_poll(&self, caller: &Caller, question: &str, options: &[String]) -> CoreResult<Created> {
        validate_poll(question, options)?;
        let (question, options) = clean_poll(question, options)?;
        self.authz.can_create_poll(caller).await.into_result()?;
        let owner = caller.principal.id().cloned().ok_or(CoreError::Unauthenticated)?;

        let id = self.store.insert_poll(NewPoll { owner, question, options }).await?;

        tracing::info!(principal = %caller.principal, poll_id = %id, "Poll created");
        self.audit
            .record(caller, actions::POLL_CREATED, ResourceType::Poll, Some(id.to_string()), "")
            .await;
        Ok(Created { id })
    }

    pub async fn update_poll(
        &self,
        caller: &Caller,
        poll_id: PollId,
        question: &str,
        options: &[String],
    ) -> CoreResult<()> {
        validate_poll(question, options)?;
        let (question, options) = clean_poll(question, options)?;
        let poll = self.store.get_poll(poll_id).await.map_err(CoreError::from_lookup)?;
        self.authz.can_edit_poll(caller, &poll).await.into_result()?;

        // the store refuses option changes once votes exist, atomically with the write
        match self.store.update_poll(poll_id, PollUpdate { question, options }).await {
            Ok(()) => {}
            Err(StoreError::ConstraintViolation(_)) => {
                return Err(CoreError::Conflict("poll already has votes, options cannot change"));
            }
            Err(e) => return Err(CoreError::from_lookup(e)),
        }

        tracing::info!(principal = %caller.principal, poll_id = %poll_id, "Poll updated");
        self.audit
            .record(caller, actions::POLL_UPDATED, ResourceType::Poll, Some(poll_id.to_string()), "")
            .await;
        Ok(())
    }

    pub async fn delete_poll(&self, caller: &Caller, poll_id: PollId) -> CoreResult<()> {
        let poll = self.store.get_poll(poll_id).await.map_err(CoreError::from_lookup)?;
        self.authz.can_delete_poll(caller, &poll).await.into_result()?;

        self.store.delete_poll(poll_id).await.map_err(CoreError::from_lookup)?;

        tracing::info!(principal = %caller.principal, poll_id = %poll_id, "Poll deleted");
        self.audit
            .record(
                caller,
                actions::POLL_DELETED,
                ResourceType::Poll,
                Some(poll_id.to_string()),
                format!("owner {}", poll.owner),
            )
            .await;
        Ok(())
    }

    pub async fn submit_vote(
        &self,
        caller: &Caller,
        poll_id: PollId,
        choice: impl Into<OptionChoice>,
    ) -> CoreResult<VoteReceipt> {
        self.votes.submit_vote(caller, poll_id, choice).await
    }

    pub async fn get_poll(&self, poll_id: PollId) -> CoreResult<PollView> {
        let poll = self.store.get_poll(poll_id).await.map_err(CoreError::from_lookup)?;
        let results = self.store.vote_counts(poll_id).await.map_err(CoreError::from_lookup)?;
        let total_votes = results.iter().sum();
        Ok(PollView { poll, results, total_votes })
    }

    pub async fn list_polls(&self) -> CoreResult<Vec<PollSummary>> {
        let polls = self.store.list_polls().await?;
        Ok(polls
            .into_iter()
            .map(|p| PollSummary {
                id: p.id,
                question: p.question,
                option_count: p.options.len(),
                created_at: p.created_at,
            })
            .collect())
    }

    /// Every poll with tallies. Admin only, re-checked per call.
    pub async fn list_all_polls_for_admin(&self, caller: &Caller) -> CoreResult<Vec<PollView>> {
        self.authz.can_view_admin_data(caller).await.into_result()?;

        let polls = self.store.list_polls().await?;
        let mut views = Vec::with_capacity(polls.len());
        for poll in polls {
            // a poll deleted between the listing and the tally is skipped
            let results = match self.store.vote_counts(poll.id).await {
                Ok(results) => results,
                Err(StoreError::NotFound) => continue,
                Err(e) => return Err(e.into()),
            };
            let total_votes = results.iter().sum();
            views.push(PollView { poll, results, total_votes });
        }
        Ok(views)
    }

    pub async fn list_audit_records(&self, caller: &Caller, limit: usize) -> CoreResult<Vec<AuditRecord>> {
        self.authz.can_view_admin_data(caller).await.into_result()?;
        Ok(self.store.list_audit_records(limit.clamp(1, MAX_AUDIT_PAGE)).await?)
    }

    pub async fn grant_role(&self, caller: &Caller, target: PrincipalId, role: &str) -> CoreResult<RoleChange> {
        let role = normalize_role(role)?;
        self.authz.can_grant_role(caller, &target).await.into_result()?;
        let granted_by = caller.principal.id().cloned().ok_or(CoreError::Unauthenticated)?;

        let changed = self.authz.roles().grant(target.clone(), &role, granted_by).await?;
        tracing::info!(principal = %caller.principal, target = %target, role = %role, changed, "Role granted");
        if changed {
            self.audit
                .record(caller, actions::ROLE_GRANTED, ResourceType::Role, Some(target.to_string()), role.clone())
                .await;
        }
        Ok(RoleChange { principal_id: target, role, changed })
    }

    pub async fn revoke_role(&self, caller: &Caller, target: PrincipalId, role: &str) -> CoreResult<RoleChange> {
        let role = normalize_role(role)?;
        self.authz.can_revoke_role(caller, &target, &role).await.into_result()?;

        let changed = self.authz.roles().revoke(&target, &role).await?;
        tracing::info!(principal = %caller.principal, target = %target, role = %role, changed, "Role revoked");
        if changed {
            self.audit
                .record(caller, actions::ROLE_REVOKED, ResourceType::Role, Some(target.to_string()), role.clone())
                .await;
        }
        Ok(RoleChange { principal_id: target, role, changed })
    }
}

fn clean(text: &str) -> String {
    sanitize(text.trim())
}

/// Sanitized question and options, re-validated in their stored form.
fn clean_poll(question: &str, options: &[String]) -> CoreResult<(String, Vec<String>)> {
    let question = clean(question);
    let options: Vec<String> = options.iter().map(|o| clean(o)).collect();
    validate_cleaned(&question, &options)?;
    Ok((question, options))
}

/// Role names are short lowercase identifiers.
fn normalize_role(role: &str) -> CoreResult<String> {
    let role = role.trim().to_ascii_lowercase();
    let valid = !role.is_empty()
        && role.len() <= 32
        && role.chars().all(|c| c.is_ascii_lowercase() || c == '_');
    if valid {
        Ok(role)
    } else {
        Err(CoreError::NotFound)
    }
}
