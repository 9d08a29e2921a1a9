//! In-process storage backend with optional JSON snapshot persistence.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::RwLock;

use super::{Storage, StoreError, StoreResult};
use crate::domain::{
    now_millis, AuditId, AuditRecord, NewAuditRecord, NewPoll, NewVote, Poll, PollId, PollUpdate,
    PrincipalId, RoleAssignment, Vote, VoteId,
};

/// All tables, guarded by one lock so multi-table writes are atomic.
#[derive(Debug, Default, Serialize, Deserialize)]
struct Tables {
    polls: BTreeMap<PollId, Poll>,
    votes: Vec<Vote>,
    roles: Vec<RoleAssignment>,
    audit: Vec<AuditRecord>,
    /// Unique index over (poll_id, voter).
    #[serde(skip)]
    voted: HashSet<(PollId, PrincipalId)>,
}

impl Tables {
    fn rebuild_indexes(&mut self) {
        self.voted = self
            .votes
            .iter()
            .filter_map(|v| v.voter.clone().map(|voter| (v.poll_id, voter)))
            .collect();
    }
}

/// Switches used by tests to simulate backend outages.
#[derive(Debug, Default)]
struct Faults {
    all: AtomicBool,
    roles: AtomicBool,
    audit: AtomicBool,
}

/// A thread-safe in-memory store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
    faults: Faults,
    role_lookups: AtomicUsize,
    snapshot_path: Option<PathBuf>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from a snapshot file if it exists; the same path is used by
    /// [`MemoryStore::save_snapshot`].
    pub async fn load_snapshot(path: &Path) -> StoreResult<Self> {
        let mut store = Self::new();
        store.snapshot_path = Some(path.to_path_buf());

        if path.exists() {
            let content = tokio::fs::read_to_string(path).await?;
            let mut tables: Tables = serde_json::from_str(&content)?;
            tables.rebuild_indexes();
            tracing::info!(
                polls = tables.polls.len(),
                votes = tables.votes.len(),
                roles = tables.roles.len(),
                "Loaded store snapshot"
            );
            store.tables = RwLock::new(tables);
        }
        Ok(store)
    }

    /// Write all tables to the snapshot path, if one was configured.
    pub async fn save_snapshot(&self) -> StoreResult<()> {
        if let Some(path) = &self.snapshot_path {
            let content = {
                let tables = self.tables.read().await;
                serde_json::to_string_pretty(&*tables)?
            };
            tokio::fs::write(path, content).await?;
            tracing::info!(path = %path.display(), "Saved store snapshot");
        }
        Ok(())
    }

    /// Make every operation fail with `Unavailable`.
    pub fn set_unavailable(&self, on: bool) {
        self.faults.all.store(on, Ordering::SeqCst);
    }

    /// Make role lookups fail with `Unavailable`.
    pub fn set_roles_unavailable(&self, on: bool) {
        self.faults.roles.store(on, Ordering::SeqCst);
    }

    /// Make audit appends fail with `Unavailable`.
    pub fn set_audit_unavailable(&self, on: bool) {
        self.faults.audit.store(on, Ordering::SeqCst);
    }

    /// Number of `get_role` calls served so far.
    pub fn role_lookups(&self) -> usize {
        self.role_lookups.load(Ordering::SeqCst)
    }

    /// Number of stored votes for `(poll, voter)`.
    pub async fn vote_rows(&self, poll: PollId, voter: &PrincipalId) -> usize {
        let tables = self.tables.read().await;
        tables
            .votes
            .iter()
            .filter(|v| v.poll_id == poll && v.voter.as_ref() == Some(voter))
            .count()
    }

    /// Number of assignments per role name.
    pub async fn role_summary(&self) -> HashMap<String, usize> {
        let tables = self.tables.read().await;
        let mut summary = HashMap::new();
        for r in &tables.roles {
            *summary.entry(r.role.clone()).or_insert(0) += 1;
        }
        summary
    }

    fn check(&self, extra: &AtomicBool, what: &str) -> StoreResult<()> {
        if self.faults.all.load(Ordering::SeqCst) || extra.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable(format!("{} backend offline", what)));
        }
        Ok(())
    }

    fn check_all(&self) -> StoreResult<()> {
        if self.faults.all.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("backend offline".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl Storage for MemoryStore {
    async fn get_poll(&self, id: PollId) -> StoreResult<Poll> {
        self.check_all()?;
        let tables = self.tables.read().await;
        tables.polls.get(&id).cloned().ok_or(StoreError::NotFound)
    }

    async fn list_polls(&self) -> StoreResult<Vec<Poll>> {
        self.check_all()?;
        let tables = self.tables.read().await;
        let mut polls: Vec<Poll> = tables.polls.values().cloned().collect();
        polls.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(polls)
    }

    async fn insert_poll(&self, poll: NewPoll) -> StoreResult<PollId> {
        self.check_all()?;
        let now = now_millis();
        let id = PollId::new();
        let mut tables = self.tables.write().await;
        tables.polls.insert(
            id,
            Poll {
                id,
                owner: poll.owner,
                question: poll.question,
                options: poll.options,
                created_at: now,
                updated_at: now,
            },
        );
        Ok(id)
    }

    async fn update_poll(&self, id: PollId, update: PollUpdate) -> StoreResult<()> {
        self.check_all()?;
        let mut tables = self.tables.write().await;
        let current = tables.polls.get(&id).ok_or(StoreError::NotFound)?;
        if current.options != update.options && tables.votes.iter().any(|v| v.poll_id == id) {
            return Err(StoreError::ConstraintViolation(
                "poll options are locked once votes exist".into(),
            ));
        }
        let poll = tables.polls.get_mut(&id).ok_or(StoreError::NotFound)?;
        poll.question = update.question;
        poll.options = update.options;
        poll.updated_at = now_millis();
        Ok(())
    }

    async fn delete_poll(&self, id: PollId) -> StoreResult<()> {
        self.check_all()?;
        let mut tables = self.tables.write().await;
        if tables.polls.remove(&id).is_none() {
            return Err(StoreError::NotFound);
        }
        tables.votes.retain(|v| v.poll_id != id);
        tables.voted.retain(|(poll_id, _)| *poll_id != id);
        Ok(())
    }

    async fn get_role(&self, principal: &PrincipalId, role: &str) -> StoreResult<bool> {
        self.role_lookups.fetch_add(1, Ordering::SeqCst);
        self.check(&self.faults.roles, "role")?;
        let tables = self.tables.read().await;
        Ok(tables
            .roles
            .iter()
            .any(|r| &r.principal_id == principal && r.role == role))
    }

    async fn insert_role(&self, assignment: RoleAssignment) -> StoreResult<bool> {
        self.check(&self.faults.roles, "role")?;
        let mut tables = self.tables.write().await;
        let exists = tables
            .roles
            .iter()
            .any(|r| r.principal_id == assignment.principal_id && r.role == assignment.role);
        if exists {
            return Ok(false);
        }
        tables.roles.push(assignment);
        Ok(true)
    }

    async fn delete_role(&self, principal: &PrincipalId, role: &str) -> StoreResult<bool> {
        self.check(&self.faults.roles, "role")?;
        let mut tables = self.tables.write().await;
        let before = tables.roles.len();
        tables
            .roles
            .retain(|r| !(&r.principal_id == principal && r.role == role));
        Ok(tables.roles.len() != before)
    }

    async fn vote_exists(&self, poll: PollId, voter: &PrincipalId) -> StoreResult<bool> {
        self.check_all()?;
        let tables = self.tables.read().await;
        Ok(tables.voted.contains(&(poll, voter.clone())))
    }

    async fn insert_vote(&self, vote: NewVote) -> StoreResult<VoteId> {
        self.check_all()?;
        let mut tables = self.tables.write().await;
        let options = tables
            .polls
            .get(&vote.poll_id)
            .map(|p| p.options.len())
            .ok_or(StoreError::NotFound)?;
        if vote.option_index >= options {
            return Err(StoreError::OutOfRange(format!(
                "option_index {} of {} options",
                vote.option_index, options
            )));
        }
        let key = (vote.poll_id, vote.voter.clone());
        if !tables.voted.insert(key) {
            return Err(StoreError::ConstraintViolation(
                "votes(poll_id, voter) must be unique".into(),
            ));
        }
        let id = VoteId::new();
        tables.votes.push(Vote {
            id,
            poll_id: vote.poll_id,
            voter: Some(vote.voter),
            option_index: vote.option_index,
            created_at: now_millis(),
        });
        Ok(id)
    }

    async fn vote_counts(&self, poll: PollId) -> StoreResult<Vec<u64>> {
        self.check_all()?;
        let tables = self.tables.read().await;
        let options = tables
            .polls
            .get(&poll)
            .map(|p| p.options.len())
            .ok_or(StoreError::NotFound)?;
        let mut counts = vec![0u64; options];
        for vote in tables.votes.iter().filter(|v| v.poll_id == poll) {
            if let Some(slot) = counts.get_mut(vote.option_index) {
                *slot += 1;
            }
        }
        Ok(counts)
    }

    async fn append_audit_record(&self, record: NewAuditRecord) -> StoreResult<()> {
        self.check(&self.faults.audit, "audit")?;
        let mut tables = self.tables.write().await;
        tables.audit.push(AuditRecord {
            id: AuditId::new(),
            actor: record.actor,
            action: record.action.to_string(),
            resource_type: record.resource_type,
            resource_id: record.resource_id,
            detail: record.detail,
            origin: record.origin,
            created_at: now_millis(),
        });
        Ok(())
    }

    async fn list_audit_records(&self, limit: usize) -> StoreResult<Vec<AuditRecord>> {
        self.check(&self.faults.audit, "audit")?;
        let tables = self.tables.read().await;
        Ok(tables.audit.iter().rev().take(limit).cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ResourceType, ADMIN_ROLE};

    fn new_poll(owner: &str) -> NewPoll {
        NewPoll {
            owner: PrincipalId::new(owner),
            question: "Best color?".into(),
            options: vec!["Red".into(), "Blue".into()],
        }
    }

    #[tokio::test]
    async fn test_vote_past_current_options_rejected() {
        let store = MemoryStore::new();
        let poll = store.insert_poll(new_poll("alice")).await.unwrap();
        let bob = PrincipalId::new("bob");

        let result = store
            .insert_vote(NewVote { poll_id: poll, voter: bob.clone(), option_index: 2 })
            .await;
        assert!(matches!(result, Err(StoreError::OutOfRange(_))));
        assert!(!store.vote_exists(poll, &bob).await.unwrap());
    }

    #[tokio::test]
    async fn test_options_locked_once_voted() {
        let store = MemoryStore::new();
        let poll = store
            .insert_poll(NewPoll {
                owner: PrincipalId::new("alice"),
                question: "Q?".into(),
                options: vec!["a".into(), "b".into(), "c".into()],
            })
            .await
            .unwrap();

        // a vote lands after the caller last saw zero tallies
        assert_eq!(store.vote_counts(poll).await.unwrap(), vec![0, 0, 0]);
        store
            .insert_vote(NewVote { poll_id: poll, voter: PrincipalId::new("bob"), option_index: 2 })
            .await
            .unwrap();

        let shrink = PollUpdate { question: "Q?".into(), options: vec!["a".into(), "b".into()] };
        let result = store.update_poll(poll, shrink).await;
        assert!(matches!(result, Err(StoreError::ConstraintViolation(_))));
        assert_eq!(store.vote_counts(poll).await.unwrap(), vec![0, 0, 1]);

        // the question alone may still change
        let reword = PollUpdate {
            question: "Q2?".into(),
            options: vec!["a".into(), "b".into(), "c".into()],
        };
        store.update_poll(poll, reword).await.unwrap();
        assert_eq!(store.get_poll(poll).await.unwrap().question, "Q2?");
    }

    #[tokio::test]
    async fn test_vote_uniqueness_constraint() {
        let store = MemoryStore::new();
        let poll = store.insert_poll(new_poll("alice")).await.unwrap();
        let bob = PrincipalId::new("bob");

        store
            .insert_vote(NewVote { poll_id: poll, voter: bob.clone(), option_index: 0 })
            .await
            .unwrap();
        let second = store
            .insert_vote(NewVote { poll_id: poll, voter: bob.clone(), option_index: 1 })
            .await;

        assert!(matches!(second, Err(StoreError::ConstraintViolation(_))));
        assert!(store.vote_exists(poll, &bob).await.unwrap());
        assert_eq!(store.vote_rows(poll, &bob).await, 1);
        assert_eq!(store.vote_counts(poll).await.unwrap(), vec![1, 0]);
    }

    #[tokio::test]
    async fn test_delete_poll_cascades_votes() {
        let store = MemoryStore::new();
        let poll = store.insert_poll(new_poll("alice")).await.unwrap();
        let bob = PrincipalId::new("bob");
        store
            .insert_vote(NewVote { poll_id: poll, voter: bob.clone(), option_index: 1 })
            .await
            .unwrap();

        store.delete_poll(poll).await.unwrap();

        assert!(matches!(store.get_poll(poll).await, Err(StoreError::NotFound)));
        assert!(!store.vote_exists(poll, &bob).await.unwrap());
        assert!(matches!(store.delete_poll(poll).await, Err(StoreError::NotFound)));
    }

    #[tokio::test]
    async fn test_vote_on_missing_poll() {
        let store = MemoryStore::new();
        let result = store
            .insert_vote(NewVote {
                poll_id: PollId::new(),
                voter: PrincipalId::new("bob"),
                option_index: 0,
            })
            .await;
        assert!(matches!(result, Err(StoreError::NotFound)));
    }

    #[tokio::test]
    async fn test_role_grant_is_idempotent() {
        let store = MemoryStore::new();
        let assignment = RoleAssignment {
            principal_id: PrincipalId::new("carol"),
            role: ADMIN_ROLE.into(),
            granted_by: PrincipalId::new("root"),
            granted_at: now_millis(),
        };

        assert!(store.insert_role(assignment.clone()).await.unwrap());
        assert!(!store.insert_role(assignment).await.unwrap());
        assert!(store.get_role(&PrincipalId::new("carol"), ADMIN_ROLE).await.unwrap());

        assert!(store.delete_role(&PrincipalId::new("carol"), ADMIN_ROLE).await.unwrap());
        assert!(!store.delete_role(&PrincipalId::new("carol"), ADMIN_ROLE).await.unwrap());
        assert!(!store.get_role(&PrincipalId::new("carol"), ADMIN_ROLE).await.unwrap());
    }

    #[tokio::test]
    async fn test_fault_injection() {
        let store = MemoryStore::new();
        store.set_roles_unavailable(true);
        assert!(matches!(
            store.get_role(&PrincipalId::new("x"), ADMIN_ROLE).await,
            Err(StoreError::Unavailable(_))
        ));
        // polls are unaffected by a role outage
        assert!(store.insert_poll(new_poll("alice")).await.is_ok());

        store.set_unavailable(true);
        assert!(matches!(store.list_polls().await, Err(StoreError::Unavailable(_))));
    }

    #[tokio::test]
    async fn test_snapshot_persistence() {
        let path = std::env::temp_dir().join(format!("pollgate-snapshot-{}.json", uuid::Uuid::new_v4()));

        let store = MemoryStore::load_snapshot(&path).await.unwrap();
        let poll = store.insert_poll(new_poll("alice")).await.unwrap();
        let bob = PrincipalId::new("bob");
        store
            .insert_vote(NewVote { poll_id: poll, voter: bob.clone(), option_index: 0 })
            .await
            .unwrap();
        store
            .append_audit_record(NewAuditRecord {
                actor: Some(bob.clone()),
                action: "vote_cast",
                resource_type: ResourceType::Vote,
                resource_id: Some(poll.to_string()),
                detail: String::new(),
                origin: None,
            })
            .await
            .unwrap();
        store.save_snapshot().await.unwrap();

        let loaded = MemoryStore::load_snapshot(&path).await.unwrap();
        assert_eq!(loaded.get_poll(poll).await.unwrap().question, "Best color?");
        // the unique index is rebuilt on load
        assert!(loaded.vote_exists(poll, &bob).await.unwrap());
        assert_eq!(loaded.list_audit_records(10).await.unwrap().len(), 1);

        std::fs::remove_file(&path).unwrap_or_default();
    }
}
