//! Session token registry.

use dashmap::DashMap;
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

use super::{Credentials, IdentityResolver};
use crate::config::schema::IdentityConfig;
use crate::domain::{Principal, PrincipalId};

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// A live session.
#[derive(Debug, Clone)]
pub struct Session {
    pub principal_id: PrincipalId,
    /// Expiry timestamp (seconds since epoch). `None` for configured tokens,
    /// which live as long as the process.
    pub expires_at: Option<u64>,
}

impl Session {
    pub fn is_active(&self) -> bool {
        self.expires_at.map_or(true, |at| at > now_secs())
    }
}

/// A thread-safe map of bearer token → session.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: DashMap<String, Session>,
    ttl_secs: u64,
}

impl SessionRegistry {
    pub fn new(ttl_secs: u64) -> Self {
        Self {
            sessions: DashMap::new(),
            ttl_secs,
        }
    }

    /// Registry pre-populated with the configured session seeds.
    pub fn from_config(config: &IdentityConfig) -> Self {
        let registry = Self::new(config.session_ttl_secs);
        for seed in &config.sessions {
            registry.seed(seed.token.clone(), PrincipalId::new(seed.principal_id.clone()));
        }
        tracing::info!(sessions = registry.len(), "Session registry initialized");
        registry
    }

    /// Register a token for a principal that expires after the TTL.
    pub fn insert(&self, token: String, principal_id: PrincipalId) {
        let expires_at = Some(now_secs().saturating_add(self.ttl_secs));
        self.sessions.insert(token, Session { principal_id, expires_at });
    }

    /// Register a token that never expires; it can only be revoked.
    pub fn seed(&self, token: String, principal_id: PrincipalId) {
        self.sessions.insert(token, Session { principal_id, expires_at: None });
    }

    /// Create a fresh random token for a principal.
    pub fn issue(&self, principal_id: PrincipalId) -> String {
        let token = Uuid::new_v4().simple().to_string();
        self.insert(token.clone(), principal_id);
        token
    }

    /// Set an explicit expiry; used to end sessions early.
    pub fn expire_at(&self, token: &str, expires_at: u64) {
        if let Some(mut session) = self.sessions.get_mut(token) {
            session.expires_at = Some(expires_at);
        }
    }

    pub fn revoke(&self, token: &str) -> bool {
        self.sessions.remove(token).is_some()
    }

    /// Remove expired sessions.
    pub fn purge_expired(&self) -> usize {
        let before = self.sessions.len();
        self.sessions.retain(|_, s| s.is_active());
        before.saturating_sub(self.sessions.len())
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

impl IdentityResolver for SessionRegistry {
    fn resolve(&self, credentials: &Credentials) -> Principal {
        let Some(token) = credentials.bearer_token.as_deref() else {
            return Principal::Anonymous;
        };
        match self.sessions.get(token) {
            Some(session) if session.is_active() => {
                Principal::Authenticated(session.principal_id.clone())
            }
            Some(_) => {
                tracing::debug!("Expired session token presented");
                Principal::Anonymous
            }
            None => Principal::Anonymous,
        }
    }
}
