//! Domain types shared by every subsystem.
//!
//! # Data Flow
//! ```text
//! inbound credentials → Principal (per request, never persisted)
//! Poll ──< Vote            (votes cascade with their poll)
//! RoleAssignment           (principal_id, role) unique
//! AuditRecord              (append-only)
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// Name of the elevated role.
pub const ADMIN_ROLE: &str = "admin";

/// Milliseconds since the Unix epoch.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Stable identifier of an authenticated user.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PrincipalId(pub String);

impl PrincipalId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PrincipalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Who is asking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Principal {
    Anonymous,
    Authenticated(PrincipalId),
}

impl Principal {
    pub fn authenticated(id: impl Into<String>) -> Self {
        Principal::Authenticated(PrincipalId::new(id))
    }

    pub fn id(&self) -> Option<&PrincipalId> {
        match self {
            Principal::Anonymous => None,
            Principal::Authenticated(id) => Some(id),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, Principal::Authenticated(_))
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Principal::Anonymous => f.write_str("anonymous"),
            Principal::Authenticated(id) => write!(f, "{}", id),
        }
    }
}

/// The principal behind a request plus where it came from.
#[derive(Debug, Clone)]
pub struct Caller {
    pub principal: Principal,
    /// Client key of the request (network origin), recorded in audit records.
    pub origin: Option<String>,
}

impl Caller {
    pub fn new(principal: Principal) -> Self {
        Self { principal, origin: None }
    }

    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Some(origin.into());
        self
    }

    pub fn anonymous() -> Self {
        Self::new(Principal::Anonymous)
    }
}

macro_rules! uuid_id {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s).map(Self)
            }
        }
    };
}

uuid_id!(PollId);
uuid_id!(VoteId);
uuid_id!(AuditId);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Poll {
    pub id: PollId,
    pub owner: PrincipalId,
    pub question: String,
    pub options: Vec<String>,
    pub created_at: u64,
    pub updated_at: u64,
}

/// Fields of a poll about to be inserted. The store assigns id and timestamps.
#[derive(Debug, Clone)]
pub struct NewPoll {
    pub owner: PrincipalId,
    pub question: String,
    pub options: Vec<String>,
}

/// Replacement content for an existing poll.
#[derive(Debug, Clone)]
pub struct PollUpdate {
    pub question: String,
    pub options: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vote {
    pub id: VoteId,
    pub poll_id: PollId,
    /// Always set by this service; nullable in the data model for legacy rows.
    pub voter: Option<PrincipalId>,
    pub option_index: usize,
    pub created_at: u64,
}

#[derive(Debug, Clone)]
pub struct NewVote {
    pub poll_id: PollId,
    pub voter: PrincipalId,
    pub option_index: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleAssignment {
    pub principal_id: PrincipalId,
    pub role: String,
    pub granted_by: PrincipalId,
    pub granted_at: u64,
}

/// Kind of resource an audit record refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceType {
    Poll,
    Vote,
    Role,
    AdminData,
}

impl ResourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceType::Poll => "poll",
            ResourceType::Vote => "vote",
            ResourceType::Role => "role",
            ResourceType::AdminData => "admin_data",
        }
    }
}

/// Audit actions written by the service.
pub mod actions {
    pub const AUTHORIZATION_DENIED: &str = "authorization_denied";
    pub const POLL_CREATED: &str = "poll_created";
    pub const POLL_UPDATED: &str = "poll_updated";
    pub const POLL_DELETED: &str = "poll_deleted";
    pub const VOTE_CAST: &str = "vote_cast";
    pub const ROLE_GRANTED: &str = "role_granted";
    pub const ROLE_REVOKED: &str = "role_revoked";
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub id: AuditId,
    pub actor: Option<PrincipalId>,
    pub action: String,
    pub resource_type: ResourceType,
    pub resource_id: Option<String>,
    pub detail: String,
    pub origin: Option<String>,
    pub created_at: u64,
}

#[derive(Debug, Clone)]
pub struct NewAuditRecord {
    pub actor: Option<PrincipalId>,
    pub action: &'static str,
    pub resource_type: ResourceType,
    pub resource_id: Option<String>,
    pub detail: String,
    pub origin: Option<String>,
}
