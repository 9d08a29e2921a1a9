//! Authorization decisions.
//!
//! # Policy
//! ```text
//! create poll      authenticated
//! edit/delete poll owner, else admin      (ownership first, no lookup when owner)
//! view admin data  admin                  (re-checked on every call)
//! grant role       admin, target != self
//! revoke role      admin, not own admin role
//! ```
//! Anything not explicitly allowed is denied. Every deny is audited as
//! `authorization_denied`.

use std::fmt;

use super::roles::RoleStore;
use crate::audit::AuditRecorder;
use crate::domain::{actions, Caller, Poll, PrincipalId, ResourceType, ADMIN_ROLE};
use crate::error::{CoreError, CoreResult};
use crate::observability::metrics;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DenyReason {
    Anonymous,
    NotOwner,
    MissingRole(&'static str),
    SelfEscalation,
    SelfRevocation,
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DenyReason::Anonymous => f.write_str("principal is anonymous"),
            DenyReason::NotOwner => f.write_str("not the owner and not an admin"),
            DenyReason::MissingRole(role) => write!(f, "missing role {}", role),
            DenyReason::SelfEscalation => f.write_str("cannot grant a role to oneself"),
            DenyReason::SelfRevocation => f.write_str("cannot revoke own admin role"),
        }
    }
}

/// Result of a policy check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny { reason: DenyReason },
}

impl Decision {
    fn deny(reason: DenyReason) -> Self {
        Decision::Deny { reason }
    }

    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow)
    }

    /// Convert to a caller-facing result; the reason stays internal.
    pub fn into_result(self) -> CoreResult<()> {
        match self {
            Decision::Allow => Ok(()),
            Decision::Deny { reason: DenyReason::Anonymous } => Err(CoreError::Unauthenticated),
            Decision::Deny { reason } => Err(CoreError::NotPermitted { reason: reason.to_string() }),
        }
    }
}

/// Operation being authorized, for logs, metrics and audit detail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    CreatePoll,
    EditPoll,
    DeletePoll,
    ViewAdminData,
    GrantRole,
    RevokeRole,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::CreatePoll => "create_poll",
            Operation::EditPoll => "edit_poll",
            Operation::DeletePoll => "delete_poll",
            Operation::ViewAdminData => "view_admin_data",
            Operation::GrantRole => "grant_role",
            Operation::RevokeRole => "revoke_role",
        }
    }
}

#[derive(Clone)]
pub struct AuthorizationEngine {
    roles: RoleStore,
    audit: AuditRecorder,
}

impl AuthorizationEngine {
    pub fn new(roles: RoleStore, audit: AuditRecorder) -> Self {
        Self { roles, audit }
    }

    pub fn roles(&self) -> &RoleStore {
        &self.roles
    }

    pub async fn can_create_poll(&self, caller: &Caller) -> Decision {
        let decision = match caller.principal.id() {
            Some(_) => Decision::Allow,
            None => Decision::deny(DenyReason::Anonymous),
        };
        self.finish(caller, Operation::CreatePoll, ResourceType::Poll, None, decision).await
    }

    pub async fn can_edit_poll(&self, caller: &Caller, poll: &Poll) -> Decision {
        let decision = self.owner_or_admin(caller, poll).await;
        self.finish(caller, Operation::EditPoll, ResourceType::Poll, Some(poll.id.to_string()), decision)
            .await
    }

    pub async fn can_delete_poll(&self, caller: &Caller, poll: &Poll) -> Decision {
        let decision = self.owner_or_admin(caller, poll).await;
        self.finish(caller, Operation::DeletePoll, ResourceType::Poll, Some(poll.id.to_string()), decision)
            .await
    }

    pub async fn can_view_admin_data(&self, caller: &Caller) -> Decision {
        let decision = self.require_admin(caller).await;
        self.finish(caller, Operation::ViewAdminData, ResourceType::AdminData, None, decision)
            .await
    }

    pub async fn can_grant_role(&self, caller: &Caller, target: &PrincipalId) -> Decision {
        let decision = match self.require_admin(caller).await {
            Decision::Allow if caller.principal.id() == Some(target) => {
                Decision::deny(DenyReason::SelfEscalation)
            }
            other => other,
        };
        self.finish(caller, Operation::GrantRole, ResourceType::Role, Some(target.to_string()), decision)
            .await
    }

    pub async fn can_revoke_role(&self, caller: &Caller, target: &PrincipalId, role: &str) -> Decision {
        let decision = match self.require_admin(caller).await {
            Decision::Allow if caller.principal.id() == Some(target) && role == ADMIN_ROLE => {
                Decision::deny(DenyReason::SelfRevocation)
            }
            other => other,
        };
        self.finish(caller, Operation::RevokeRole, ResourceType::Role, Some(target.to_string()), decision)
            .await
    }

    async fn owner_or_admin(&self, caller: &Caller, poll: &Poll) -> Decision {
        let Some(id) = caller.principal.id() else {
            return Decision::deny(DenyReason::Anonymous);
        };
        if *id == poll.owner {
            return Decision::Allow;
        }
        if self.roles.has_role(id, ADMIN_ROLE).await {
            Decision::Allow
        } else {
            Decision::deny(DenyReason::NotOwner)
        }
    }

    async fn require_admin(&self, caller: &Caller) -> Decision {
        let Some(id) = caller.principal.id() else {
            return Decision::deny(DenyReason::Anonymous);
        };
        if self.roles.has_role(id, ADMIN_ROLE).await {
            Decision::Allow
        } else {
            Decision::deny(DenyReason::MissingRole(ADMIN_ROLE))
        }
    }

    async fn finish(
        &self,
        caller: &Caller,
        operation: Operation,
        resource_type: ResourceType,
        resource_id: Option<String>,
        decision: Decision,
    ) -> Decision {
        metrics::record_authz_decision(operation.as_str(), decision.is_allowed());

        if let Decision::Deny { reason } = &decision {
            tracing::info!(
                principal = %caller.principal,
                operation = operation.as_str(),
                reason = %reason,
                "Authorization denied"
            );
            self.audit
                .record(
                    caller,
                    actions::AUTHORIZATION_DENIED,
                    resource_type,
                    resource_id,
                    format!("{}: {}", operation.as_str(), reason),
                )
                .await;
        }
        decision
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Principal, PollId};
    use crate::store::{MemoryStore, Storage};
    use std::sync::Arc;
    use std::time::Duration;

    fn setup() -> (Arc<MemoryStore>, AuthorizationEngine) {
        let store = Arc::new(MemoryStore::new());
        let engine = AuthorizationEngine::new(
            RoleStore::new(store.clone()),
            AuditRecorder::new(store.clone(), Duration::from_millis(100)),
        );
        (store, engine)
    }

    fn poll_owned_by(owner: &str) -> Poll {
        Poll {
            id: PollId::new(),
            owner: PrincipalId::new(owner),
            question: "Q?".into(),
            options: vec!["a".into(), "b".into()],
            created_at: 0,
            updated_at: 0,
        }
    }

    fn caller(id: &str) -> Caller {
        Caller::new(Principal::authenticated(id))
    }

    async fn make_admin(engine: &AuthorizationEngine, id: &str) {
        engine
            .roles()
            .grant(PrincipalId::new(id), ADMIN_ROLE, PrincipalId::new("root"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_create_requires_authentication() {
        let (_, engine) = setup();
        assert_eq!(engine.can_create_poll(&caller("alice")).await, Decision::Allow);
        assert_eq!(
            engine.can_create_poll(&Caller::anonymous()).await,
            Decision::Deny { reason: DenyReason::Anonymous }
        );
    }

    #[tokio::test]
    async fn test_owner_allowed_without_role_lookup() {
        let (store, engine) = setup();
        let poll = poll_owned_by("alice");

        assert!(engine.can_edit_poll(&caller("alice"), &poll).await.is_allowed());
        assert!(engine.can_delete_poll(&caller("alice"), &poll).await.is_allowed());
        assert_eq!(store.role_lookups(), 0);
    }

    #[tokio::test]
    async fn test_non_owner_denied_unless_admin() {
        let (store, engine) = setup();
        let poll = poll_owned_by("alice");

        for principal in ["bob", "carol", "mallory"] {
            assert_eq!(
                engine.can_edit_poll(&caller(principal), &poll).await,
                Decision::Deny { reason: DenyReason::NotOwner }
            );
            assert!(!engine.can_delete_poll(&caller(principal), &poll).await.is_allowed());
        }

        make_admin(&engine, "carol").await;
        assert!(engine.can_edit_poll(&caller("carol"), &poll).await.is_allowed());
        assert!(engine.can_delete_poll(&caller("carol"), &poll).await.is_allowed());
        assert!(!engine.can_delete_poll(&caller("bob"), &poll).await.is_allowed());

        let denials = store
            .list_audit_records(100)
            .await
            .unwrap()
            .into_iter()
            .filter(|r| r.action == actions::AUTHORIZATION_DENIED)
            .count();
        assert_eq!(denials, 7);
    }

    #[tokio::test]
    async fn test_admin_revocation_takes_effect_immediately() {
        let (_, engine) = setup();
        make_admin(&engine, "carol").await;
        assert!(engine.can_view_admin_data(&caller("carol")).await.is_allowed());

        engine.roles().revoke(&PrincipalId::new("carol"), ADMIN_ROLE).await.unwrap();
        assert_eq!(
            engine.can_view_admin_data(&caller("carol")).await,
            Decision::Deny { reason: DenyReason::MissingRole(ADMIN_ROLE) }
        );
    }

    #[tokio::test]
    async fn test_role_outage_denies_admin() {
        let (store, engine) = setup();
        make_admin(&engine, "carol").await;
        store.set_roles_unavailable(true);

        assert!(!engine.can_view_admin_data(&caller("carol")).await.is_allowed());
        assert!(!engine.can_delete_poll(&caller("carol"), &poll_owned_by("alice")).await.is_allowed());
        // ownership does not need the role store
        assert!(engine.can_delete_poll(&caller("alice"), &poll_owned_by("alice")).await.is_allowed());
    }

    #[tokio::test]
    async fn test_role_management_rules() {
        let (_, engine) = setup();
        make_admin(&engine, "carol").await;
        let carol = PrincipalId::new("carol");
        let bob = PrincipalId::new("bob");

        assert!(engine.can_grant_role(&caller("carol"), &bob).await.is_allowed());
        assert_eq!(
            engine.can_grant_role(&caller("carol"), &carol).await,
            Decision::Deny { reason: DenyReason::SelfEscalation }
        );
        assert_eq!(
            engine.can_grant_role(&caller("bob"), &bob).await,
            Decision::Deny { reason: DenyReason::MissingRole(ADMIN_ROLE) }
        );
        assert_eq!(
            engine.can_revoke_role(&caller("carol"), &carol, ADMIN_ROLE).await,
            Decision::Deny { reason: DenyReason::SelfRevocation }
        );
        assert!(engine.can_revoke_role(&caller("carol"), &bob, ADMIN_ROLE).await.is_allowed());
    }

    #[test]
    fn test_decision_into_result() {
        assert!(Decision::Allow.into_result().is_ok());
        assert!(matches!(
            Decision::deny(DenyReason::Anonymous).into_result(),
            Err(CoreError::Unauthenticated)
        ));
        assert!(matches!(
            Decision::deny(DenyReason::NotOwner).into_result(),
            Err(CoreError::NotPermitted { .. })
        ));
    }
}
