//! Role store accessor.
//!
//! The single place role assignments are read. Lookups fail closed: any
//! storage error or timeout answers `false`.

use std::sync::Arc;

use crate::domain::{now_millis, PrincipalId, RoleAssignment};
use crate::observability::metrics;
use crate::store::{Storage, StoreResult};

#[derive(Clone)]
pub struct RoleStore {
    store: Arc<dyn Storage>,
}

impl RoleStore {
    pub fn new(store: Arc<dyn Storage>) -> Self {
        Self { store }
    }

    /// Whether `principal` currently holds `role`. Never cached.
    pub async fn has_role(&self, principal: &PrincipalId, role: &str) -> bool {
        match self.store.get_role(principal, role).await {
            Ok(held) => held,
            Err(e) => {
                tracing::error!(principal = %principal, role, error = %e, "Role lookup failed, denying");
                metrics::record_role_lookup_failure();
                false
            }
        }
    }

    /// Record an assignment. `Ok(false)` if it already existed.
    pub async fn grant(&self, principal: PrincipalId, role: &str, granted_by: PrincipalId) -> StoreResult<bool> {
        self.store
            .insert_role(RoleAssignment {
                principal_id: principal,
                role: role.to_string(),
                granted_by,
                granted_at: now_millis(),
            })
            .await
    }

    /// Remove an assignment. `Ok(false)` if there was none.
    pub async fn revoke(&self, principal: &PrincipalId, role: &str) -> StoreResult<bool> {
        self.store.delete_role(principal, role).await
    }
}
