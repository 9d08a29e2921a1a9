//! Append-only audit trail writer.

use std::sync::Arc;
use std::time::Duration;

use crate::domain::{Caller, NewAuditRecord, ResourceType};
use crate::observability::metrics;
use crate::store::Storage;

/// Writes audit records without ever failing the caller.
///
/// A write that errors or exceeds its deadline is reported on the operational
/// channel (error log + `pollgate_audit_failures_total`) and dropped.
#[derive(Clone)]
pub struct AuditRecorder {
    store: Arc<dyn Storage>,
    timeout: Duration,
}

impl AuditRecorder {
    pub fn new(store: Arc<dyn Storage>, timeout: Duration) -> Self {
        Self { store, timeout }
    }

    pub async fn record(
        &self,
        caller: &Caller,
        action: &'static str,
        resource_type: ResourceType,
        resource_id: Option<String>,
        detail: impl Into<String>,
    ) {
        let record = NewAuditRecord {
            actor: caller.principal.id().cloned(),
            action,
            resource_type,
            resource_id,
            detail: detail.into(),
            origin: caller.origin.clone(),
        };

        match tokio::time::timeout(self.timeout, self.store.append_audit_record(record)).await {
            Ok(Ok(())) => {
                tracing::debug!(action, resource = resource_type.as_str(), "Audit record appended");
            }
            Ok(Err(e)) => {
                tracing::error!(action, resource = resource_type.as_str(), error = %e, "Failed to append audit record");
                metrics::record_audit_failure();
            }
            Err(_) => {
                tracing::error!(
                    action,
                    resource = resource_type.as_str(),
                    timeout_ms = self.timeout.as_millis() as u64,
                    "Audit append timed out"
                );
                metrics::record_audit_failure();
            }
        }
    }
}
