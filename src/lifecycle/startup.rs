//! Startup orchestration.
//!
//! # Responsibilities
//! - Open the store (snapshot restore) and wrap it with timeouts
//! - Apply bootstrap admins and seeded sessions
//! - Assemble application state
//! - Start background sweepers
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Bootstrap grants are made by the `system` actor, never by a request

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::AppConfig;
use crate::domain::{PrincipalId, ADMIN_ROLE};
use crate::http::AppState;
use crate::identity::SessionRegistry;
use crate::lifecycle::Shutdown;
use crate::security::RateLimiter;
use crate::service::PollService;
use crate::store::{MemoryStore, Storage, StoreResult, TimedStore};
use crate::votes::VoteRateTracker;

/// Actor recorded as `granted_by` for configured admins.
pub const SYSTEM_ACTOR: &str = "system";

/// Open the in-memory store, restoring the snapshot when configured.
pub async fn open_store(config: &AppConfig) -> StoreResult<Arc<MemoryStore>> {
    let store = match &config.storage.snapshot_path {
        Some(path) => MemoryStore::load_snapshot(Path::new(path)).await?,
        None => MemoryStore::new(),
    };
    Ok(Arc::new(store))
}

/// Grant `admin` to every configured bootstrap principal.
pub async fn apply_bootstrap_admins(store: &dyn Storage, config: &AppConfig) -> StoreResult<usize> {
    let mut granted = 0;
    for id in &config.roles.bootstrap_admins {
        let assignment = crate::domain::RoleAssignment {
            principal_id: PrincipalId::new(id.trim()),
            role: ADMIN_ROLE.to_string(),
            granted_by: PrincipalId::new(SYSTEM_ACTOR),
            granted_at: crate::domain::now_millis(),
        };
        if store.insert_role(assignment).await? {
            tracing::info!(principal = %id, "Bootstrap admin granted");
            granted += 1;
        }
    }
    Ok(granted)
}

/// Wire every subsystem around `store`.
pub fn build_state(config: AppConfig, store: Arc<dyn Storage>) -> AppState {
    let timed: Arc<dyn Storage> = Arc::new(TimedStore::new(
        store,
        Duration::from_millis(config.timeouts.store_ms),
    ));
    let service = Arc::new(PollService::new(timed, &config));
    let sessions = Arc::new(SessionRegistry::from_config(&config.identity));
    let rate_limiter = Arc::new(RateLimiter::from_config(&config.rate_limit));

    AppState {
        service,
        sessions,
        rate_limiter,
        config: Arc::new(config),
    }
}

/// Spawn periodic cleanup of the rate-limit table, vote tracker and sessions.
pub fn spawn_sweepers(state: &AppState, shutdown: &Shutdown) {
    tokio::spawn(state.rate_limiter.clone().run_sweeper(shutdown.subscribe()));

    let tracker: Arc<VoteRateTracker> = state.service.vote_tracker().clone();
    let sessions = state.sessions.clone();
    let mut rx = shutdown.subscribe();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(tracker.window());
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let principals = tracker.purge_at(Instant::now());
                    let expired = sessions.purge_expired();
                    tracing::debug!(principals, expired, "Vote tracker and session sweep");
                }
                _ = rx.recv() => break,
            }
        }
    });
}
