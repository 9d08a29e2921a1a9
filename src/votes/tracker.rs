//! Per-principal vote ceiling over a trailing window.

use dashmap::DashMap;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::config::VoteConfig;
use crate::domain::PrincipalId;

type History = Arc<Mutex<VecDeque<Instant>>>;

/// Keeps the instants of each principal's recent votes.
///
/// This is a true sliding window: a vote counts against the ceiling for
/// exactly `window` after it was cast. A principal's submissions are
/// serialized through [`VoteRateTracker::acquire`], so the ceiling check, the
/// insert and the record form one step per principal.
pub struct VoteRateTracker {
    recent: DashMap<PrincipalId, History>,
    max_votes: usize,
    window: Duration,
}

/// Exclusive access to one principal's vote history.
pub struct VoteSlot {
    times: OwnedMutexGuard<VecDeque<Instant>>,
    max_votes: usize,
    window: Duration,
}

impl VoteSlot {
    /// `Err(retry_after)` when the principal is at the ceiling.
    pub fn check_at(&mut self, now: Instant) -> Result<(), Duration> {
        prune(&mut self.times, self.window, now);
        if self.times.len() < self.max_votes {
            return Ok(());
        }
        let oldest = self.times.front().copied().unwrap_or(now);
        Err((oldest + self.window).saturating_duration_since(now))
    }

    pub fn record_at(&mut self, now: Instant) {
        prune(&mut self.times, self.window, now);
        self.times.push_back(now);
    }
}

impl VoteRateTracker {
    pub fn new(max_votes: usize, window: Duration) -> Self {
        Self {
            recent: DashMap::new(),
            max_votes,
            window,
        }
    }

    pub fn from_config(config: &VoteConfig) -> Self {
        Self::new(config.max_votes_per_window, Duration::from_millis(config.window_ms))
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Wait for exclusive access to `principal`'s history.
    pub async fn acquire(&self, principal: &PrincipalId) -> VoteSlot {
        // clone out of the shard before awaiting
        let history = self.recent.entry(principal.clone()).or_default().value().clone();
        VoteSlot {
            times: history.lock_owned().await,
            max_votes: self.max_votes,
            window: self.window,
        }
    }

    /// Drop principals with no votes inside the window. Histories that are
    /// held or about to be held are kept.
    pub fn purge_at(&self, now: Instant) -> usize {
        let before = self.recent.len();
        self.recent.retain(|_, history| {
            if Arc::strong_count(history) > 1 {
                return true;
            }
            match history.try_lock() {
                Ok(mut times) => {
                    prune(&mut times, self.window, now);
                    !times.is_empty()
                }
                Err(_) => true,
            }
        });
        before.saturating_sub(self.recent.len())
    }
}

fn prune(times: &mut VecDeque<Instant>, window: Duration, now: Instant) {
    while let Some(front) = times.front() {
        if now.saturating_duration_since(*front) >= window {
            times.pop_front();
        } else {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_ceiling_and_expiry() {
        let tracker = VoteRateTracker::new(5, Duration::from_secs(60));
        let alice = PrincipalId::new("alice");
        let t0 = Instant::now();

        for i in 0..5 {
            let now = t0 + Duration::from_secs(i);
            let mut slot = tracker.acquire(&alice).await;
            assert!(slot.check_at(now).is_ok());
            slot.record_at(now);
        }

        let mut slot = tracker.acquire(&alice).await;
        let retry = slot.check_at(t0 + Duration::from_secs(10)).unwrap_err();
        assert_eq!(retry, Duration::from_secs(50));

        // the first vote leaves the window at t0 + 60s
        assert!(slot.check_at(t0 + Duration::from_secs(60)).is_ok());
        drop(slot);

        // other principals are unaffected
        let mut bob = tracker.acquire(&PrincipalId::new("bob")).await;
        assert!(bob.check_at(t0).is_ok());
    }

    #[tokio::test]
    async fn test_purge() {
        let tracker = VoteRateTracker::new(5, Duration::from_secs(60));
        let t0 = Instant::now();
        tracker.acquire(&PrincipalId::new("alice")).await.record_at(t0);
        tracker
            .acquire(&PrincipalId::new("bob"))
            .await
            .record_at(t0 + Duration::from_secs(30));

        assert_eq!(tracker.purge_at(t0 + Duration::from_secs(61)), 1);
        assert_eq!(tracker.purge_at(t0 + Duration::from_secs(91)), 1);
    }

    #[tokio::test]
    async fn test_held_history_survives_purge() {
        let tracker = VoteRateTracker::new(5, Duration::from_secs(60));
        let alice = PrincipalId::new("alice");
        let slot = tracker.acquire(&alice).await;

        assert_eq!(tracker.purge_at(Instant::now()), 0);
        drop(slot);
        assert_eq!(tracker.purge_at(Instant::now()), 1);
    }

    #[tokio::test]
    async fn test_acquire_is_exclusive_per_principal() {
        let tracker = VoteRateTracker::new(5, Duration::from_secs(60));
        let alice = PrincipalId::new("alice");
        let _held = tracker.acquire(&alice).await;

        let blocked = tokio::time::timeout(Duration::from_millis(20), tracker.acquire(&alice)).await;
        assert!(blocked.is_err());
        // a different principal is not blocked
        let _bob = tracker.acquire(&PrincipalId::new("bob")).await;
    }
}
