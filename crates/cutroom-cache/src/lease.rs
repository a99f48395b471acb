//! Reference counts for artifacts and session directories that are in use.
//!
//! Eviction and the background sweep skip anything with a live [`Lease`].
//! The sweep additionally reserves a session directory before deleting it;
//! while a [`SweepReservation`] is held, new session leases wait.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::Notify;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum LeaseKey {
    Entry(String),
    Session(String),
}

#[derive(Debug, Default)]
struct LeaseState {
    counts: HashMap<LeaseKey, usize>,
    /// Session directories the sweep is deleting right now.
    sweeping: HashSet<String>,
}

#[derive(Debug, Default)]
struct Shared {
    state: Mutex<LeaseState>,
    reservation_released: Notify,
}

impl Shared {
    fn state(&self) -> MutexGuard<'_, LeaseState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[derive(Debug, Clone, Default)]
pub struct LeaseTracker {
    shared: Arc<Shared>,
}

/// Released on drop.
#[derive(Debug)]
pub struct Lease {
    shared: Arc<Shared>,
    key: LeaseKey,
}

/// Exclusive claim on an unleased session directory, held while the sweep
/// deletes it. Released on drop.
#[derive(Debug)]
pub struct SweepReservation {
    shared: Arc<Shared>,
    scope: String,
}

impl LeaseTracker {
    pub fn new() -> Self {
        Self::default()
    }

    fn acquire(&self, state: &mut LeaseState, key: LeaseKey) -> Lease {
        *state.counts.entry(key.clone()).or_insert(0) += 1;
        Lease {
            shared: self.shared.clone(),
            key,
        }
    }

    fn is_held(&self, key: &LeaseKey) -> bool {
        self.shared.state().counts.get(key).copied().unwrap_or(0) > 0
    }

    pub fn lease_entry(&self, cache_key: &str) -> Lease {
        let mut state = self.shared.state();
        self.acquire(&mut state, LeaseKey::Entry(cache_key.to_string()))
    }

    /// Lease a session directory, waiting out a sweep that is deleting it.
    pub async fn lease_session(&self, scope: &str) -> Lease {
        loop {
            // Registered before the check so a release in between is not missed.
            let released = self.shared.reservation_released.notified();
            if let Some(lease) = self.try_lease_session(scope) {
                return lease;
            }
            tracing::debug!(session_id = scope, "Waiting for sweep of session directory");
            released.await;
        }
    }

    /// `None` while the sweep holds a reservation on `scope`.
    pub fn try_lease_session(&self, scope: &str) -> Option<Lease> {
        let mut state = self.shared.state();
        if state.sweeping.contains(scope) {
            return None;
        }
        Some(self.acquire(&mut state, LeaseKey::Session(scope.to_string())))
    }

    /// Reserve `scope` for deletion. Fails when the session is leased or
    /// already reserved; the check and the claim happen under one lock.
    pub fn try_reserve_session(&self, scope: &str) -> Option<SweepReservation> {
        let mut state = self.shared.state();
        let leased = state
            .counts
            .get(&LeaseKey::Session(scope.to_string()))
            .copied()
            .unwrap_or(0)
            > 0;
        if leased || !state.sweeping.insert(scope.to_string()) {
            return None;
        }
        Some(SweepReservation {
            shared: self.shared.clone(),
            scope: scope.to_string(),
        })
    }

    pub fn is_entry_leased(&self, cache_key: &str) -> bool {
        self.is_held(&LeaseKey::Entry(cache_key.to_string()))
    }

    pub fn is_session_leased(&self, scope: &str) -> bool {
        self.is_held(&LeaseKey::Session(scope.to_string()))
    }
}

impl Drop for Lease {
    fn drop(&mut self) {
        let mut state = self.shared.state();
        if let Some(count) = state.counts.get_mut(&self.key) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                state.counts.remove(&self.key);
            }
        }
    }
}

impl Drop for SweepReservation {
    fn drop(&mut self) {
        self.shared.state().sweeping.remove(&self.scope);
        self.shared.reservation_released.notify_waiters();
    }
}
