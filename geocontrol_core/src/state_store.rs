// geocontrol_core/src/state_store.rs

//! The shared holder of the latest current and desired state.
//!
//! Each snapshot lives behind its own lock, so the two feeds never contend with
//! each other and the control tick never observes a half-written snapshot.
//! Messages are validated before any lock is taken; a rejected message leaves
//! the last good snapshot in place.

use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use crate::errors::MessageError;
use crate::messages::{Odometry, TrajectoryPoint};
use crate::types::{CurrentState, DesiredState};

/// A snapshot together with its arrival bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Stamped<T> {
    pub value: T,
    /// When the store accepted this value.
    pub received_at: Instant,
    /// Number of accepted updates on this feed, starting at 1.
    pub sequence: u64,
}

impl<T> Stamped<T> {
    pub fn age(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.received_at)
    }
}

/// What a control tick gets to work with: both snapshots, copied out.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StateSnapshot {
    pub current: Option<Stamped<CurrentState>>,
    pub desired: Option<Stamped<DesiredState>>,
}

impl StateSnapshot {
    /// Both states, once each feed has delivered at least one valid message.
    pub fn ready(&self) -> Option<(&CurrentState, &DesiredState)> {
        match (&self.current, &self.desired) {
            (Some(current), Some(desired)) => Some((&current.value, &desired.value)),
            _ => None,
        }
    }
}

/// Liveness of one feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedHealth {
    /// No valid message has arrived yet.
    Waiting,
    Fresh,
    /// The last valid message is older than the staleness threshold.
    Stale { age: Duration },
}

impl FeedHealth {
    pub fn is_stale(&self) -> bool {
        matches!(self, FeedHealth::Stale { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreHealth {
    pub current: FeedHealth,
    pub desired: FeedHealth,
}

#[derive(Debug, Default)]
pub struct StateStore {
    current: Mutex<Option<Stamped<CurrentState>>>,
    desired: Mutex<Option<Stamped<DesiredState>>>,
}

impl StateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates an odometry message and, if it is usable, replaces the current state.
    pub fn update_current(&self, msg: &Odometry) -> Result<u64, MessageError> {
        let state = CurrentState::try_from(msg)?;
        Ok(self.set_current(state))
    }

    /// Validates a trajectory point and, if it is usable, replaces the desired state.
    pub fn update_desired(&self, msg: &TrajectoryPoint) -> Result<u64, MessageError> {
        let state = DesiredState::try_from(msg)?;
        Ok(self.set_desired(state))
    }

    /// Replaces the current state with an already converted value.
    pub fn set_current(&self, state: CurrentState) -> u64 {
        replace(&self.current, state)
    }

    /// Replaces the desired state with an already converted value.
    pub fn set_desired(&self, state: DesiredState) -> u64 {
        replace(&self.desired, state)
    }

    /// Copies out both snapshots. The locks are held only for the copy.
    pub fn snapshot(&self) -> StateSnapshot {
        StateSnapshot {
            current: *lock(&self.current),
            desired: *lock(&self.desired),
        }
    }

    pub fn health(&self, now: Instant, stale_after: Duration) -> StoreHealth {
        let snapshot = self.snapshot();
        StoreHealth {
            current: classify(snapshot.current.as_ref(), now, stale_after),
            desired: classify(snapshot.desired.as_ref(), now, stale_after),
        }
    }
}

fn replace<T>(slot: &Mutex<Option<Stamped<T>>>, value: T) -> u64 {
    let mut guard = lock(slot);
    let sequence = guard.as_ref().map_or(1, |prev| prev.sequence + 1);
    *guard = Some(Stamped {
        value,
        received_at: Instant::now(),
        sequence,
    });
    sequence
}

// A writer that panicked can only have left the previous or the new complete
// value behind, so a poisoned lock is still safe to read.
fn lock<T>(slot: &Mutex<T>) -> MutexGuard<'_, T> {
    slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn classify<T>(stamped: Option<&Stamped<T>>, now: Instant, stale_after: Duration) -> FeedHealth {
    match stamped {
        None => FeedHealth::Waiting,
        Some(s) => {
            let age = s.age(now);
            if age > stale_after {
                FeedHealth::Stale { age }
            } else {
                FeedHealth::Fresh
            }
        }
    }
}
