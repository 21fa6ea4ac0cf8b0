//! Per-cell fair locks keyed by coordinate value.
//!
//! Locks live in a concurrent map from [`Coordinate`] to a shared
//! [`FairMutex`]. The first access to a coordinate creates its lock; after that
//! every equal-valued coordinate resolves to the same lock for the lifetime of
//! the registry.
//!
//! Acquisition is bounded: [`CellLocks::try_acquire`] waits at most `timeout`
//! and returns `None` on contention. Unlocking is fair (the lock is handed to
//! the longest waiter), so an agent cannot be starved by repeated re-locking
//! from a neighbour.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use parking_lot::lock_api::ArcMutexGuard;
use parking_lot::{FairMutex, RawFairMutex};

use crate::Coordinate;

/// Registry of lazily created cell locks.
#[derive(Default)]
pub struct CellLocks {
    locks: DashMap<Coordinate, Arc<FairMutex<()>>>,
}

impl CellLocks {
    /// Creates an empty lock registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            locks: DashMap::new(),
        }
    }

    /// Tries to acquire the lock for `at`, waiting at most `timeout`.
    ///
    /// Returns a guard that releases the lock when dropped, or `None` if the
    /// lock could not be acquired in time. A zero timeout makes a single
    /// non-blocking attempt.
    #[must_use]
    pub fn try_acquire(&self, at: Coordinate, timeout: Duration) -> Option<CellGuard> {
        // Clone the handle out so the map shard is not held while waiting.
        let lock = self.lock_for(at);
        let guard = if timeout.is_zero() {
            lock.try_lock_arc()
        } else {
            lock.try_lock_arc_for(timeout)
        }?;
        Some(CellGuard {
            coordinate: at,
            _guard: guard,
        })
    }

    /// Returns true if the lock for `at` is currently held.
    #[must_use]
    pub fn is_locked(&self, at: Coordinate) -> bool {
        self.locks
            .get(&at)
            .is_some_and(|entry| entry.value().is_locked())
    }

    /// Number of coordinates that have had a lock created.
    #[must_use]
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    /// Returns true if no lock has been created yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }

    fn lock_for(&self, at: Coordinate) -> Arc<FairMutex<()>> {
        Arc::clone(
            self.locks
                .entry(at)
                .or_insert_with(|| Arc::new(FairMutex::new(())))
                .value(),
        )
    }
}

impl fmt::Debug for CellLocks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CellLocks")
            .field("locks", &self.locks.len())
            .finish()
    }
}

/// Held cell lock. Dropping the guard releases the cell.
pub struct CellGuard {
    coordinate: Coordinate,
    _guard: ArcMutexGuard<RawFairMutex, ()>,
}

impl CellGuard {
    /// The coordinate this guard protects.
    #[must_use]
    pub fn coordinate(&self) -> Coordinate {
        self.coordinate
    }
}

impl fmt::Debug for CellGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CellGuard{}", self.coordinate)
    }
}
