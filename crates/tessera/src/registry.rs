//! Spatial registry mapping coordinates to the entities that occupy them.
//!
//! The registry owns two pieces of shared state:
//!
//! - the placement map (`Coordinate -> Vec<Arc<E>>`, insertion ordered), guarded
//!   by a short-lived read/write lock that only protects the map structure;
//! - the [`CellLocks`] registry, which serialises *decisions* about a cell.
//!
//! # Movement Protocol
//!
//! Concurrent movers must go through [`SpatialRegistry::try_move`], which:
//!
//! 1. tries to acquire the destination cell lock with a bounded timeout;
//! 2. re-checks admission under the lock (occupancy may have changed since the
//!    mover decided to move);
//! 3. removes the entity from its old cell, updates its coordinate and adds it
//!    at the new cell;
//! 4. releases the cell lock on every path (the guard is dropped on return).
//!
//! Timing out is reported as [`MoveOutcome::Contended`], never as an error.
//!
//! # Invariants
//!
//! - An entity's stored coordinate always matches the key it is registered
//!   under. Moves are remove-then-add; keys are never mutated in place.
//! - Empty cells are pruned, so [`SpatialRegistry::occupied_coordinates`] and
//!   [`SpatialRegistry::is_occupied`] agree.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;

use crate::layout::Layout;
use crate::lock::CellLocks;
use crate::{Coordinate, GridBounds};

/// How an entity affects movement into the cell it occupies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Occupancy {
    /// Does not prevent entry (potions, treasure).
    Open,
    /// Prevents entry for everyone (walls).
    Blocking,
    /// Prevents entry for any other exclusive entity (combatants).
    Exclusive,
}

/// Contract for anything the registry can place.
///
/// Coordinates are read and written through `&self` because placed entities are
/// shared between threads; implementors keep the coordinate behind interior
/// mutability.
pub trait Placeable: Send + Sync {
    /// Identity used for removal and digests.
    type Id: Copy + Eq + Hash + Ord + fmt::Debug + Send + Sync;

    /// Returns the entity's identifier.
    fn id(&self) -> Self::Id;

    /// Returns the entity's current coordinate.
    fn coordinate(&self) -> Coordinate;

    /// Overwrites the entity's coordinate. Only the registry calls this while
    /// re-keying the entity.
    fn relocate(&self, to: Coordinate);

    /// How this entity affects movement into its cell.
    fn occupancy(&self) -> Occupancy;
}

/// Admission rule applied under the destination cell lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveRule {
    /// The destination must hold no entity at all.
    VacantOnly,
    /// The destination must pass [`SpatialRegistry::can_enter`].
    Passable,
}

/// Result of a protocol-mediated move or insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveOutcome {
    /// The entity now lives at `to`.
    Moved {
        /// Previous coordinate (equal to `to` for inserts)
        from: Coordinate,
        /// New coordinate
        to: Coordinate,
    },
    /// The destination cell lock could not be acquired in time.
    Contended,
    /// The destination was out of bounds or failed the admission rule.
    Refused,
}

impl MoveOutcome {
    /// Returns true if the entity was moved or inserted.
    #[must_use]
    pub const fn is_moved(&self) -> bool {
        matches!(self, Self::Moved { .. })
    }
}

/// Thread-safe placement map with per-cell locks.
pub struct SpatialRegistry<E: Placeable> {
    bounds: GridBounds,
    cells: RwLock<HashMap<Coordinate, Vec<Arc<E>>>>,
    locks: CellLocks,
}

impl<E: Placeable> SpatialRegistry<E> {
    /// Creates an empty registry covering `bounds`.
    #[must_use]
    pub fn new(bounds: GridBounds) -> Self {
        Self {
            bounds,
            cells: RwLock::new(HashMap::new()),
            locks: CellLocks::new(),
        }
    }

    /// The grid extent.
    #[must_use]
    pub fn bounds(&self) -> GridBounds {
        self.bounds
    }

    /// The per-cell lock registry.
    #[must_use]
    pub fn cell_locks(&self) -> &CellLocks {
        &self.locks
    }

    /// Registers `entity` at its current coordinate.
    ///
    /// Returns false, with no side effect, if the coordinate is outside the
    /// bounds or the entity is already registered there.
    pub fn place(&self, entity: &Arc<E>) -> bool {
        let at = entity.coordinate();
        if !self.bounds.contains(at) {
            return false;
        }
        let mut cells = self.cells.write();
        Self::insert_locked(&mut cells, at, entity)
    }

    /// Unregisters `entity` from its current coordinate.
    ///
    /// Returns false if it was not registered there.
    pub fn remove(&self, entity: &E) -> bool {
        let mut cells = self.cells.write();
        Self::remove_locked(&mut cells, entity.coordinate(), entity.id())
    }

    /// Entities at `at` in insertion order. The returned vector is a copy.
    #[must_use]
    pub fn entities_at(&self, at: Coordinate) -> Vec<Arc<E>> {
        self.cells.read().get(&at).cloned().unwrap_or_default()
    }

    /// Returns true if any entity occupies `at`.
    #[must_use]
    pub fn is_occupied(&self, at: Coordinate) -> bool {
        self.cells.read().get(&at).is_some_and(|list| !list.is_empty())
    }

    /// Every coordinate holding at least one entity.
    #[must_use]
    pub fn occupied_coordinates(&self) -> BTreeSet<Coordinate> {
        self.cells.read().keys().copied().collect()
    }

    /// Returns true if `mover` could legally step onto `at`.
    ///
    /// Blocked by out-of-bounds coordinates, by any blocking entity, and by any
    /// exclusive entity other than `mover` itself.
    #[must_use]
    pub fn can_enter(&self, at: Coordinate, mover: E::Id) -> bool {
        let cells = self.cells.read();
        self.admits(&cells, at, mover, MoveRule::Passable)
    }

    /// Total number of registrations across all cells.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cells.read().values().map(Vec::len).sum()
    }

    /// Returns true if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cells.read().is_empty()
    }

    /// Moves `entity` to `to` following the movement protocol.
    pub fn try_move(
        &self,
        entity: &Arc<E>,
        to: Coordinate,
        timeout: Duration,
        rule: MoveRule,
    ) -> MoveOutcome {
        if !self.bounds.contains(to) {
            return MoveOutcome::Refused;
        }
        let Some(_cell) = self.locks.try_acquire(to, timeout) else {
            return MoveOutcome::Contended;
        };

        let mut cells = self.cells.write();
        if !self.admits(&cells, to, entity.id(), rule) {
            return MoveOutcome::Refused;
        }
        let from = entity.coordinate();
        if !Self::remove_locked(&mut cells, from, entity.id()) {
            // Not registered; moving it would create a phantom placement.
            return MoveOutcome::Refused;
        }
        entity.relocate(to);
        Self::insert_locked(&mut cells, to, entity);
        MoveOutcome::Moved { from, to }
    }

    /// Registers `entity` at its coordinate under that cell's lock, admitting it
    /// only if the cell passes `rule`.
    pub fn try_insert(&self, entity: &Arc<E>, timeout: Duration, rule: MoveRule) -> MoveOutcome {
        let at = entity.coordinate();
        if !self.bounds.contains(at) {
            return MoveOutcome::Refused;
        }
        let Some(_cell) = self.locks.try_acquire(at, timeout) else {
            return MoveOutcome::Contended;
        };

        let mut cells = self.cells.write();
        if !self.admits(&cells, at, entity.id(), rule) || !Self::insert_locked(&mut cells, at, entity)
        {
            return MoveOutcome::Refused;
        }
        MoveOutcome::Moved { from: at, to: at }
    }

    /// Captures an independent copy of the placement map.
    #[must_use]
    pub fn capture(&self) -> Layout<E> {
        let cells = self.cells.read();
        Layout::from_cells(cells.iter().map(|(at, list)| (*at, list.clone())))
    }

    /// Replaces the whole placement map with `layout`.
    ///
    /// Each entity's coordinate is rewritten to the cell it is restored into.
    /// Returns the number of registrations restored.
    pub fn restore(&self, layout: &Layout<E>) -> usize {
        let mut cells = self.cells.write();
        cells.clear();
        let mut restored = 0;
        for (at, list) in layout.cells() {
            for entity in list {
                entity.relocate(*at);
                if Self::insert_locked(&mut cells, *at, entity) {
                    restored += 1;
                } else {
                    tracing::warn!(cell = %at, entity = ?entity.id(), "duplicate entry skipped during restore");
                }
            }
        }
        restored
    }

    /// Removes every registration. Cell locks are kept.
    pub fn clear(&self) {
        self.cells.write().clear();
    }

    fn admits(
        &self,
        cells: &HashMap<Coordinate, Vec<Arc<E>>>,
        at: Coordinate,
        mover: E::Id,
        rule: MoveRule,
    ) -> bool {
        if !self.bounds.contains(at) {
            return false;
        }
        let Some(list) = cells.get(&at) else {
            return true;
        };
        match rule {
            MoveRule::VacantOnly => list.is_empty(),
            MoveRule::Passable => list.iter().all(|other| match other.occupancy() {
                Occupancy::Open => true,
                Occupancy::Blocking => false,
                Occupancy::Exclusive => other.id() == mover,
            }),
        }
    }

    fn insert_locked(
        cells: &mut HashMap<Coordinate, Vec<Arc<E>>>,
        at: Coordinate,
        entity: &Arc<E>,
    ) -> bool {
        let list = cells.entry(at).or_default();
        if list.iter().any(|other| other.id() == entity.id()) {
            return false;
        }
        list.push(Arc::clone(entity));
        true
    }

    fn remove_locked(
        cells: &mut HashMap<Coordinate, Vec<Arc<E>>>,
        at: Coordinate,
        id: E::Id,
    ) -> bool {
        let Some(list) = cells.get_mut(&at) else {
            return false;
        };
        let Some(index) = list.iter().position(|other| other.id() == id) else {
            return false;
        };
        list.remove(index);
        if list.is_empty() {
            cells.remove(&at);
        }
        true
    }
}

impl<E: Placeable> fmt::Debug for SpatialRegistry<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpatialRegistry")
            .field("bounds", &self.bounds)
            .field("occupied", &self.cells.read().len())
            .field("locks", &self.locks)
            .finish()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Barrier;
    use std::thread;

    /// Minimal placeable used by the substrate tests.
    #[derive(Debug)]
    pub(crate) struct Token {
        id: u32,
        at: Mutex<Coordinate>,
        occupancy: Occupancy,
    }

    impl Token {
        pub(crate) fn new(id: u32, at: Coordinate, occupancy: Occupancy) -> Arc<Self> {
            Arc::new(Self {
                id,
                at: Mutex::new(at),
                occupancy,
            })
        }
    }

    impl Placeable for Token {
        type Id = u32;

        fn id(&self) -> u32 {
            self.id
        }

        fn coordinate(&self) -> Coordinate {
            *self.at.lock()
        }

        fn relocate(&self, to: Coordinate) {
            *self.at.lock() = to;
        }

        fn occupancy(&self) -> Occupancy {
            self.occupancy
        }
    }

    const TIMEOUT: Duration = Duration::from_millis(50);

    fn registry() -> SpatialRegistry<Token> {
        SpatialRegistry::new(GridBounds::new(10, 10))
    }

    mod placement_tests {
        use super::*;

        #[test]
        fn place_and_query() {
            let reg = registry();
            let t = Token::new(1, Coordinate::new(2, 2), Occupancy::Exclusive);

            assert!(reg.place(&t));
            assert!(reg.is_occupied(Coordinate::new(2, 2)));
            assert_eq!(reg.entities_at(Coordinate::new(2, 2)).len(), 1);
            assert_eq!(reg.len(), 1);
        }

        #[test]
        fn place_rejects_out_of_bounds() {
            let reg = registry();
            let t = Token::new(1, Coordinate::new(10, 0), Occupancy::Exclusive);
            assert!(!reg.place(&t));
            assert!(reg.is_empty());
        }

        #[test]
        fn place_rejects_duplicate_registration() {
            let reg = registry();
            let t = Token::new(1, Coordinate::new(0, 0), Occupancy::Open);
            assert!(reg.place(&t));
            assert!(!reg.place(&t));
            assert_eq!(reg.len(), 1);
        }

        #[test]
        fn cells_keep_insertion_order() {
            let reg = registry();
            let at = Coordinate::new(3, 3);
            let item = Token::new(1, at, Occupancy::Open);
            let enemy = Token::new(2, at, Occupancy::Exclusive);
            reg.place(&item);
            reg.place(&enemy);

            let ids: Vec<_> = reg.entities_at(at).iter().map(|e| e.id()).collect();
            assert_eq!(ids, vec![1, 2]);
        }

        #[test]
        fn remove_prunes_empty_cells() {
            let reg = registry();
            let t = Token::new(1, Coordinate::new(4, 4), Occupancy::Exclusive);
            reg.place(&t);

            assert!(reg.remove(&t));
            assert!(!reg.is_occupied(Coordinate::new(4, 4)));
            assert!(reg.occupied_coordinates().is_empty());
            assert!(!reg.remove(&t));
        }

        #[test]
        fn entities_at_returns_a_copy() {
            let reg = registry();
            let at = Coordinate::new(1, 1);
            reg.place(&Token::new(1, at, Occupancy::Open));

            let mut copy = reg.entities_at(at);
            copy.clear();
            assert_eq!(reg.entities_at(at).len(), 1);
        }

        #[test]
        fn can_enter_rules() {
            let reg = registry();
            let wall = Token::new(1, Coordinate::new(0, 1), Occupancy::Blocking);
            let potion = Token::new(2, Coordinate::new(0, 2), Occupancy::Open);
            let orc = Token::new(3, Coordinate::new(0, 3), Occupancy::Exclusive);
            reg.place(&wall);
            reg.place(&potion);
            reg.place(&orc);

            assert!(!reg.can_enter(Coordinate::new(0, 1), 99));
            assert!(reg.can_enter(Coordinate::new(0, 2), 99));
            assert!(!reg.can_enter(Coordinate::new(0, 3), 99));
            assert!(reg.can_enter(Coordinate::new(0, 3), 3));
            assert!(reg.can_enter(Coordinate::new(5, 5), 99));
            assert!(!reg.can_enter(Coordinate::new(-1, 5), 99));
        }
    }

    mod movement_tests {
        use super::*;

        #[test]
        fn move_rekeys_entity() {
            let reg = registry();
            let t = Token::new(1, Coordinate::new(0, 0), Occupancy::Exclusive);
            reg.place(&t);

            let outcome = reg.try_move(&t, Coordinate::new(0, 1), TIMEOUT, MoveRule::VacantOnly);
            assert_eq!(
                outcome,
                MoveOutcome::Moved {
                    from: Coordinate::new(0, 0),
                    to: Coordinate::new(0, 1)
                }
            );
            assert_eq!(t.coordinate(), Coordinate::new(0, 1));
            assert!(!reg.is_occupied(Coordinate::new(0, 0)));
            assert!(reg.is_occupied(Coordinate::new(0, 1)));
        }

        #[test]
        fn vacant_only_refuses_items() {
            let reg = registry();
            let t = Token::new(1, Coordinate::new(0, 0), Occupancy::Exclusive);
            let potion = Token::new(2, Coordinate::new(0, 1), Occupancy::Open);
            reg.place(&t);
            reg.place(&potion);

            let outcome = reg.try_move(&t, Coordinate::new(0, 1), TIMEOUT, MoveRule::VacantOnly);
            assert_eq!(outcome, MoveOutcome::Refused);
            assert_eq!(t.coordinate(), Coordinate::new(0, 0));

            let outcome = reg.try_move(&t, Coordinate::new(0, 1), TIMEOUT, MoveRule::Passable);
            assert!(outcome.is_moved());
        }

        #[test]
        fn move_out_of_bounds_is_refused() {
            let reg = registry();
            let t = Token::new(1, Coordinate::new(0, 0), Occupancy::Exclusive);
            reg.place(&t);
            let outcome = reg.try_move(&t, Coordinate::new(-1, 0), TIMEOUT, MoveRule::Passable);
            assert_eq!(outcome, MoveOutcome::Refused);
        }

        #[test]
        fn unregistered_entity_cannot_move() {
            let reg = registry();
            let ghost = Token::new(1, Coordinate::new(0, 0), Occupancy::Exclusive);
            let outcome = reg.try_move(&ghost, Coordinate::new(0, 1), TIMEOUT, MoveRule::Passable);
            assert_eq!(outcome, MoveOutcome::Refused);
            assert!(reg.is_empty());
        }

        #[test]
        fn held_cell_lock_reports_contention() {
            let reg = registry();
            let t = Token::new(1, Coordinate::new(0, 0), Occupancy::Exclusive);
            reg.place(&t);

            let _held = reg
                .cell_locks()
                .try_acquire(Coordinate::new(0, 1), TIMEOUT)
                .unwrap();
            let outcome = reg.try_move(
                &t,
                Coordinate::new(0, 1),
                Duration::from_millis(5),
                MoveRule::VacantOnly,
            );
            assert_eq!(outcome, MoveOutcome::Contended);
            assert_eq!(t.coordinate(), Coordinate::new(0, 0));
        }

        #[test]
        fn lock_is_released_on_refusal() {
            let reg = registry();
            let t = Token::new(1, Coordinate::new(0, 0), Occupancy::Exclusive);
            let wall = Token::new(2, Coordinate::new(0, 1), Occupancy::Blocking);
            reg.place(&t);
            reg.place(&wall);

            let _ = reg.try_move(&t, Coordinate::new(0, 1), TIMEOUT, MoveRule::Passable);
            assert!(!reg.cell_locks().is_locked(Coordinate::new(0, 1)));
        }

        #[test]
        fn try_insert_respects_rule() {
            let reg = registry();
            let first = Token::new(1, Coordinate::new(2, 2), Occupancy::Exclusive);
            let second = Token::new(2, Coordinate::new(2, 2), Occupancy::Exclusive);

            assert!(reg.try_insert(&first, TIMEOUT, MoveRule::VacantOnly).is_moved());
            assert_eq!(
                reg.try_insert(&second, TIMEOUT, MoveRule::VacantOnly),
                MoveOutcome::Refused
            );
            assert_eq!(reg.len(), 1);
        }

        #[test]
        fn racing_movers_into_one_cell_admit_exactly_one() {
            let reg = Arc::new(registry());
            let target = Coordinate::new(5, 5);
            let movers: Vec<_> = target
                .neighbors()
                .iter()
                .enumerate()
                .map(|(i, at)| {
                    let t = Token::new(u32::try_from(i).unwrap(), *at, Occupancy::Exclusive);
                    reg.place(&t);
                    t
                })
                .collect();

            let barrier = Arc::new(Barrier::new(movers.len()));
            let successes = Arc::new(AtomicUsize::new(0));
            let handles: Vec<_> = movers
                .into_iter()
                .map(|t| {
                    let reg = Arc::clone(&reg);
                    let barrier = Arc::clone(&barrier);
                    let successes = Arc::clone(&successes);
                    thread::spawn(move || {
                        barrier.wait();
                        if reg
                            .try_move(&t, target, TIMEOUT, MoveRule::VacantOnly)
                            .is_moved()
                        {
                            successes.fetch_add(1, Ordering::SeqCst);
                        }
                    })
                })
                .collect();
            for handle in handles {
                handle.join().unwrap();
            }

            assert_eq!(successes.load(Ordering::SeqCst), 1);
            assert_eq!(reg.entities_at(target).len(), 1);
            assert_eq!(reg.len(), 4);
        }
    }

    mod capture_tests {
        use super::*;

        #[test]
        fn restore_returns_to_captured_mapping() {
            let reg = registry();
            let a = Token::new(1, Coordinate::new(0, 0), Occupancy::Exclusive);
            let b = Token::new(2, Coordinate::new(1, 1), Occupancy::Open);
            reg.place(&a);
            reg.place(&b);
            let layout = reg.capture();

            reg.try_move(&a, Coordinate::new(0, 1), TIMEOUT, MoveRule::VacantOnly);
            reg.remove(&b);
            assert_eq!(reg.restore(&layout), 2);

            assert_eq!(a.coordinate(), Coordinate::new(0, 0));
            assert_eq!(reg.entities_at(Coordinate::new(1, 1))[0].id(), 2);
            assert!(!reg.is_occupied(Coordinate::new(0, 1)));
            assert_eq!(reg.capture(), layout);
        }

        #[test]
        fn capture_is_independent_of_live_map() {
            let reg = registry();
            let a = Token::new(1, Coordinate::new(0, 0), Occupancy::Exclusive);
            reg.place(&a);
            let layout = reg.capture();

            reg.clear();
            assert_eq!(layout.len(), 1);
            assert!(reg.is_empty());
        }
    }
}
