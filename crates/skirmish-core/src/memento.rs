//! Save and undo.
//!
//! A [`Snapshot`] is an owned copy of the registry's cell map plus every
//! combatant's vitals at capture time. Entity handles are shared with the live
//! world; the mapping and the recorded coordinates are not. The [`Caretaker`]
//! keeps a bounded LIFO history of snapshots and serialises save and undo.

use std::collections::{BTreeMap, VecDeque};

use parking_lot::Mutex;
use tessera::{layout_digest, Layout};

use crate::config::EngineConfig;
use crate::entity::{Entity, EntityId, Vitals};
use crate::world::World;

/// Default number of snapshots kept.
pub const DEFAULT_HISTORY: usize = 10;

/// Immutable capture of the world at one point in time.
#[derive(Debug, Clone)]
pub struct Snapshot {
    layout: Layout<Entity>,
    vitals: BTreeMap<EntityId, Vitals>,
    digest: u64,
}

impl Snapshot {
    /// Captures `layout` and the current vitals of every combatant in it.
    #[must_use]
    pub fn capture(layout: Layout<Entity>) -> Self {
        let vitals = layout
            .entries()
            .filter_map(|(_, entity)| Some((entity.id(), entity.as_combatant()?.vitals())))
            .collect();
        let digest = layout_digest(&layout);
        Self {
            layout,
            vitals,
            digest,
        }
    }

    /// The captured placement map.
    #[must_use]
    pub const fn layout(&self) -> &Layout<Entity> {
        &self.layout
    }

    /// Recorded vitals of a combatant.
    #[must_use]
    pub fn vitals(&self, id: EntityId) -> Option<Vitals> {
        self.vitals.get(&id).copied()
    }

    /// Digest of the placement map at capture time.
    #[must_use]
    pub const fn digest(&self) -> u64 {
        self.digest
    }

    /// Number of captured placements.
    #[must_use]
    pub fn len(&self) -> usize {
        self.layout.len()
    }

    /// Returns true if nothing was placed at capture time.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.layout.is_empty()
    }

    /// Writes the recorded vitals back into the captured combatants.
    pub(crate) fn restore_vitals(&self) {
        for (_, entity) in self.layout.entries() {
            if let (Some(stats), Some(vitals)) = (entity.as_combatant(), self.vitals.get(&entity.id())) {
                stats.restore_vitals(*vitals);
            }
        }
    }
}

/// Result of [`Caretaker::undo`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UndoOutcome {
    /// The newest snapshot was restored.
    Restored {
        /// Entities placed back
        entities: usize,
        /// Snapshots still in history
        remaining: usize,
    },
    /// History was empty; the world is unchanged.
    NothingToRestore,
}

/// Bounded save/undo history.
///
/// The history lock is held for the whole of a save or an undo, so at most one
/// of them is in flight.
///
/// # Example
///
/// ```
/// use skirmish_core::memento::{Caretaker, UndoOutcome};
/// use skirmish_core::world::World;
/// use tessera::GridBounds;
///
/// let world = World::new(GridBounds::new(3, 3));
/// let caretaker = Caretaker::new(2);
///
/// assert_eq!(caretaker.undo(&world), UndoOutcome::NothingToRestore);
/// caretaker.save(&world);
/// assert!(caretaker.has_history());
/// ```
#[derive(Debug)]
pub struct Caretaker {
    history: Mutex<VecDeque<Snapshot>>,
    capacity: usize,
}

impl Caretaker {
    /// A caretaker keeping at most `capacity` snapshots (at least one).
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            history: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    /// A caretaker bounded by `config.history_capacity`.
    #[must_use]
    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.history_capacity)
    }

    /// Captures `world` onto the history, evicting the oldest snapshot when
    /// full. Returns the snapshot's digest.
    pub fn save(&self, world: &World) -> u64 {
        let mut history = self.history.lock();
        let snapshot = world.snapshot();
        let digest = snapshot.digest();

        if history.len() == self.capacity {
            history.pop_front();
            tracing::debug!(capacity = self.capacity, "oldest snapshot evicted");
        }
        history.push_back(snapshot);
        tracing::info!(depth = history.len(), digest, "world saved");
        digest
    }

    /// Restores the newest snapshot and drops it from history.
    pub fn undo(&self, world: &World) -> UndoOutcome {
        let mut history = self.history.lock();
        let Some(snapshot) = history.pop_back() else {
            tracing::info!("nothing to restore");
            return UndoOutcome::NothingToRestore;
        };
        let entities = world.restore(&snapshot);
        UndoOutcome::Restored {
            entities,
            remaining: history.len(),
        }
    }

    /// Returns true if an undo would restore something.
    #[must_use]
    pub fn has_history(&self) -> bool {
        !self.history.lock().is_empty()
    }

    /// Snapshots currently held.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.history.lock().len()
    }

    /// Maximum snapshots held.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Drops all history.
    pub fn clear(&self) {
        self.history.lock().clear();
    }
}

impl Default for Caretaker {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY)
    }
}
