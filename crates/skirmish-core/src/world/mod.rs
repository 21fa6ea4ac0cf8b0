//! World state: the players, enemies and items in play, plus the spatial
//! registry that places them.
//!
//! # Invariants
//!
//! - Every entity in a collection is registered at its coordinate, and every
//!   registered entity is in exactly one collection. Add/remove operations
//!   update both under the roster lock, or neither.
//! - Attacks against the player are serialised by a fair player lock
//!   ([`World::try_lock_player`]).
//!
//! # Lock order
//!
//! player lock → roster → cell lock → registry map. Movement takes only the
//! last two. Observers are notified after every lock has been released.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use skirmish_core::entity::{Entity, Item};
//! use skirmish_core::world::World;
//! use tessera::{Coordinate, GridBounds};
//!
//! let world = World::new(GridBounds::new(5, 5));
//! let wall = Arc::new(Entity::item(world.allocate_id(), Item::wall(), Coordinate::new(1, 1)));
//!
//! assert!(world.add_item(wall));
//! assert!(world.registry().is_occupied(Coordinate::new(1, 1)));
//! assert_eq!(world.to_string(), "World: 0 player(s), 0 enemies, 1 item(s)");
//! ```

mod actions;
mod populate;

pub use actions::{ActionError, Interaction, PlayerMove};
pub use populate::{MapPopulator, PopulationSummary};

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender};
use parking_lot::{FairMutex, FairMutexGuard, Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tessera::{Coordinate, GridBounds, MoveOutcome, MoveRule, SpatialRegistry};

use crate::entity::{Entity, EntityId, EntityKind};
use crate::memento::Snapshot;

/// Default bounded wait used by player-initiated actions.
pub const DEFAULT_ACTION_TIMEOUT: Duration = Duration::from_millis(50);

/// A change to the world, delivered to observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorldChange {
    /// An entity joined the world.
    Added {
        /// The entity
        id: EntityId,
        /// What it is
        kind: EntityKind,
        /// Where it was placed
        at: Coordinate,
    },
    /// An entity left the world.
    Removed {
        /// The entity
        id: EntityId,
        /// What it was
        kind: EntityKind,
        /// Its last coordinate
        at: Coordinate,
    },
    /// An entity moved between cells.
    Moved {
        /// The entity
        id: EntityId,
        /// Previous cell
        from: Coordinate,
        /// New cell
        to: Coordinate,
    },
    /// The player was defeated. Emitted once per player.
    PlayerDefeated {
        /// The player
        id: EntityId,
    },
    /// The world was restored from a snapshot.
    Restored {
        /// Number of entities placed by the restore
        entities: usize,
    },
}

/// Receives world change notifications.
///
/// Called synchronously on the mutating thread, in registration order, after
/// the world's locks are released. Implementations must return quickly or hand
/// the work off (see [`ChannelObserver`]).
pub trait WorldObserver: Send + Sync {
    /// Handles one change.
    fn on_world_changed(&self, change: &WorldChange);
}

/// Observer that forwards every change into a channel.
#[derive(Debug, Clone)]
pub struct ChannelObserver {
    sender: Sender<WorldChange>,
}

impl ChannelObserver {
    /// Creates an observer and the receiving end of its unbounded channel.
    #[must_use]
    pub fn channel() -> (Self, Receiver<WorldChange>) {
        let (sender, receiver) = crossbeam_channel::unbounded();
        (Self { sender }, receiver)
    }
}

impl WorldObserver for ChannelObserver {
    fn on_world_changed(&self, change: &WorldChange) {
        // A dropped receiver just means nobody is listening any more.
        let _ = self.sender.send(*change);
    }
}

#[derive(Debug, Default)]
struct Roster {
    players: Vec<Arc<Entity>>,
    enemies: BTreeMap<EntityId, Arc<Entity>>,
    items: BTreeMap<EntityId, Arc<Entity>>,
}

impl Roster {
    fn contains(&self, id: EntityId) -> bool {
        self.enemies.contains_key(&id)
            || self.items.contains_key(&id)
            || self.players.iter().any(|p| p.id() == id)
    }
}

/// Guard proving the caller holds the player lock.
pub type PlayerGuard<'a> = FairMutexGuard<'a, ()>;

/// Shared world state.
pub struct World {
    registry: SpatialRegistry<Entity>,
    roster: RwLock<Roster>,
    player_lock: FairMutex<()>,
    observers: RwLock<Vec<Arc<dyn WorldObserver>>>,
    defeats_reported: Mutex<BTreeSet<EntityId>>,
    next_id: AtomicU64,
    action_timeout: Duration,
}

impl World {
    /// Creates an empty world covering `bounds`.
    #[must_use]
    pub fn new(bounds: GridBounds) -> Self {
        Self {
            registry: SpatialRegistry::new(bounds),
            roster: RwLock::new(Roster::default()),
            player_lock: FairMutex::new(()),
            observers: RwLock::new(Vec::new()),
            defeats_reported: Mutex::new(BTreeSet::new()),
            next_id: AtomicU64::new(1),
            action_timeout: DEFAULT_ACTION_TIMEOUT,
        }
    }

    /// Sets the bounded wait used by player actions.
    #[must_use]
    pub fn with_action_timeout(mut self, timeout: Duration) -> Self {
        self.action_timeout = timeout;
        self
    }

    /// Bounded wait used by player actions.
    #[must_use]
    pub const fn action_timeout(&self) -> Duration {
        self.action_timeout
    }

    /// Grid extent.
    #[must_use]
    pub fn bounds(&self) -> GridBounds {
        self.registry.bounds()
    }

    /// The spatial registry.
    #[must_use]
    pub const fn registry(&self) -> &SpatialRegistry<Entity> {
        &self.registry
    }

    /// Allocates a fresh entity id.
    pub fn allocate_id(&self) -> EntityId {
        EntityId::new(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// The first player, if any.
    #[must_use]
    pub fn player(&self) -> Option<Arc<Entity>> {
        self.roster.read().players.first().cloned()
    }

    /// All players, in insertion order.
    #[must_use]
    pub fn players(&self) -> Vec<Arc<Entity>> {
        self.roster.read().players.clone()
    }

    /// All enemies, ordered by id.
    #[must_use]
    pub fn enemies(&self) -> Vec<Arc<Entity>> {
        self.roster.read().enemies.values().cloned().collect()
    }

    /// All items, ordered by id.
    #[must_use]
    pub fn items(&self) -> Vec<Arc<Entity>> {
        self.roster.read().items.values().cloned().collect()
    }

    /// Looks up an enemy by id.
    #[must_use]
    pub fn enemy(&self, id: EntityId) -> Option<Arc<Entity>> {
        self.roster.read().enemies.get(&id).cloned()
    }

    /// Number of enemies.
    #[must_use]
    pub fn enemy_count(&self) -> usize {
        self.roster.read().enemies.len()
    }

    /// Returns true if an entity with this id is in any collection.
    #[must_use]
    pub fn contains(&self, id: EntityId) -> bool {
        self.roster.read().contains(id)
    }

    // ========================================================================
    // Mutation
    // ========================================================================

    /// Adds a player and registers it.
    pub fn add_player(&self, player: Arc<Entity>) -> bool {
        if !player.is_player() {
            return false;
        }
        self.admit(player, |roster, entity| roster.players.push(entity))
    }

    /// Adds an enemy and registers it.
    pub fn add_enemy(&self, enemy: Arc<Entity>) -> bool {
        if !enemy.is_enemy() {
            return false;
        }
        self.admit(enemy, |roster, entity| {
            roster.enemies.insert(entity.id(), entity);
        })
    }

    /// Adds an item and registers it.
    pub fn add_item(&self, item: Arc<Entity>) -> bool {
        if !item.is_item() {
            return false;
        }
        self.admit(item, |roster, entity| {
            roster.items.insert(entity.id(), entity);
        })
    }

    /// Removes a player from the world and the registry.
    pub fn remove_player(&self, player: &Entity) -> bool {
        self.evict(player, |roster, id| {
            let index = roster.players.iter().position(|p| p.id() == id)?;
            Some(roster.players.remove(index))
        })
    }

    /// Removes an enemy from the world and the registry.
    pub fn remove_enemy(&self, enemy: &Entity) -> bool {
        self.evict(enemy, |roster, id| roster.enemies.remove(&id))
    }

    /// Removes an item from the world and the registry.
    pub fn remove_item(&self, item: &Entity) -> bool {
        self.evict(item, |roster, id| roster.items.remove(&id))
    }

    /// Adds an enemy through the movement protocol: its cell lock is taken
    /// and the cell must be vacant under the lock.
    pub fn try_spawn_enemy(&self, enemy: Arc<Entity>, timeout: Duration) -> MoveOutcome {
        if !enemy.is_enemy() {
            return MoveOutcome::Refused;
        }
        let outcome = {
            let mut roster = self.roster.write();
            if roster.contains(enemy.id()) {
                return MoveOutcome::Refused;
            }
            let outcome = self.registry.try_insert(&enemy, timeout, MoveRule::VacantOnly);
            if outcome.is_moved() {
                roster.enemies.insert(enemy.id(), Arc::clone(&enemy));
            }
            outcome
        };
        if outcome.is_moved() {
            enemy.set_visible(true);
            self.notify(&WorldChange::Added {
                id: enemy.id(),
                kind: enemy.kind(),
                at: enemy.coordinate(),
            });
        }
        outcome
    }

    /// Moves an entity through the movement protocol and notifies on success.
    pub fn try_move(
        &self,
        entity: &Arc<Entity>,
        to: Coordinate,
        timeout: Duration,
        rule: MoveRule,
    ) -> MoveOutcome {
        let outcome = self.registry.try_move(entity, to, timeout, rule);
        if let MoveOutcome::Moved { from, to } = outcome {
            self.notify(&WorldChange::Moved {
                id: entity.id(),
                from,
                to,
            });
        }
        outcome
    }

    // ========================================================================
    // Player lock and defeat
    // ========================================================================

    /// Tries to take the player lock, waiting at most `timeout`. A zero
    /// timeout makes a single attempt.
    #[must_use]
    pub fn try_lock_player(&self, timeout: Duration) -> Option<PlayerGuard<'_>> {
        if timeout.is_zero() {
            self.player_lock.try_lock()
        } else {
            self.player_lock.try_lock_for(timeout)
        }
    }

    /// Flags the player as defeated and emits the defeat notification once.
    pub fn report_player_defeat(&self, player: &Entity) {
        let Some(stats) = player.as_combatant() else {
            return;
        };
        stats.mark_defeated();
        if self.defeats_reported.lock().insert(player.id()) {
            tracing::warn!(player = %player, "player defeated");
            self.notify(&WorldChange::PlayerDefeated { id: player.id() });
        }
    }

    // ========================================================================
    // Snapshots
    // ========================================================================

    /// Captures the placement map and every combatant's vitals.
    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        let _roster = self.roster.read();
        Snapshot::capture(self.registry.capture())
    }

    /// Replaces the world's contents with `snapshot`.
    ///
    /// Every captured entity is placed back at its recorded coordinate with its
    /// recorded vitals, and the collections are rebuilt from the snapshot.
    /// Returns the number of entities placed.
    pub fn restore(&self, snapshot: &Snapshot) -> usize {
        let placed = {
            let mut roster = self.roster.write();
            let placed = self.registry.restore(snapshot.layout());
            snapshot.restore_vitals();

            let mut rebuilt = Roster::default();
            for (_, entity) in snapshot.layout().entries() {
                entity.set_visible(true);
                match entity.kind() {
                    EntityKind::Player(_) => rebuilt.players.push(Arc::clone(entity)),
                    EntityKind::Enemy(_) => {
                        rebuilt.enemies.insert(entity.id(), Arc::clone(entity));
                    }
                    EntityKind::Item(_) => {
                        rebuilt.items.insert(entity.id(), Arc::clone(entity));
                    }
                }
            }
            for gone in roster
                .players
                .iter()
                .chain(roster.enemies.values())
                .chain(roster.items.values())
            {
                if !rebuilt.contains(gone.id()) {
                    gone.set_visible(false);
                }
            }
            *roster = rebuilt;

            let mut reported = self.defeats_reported.lock();
            reported.clear();
            reported.extend(
                roster
                    .players
                    .iter()
                    .filter(|p| p.is_defeated())
                    .map(|p| p.id()),
            );
            placed
        };
        tracing::info!(entities = placed, "world restored");
        self.notify(&WorldChange::Restored { entities: placed });
        placed
    }

    // ========================================================================
    // Observers
    // ========================================================================

    /// Registers an observer. Delivery follows registration order.
    pub fn add_observer(&self, observer: Arc<dyn WorldObserver>) {
        self.observers.write().push(observer);
    }

    /// Number of registered observers.
    #[must_use]
    pub fn observer_count(&self) -> usize {
        self.observers.read().len()
    }

    fn notify(&self, change: &WorldChange) {
        let observers = self.observers.read().clone();
        for observer in &observers {
            observer.on_world_changed(change);
        }
    }

    fn admit(&self, entity: Arc<Entity>, insert: impl FnOnce(&mut Roster, Arc<Entity>)) -> bool {
        {
            let mut roster = self.roster.write();
            // No cell lock: the registry's map write lock serialises this
            // against movers, which check admission under that same lock.
            if roster.contains(entity.id()) || !self.registry.place(&entity) {
                return false;
            }
            insert(&mut roster, Arc::clone(&entity));
        }
        entity.set_visible(true);
        tracing::debug!(entity = %entity, "added");
        self.notify(&WorldChange::Added {
            id: entity.id(),
            kind: entity.kind(),
            at: entity.coordinate(),
        });
        true
    }

    fn evict(
        &self,
        entity: &Entity,
        take: impl FnOnce(&mut Roster, EntityId) -> Option<Arc<Entity>>,
    ) -> bool {
        let at = {
            let mut roster = self.roster.write();
            let Some(removed) = take(&mut roster, entity.id()) else {
                return false;
            };
            let at = removed.coordinate();
            // Serialised by the registry's map write lock, as in `admit`.
            if !self.registry.remove(&removed) {
                tracing::warn!(entity = %removed, "removed entity was not registered");
            }
            at
        };
        entity.set_visible(false);
        tracing::debug!(entity = %entity, "removed");
        self.notify(&WorldChange::Removed {
            id: entity.id(),
            kind: entity.kind(),
            at,
        });
        true
    }
}

impl fmt::Debug for World {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("World")
            .field("registry", &self.registry)
            .field("observers", &self.observer_count())
            .finish_non_exhaustive()
    }
}

impl fmt::Display for World {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let roster = self.roster.read();
        write!(
            f,
            "World: {} player(s), {} enemies, {} item(s)",
            roster.players.len(),
            roster.enemies.len(),
            roster.items.len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{Body, Capabilities, CombatProfile, Combatant, EnemyKind, Item, Vitals};
    use crate::tests::helpers::{enemy_with, world_with_player};

    mod roster_tests {
        use super::*;

        #[test]
        fn add_then_remove_keeps_registry_in_step() {
            let (world, _) = world_with_player(Coordinate::new(0, 0));
            let goblin = enemy_with(&world, Coordinate::new(3, 3), 10, 2, 0.0);
            assert!(world.contains(goblin.id()));
            assert_eq!(world.registry().len(), 2);

            assert!(world.remove_enemy(&goblin));
            assert!(!world.contains(goblin.id()));
            assert!(!goblin.is_visible());
            assert!(!world.registry().is_occupied(Coordinate::new(3, 3)));
            assert!(!world.remove_enemy(&goblin));
        }

        #[test]
        fn wrong_kind_is_rejected() {
            let world = World::new(GridBounds::new(4, 4));
            let potion = Arc::new(Entity::item(world.allocate_id(), Item::potion(5), Coordinate::new(1, 1)));
            assert!(!world.add_enemy(Arc::clone(&potion)));
            assert!(!world.add_player(Arc::clone(&potion)));
            assert!(world.registry().is_empty());
            assert!(world.add_item(potion));
        }

        #[test]
        fn duplicate_add_is_rejected() {
            let world = World::new(GridBounds::new(4, 4));
            let wall = Arc::new(Entity::item(world.allocate_id(), Item::wall(), Coordinate::new(2, 2)));
            assert!(world.add_item(Arc::clone(&wall)));
            assert!(!world.add_item(wall));
            assert_eq!(world.items().len(), 1);
            assert_eq!(world.registry().len(), 1);
        }

        #[test]
        fn spawn_refused_on_occupied_cell() {
            let (world, _) = world_with_player(Coordinate::new(1, 1));
            let blocked = Arc::new(Entity::new(
                world.allocate_id(),
                EntityKind::Enemy(EnemyKind::Goblin),
                "Goblin",
                Coordinate::new(1, 1),
                Body::Combatant(Combatant::new(
                    CombatProfile::new(Capabilities::PHYSICAL | Capabilities::MELEE),
                    Vitals::new(10, 2),
                )),
            ));
            assert_eq!(
                world.try_spawn_enemy(Arc::clone(&blocked), DEFAULT_ACTION_TIMEOUT),
                MoveOutcome::Refused
            );
            assert!(!world.contains(blocked.id()));
            assert_eq!(world.enemy_count(), 0);
        }
    }

    mod restore_tests {
        use super::*;
        use crate::tests::helpers::player_with;

        #[test]
        fn player_added_after_snapshot_is_hidden_by_restore() {
            let world = World::new(GridBounds::new(6, 6));
            let snapshot = world.snapshot();
            let late = player_with(
                &world,
                Coordinate::new(2, 2),
                CombatProfile::new(Capabilities::PHYSICAL | Capabilities::MELEE),
                4,
            );

            assert_eq!(world.restore(&snapshot), 0);
            assert!(!world.contains(late.id()));
            assert!(!late.is_visible());
            assert!(world.player().is_none());
            assert!(world.registry().is_empty());
        }
    }

    mod notification_tests {
        use super::*;

        #[test]
        fn player_defeat_is_reported_once() {
            let (world, player) = world_with_player(Coordinate::new(0, 0));
            let (observer, changes) = ChannelObserver::channel();
            world.add_observer(Arc::new(observer));

            world.report_player_defeat(&player);
            world.report_player_defeat(&player);

            assert!(player.is_defeated());
            assert_eq!(
                changes.try_iter().collect::<Vec<_>>(),
                vec![WorldChange::PlayerDefeated { id: player.id() }]
            );
        }

        #[test]
        fn display_counts_collections() {
            let (world, _) = world_with_player(Coordinate::new(0, 0));
            enemy_with(&world, Coordinate::new(1, 1), 10, 2, 0.0);
            assert_eq!(world.to_string(), "World: 1 player(s), 1 enemies, 0 item(s)");
        }
    }
}
