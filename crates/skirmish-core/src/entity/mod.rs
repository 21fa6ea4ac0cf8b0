//! Entity module: everything that can be placed on the map.
//!
//! - [`EntityId`]: unique identifier for entities
//! - [`EntityKind`]: what the entity is (player class, enemy kind, item kind)
//! - [`Body`]: type-safe storage for the combatant or item payload
//! - [`Entity`]: the shared, placeable container
//!
//! Entities are handed around as `Arc<Entity>`: the world collections, the
//! spatial registry, agent loops and snapshots all hold the same handle. The
//! coordinate and visibility flag use interior mutability so that the registry
//! can re-key an entity through a shared reference.
//!
//! # Example
//!
//! ```
//! use skirmish_core::entity::{Entity, EntityId, ItemKind};
//! use skirmish_core::entity::components::Item;
//! use tessera::Coordinate;
//!
//! let wall = Entity::item(EntityId::new(7), Item::wall(), Coordinate::new(2, 3));
//!
//! assert_eq!(wall.id().as_u64(), 7);
//! assert_eq!(wall.as_item().map(Item::kind), Some(ItemKind::Wall));
//! assert!(!wall.is_combatant());
//! ```

pub mod components;

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tessera::{Coordinate, Occupancy, Placeable};

pub use components::{
    Capabilities, CombatProfile, Combatant, DamageReceipt, Item, ItemKind, Mitigation,
    PlayerLedger, Vitals,
};

/// Unique identifier for an entity.
///
/// IDs are allocated by the world and are never reused while it lives.
///
/// # Example
///
/// ```
/// use skirmish_core::entity::EntityId;
///
/// let id1 = EntityId::new(1);
/// let id2 = EntityId::new(2);
///
/// assert!(id1 < id2);
/// assert_eq!(id1.as_u64(), 1);
/// ```
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntityId(u64);

impl EntityId {
    /// Creates a new `EntityId` from a raw `u64` value.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw `u64` value of this identifier.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Debug for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntityId({})", self.0)
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for EntityId {
    fn from(id: u64) -> Self {
        Self::new(id)
    }
}

impl From<EntityId> for u64 {
    fn from(id: EntityId) -> Self {
        id.0
    }
}

/// Player character classes.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlayerClass {
    /// Armoured melee fighter
    Warrior,
    /// Ranged spell caster
    Mage,
    /// Accurate ranged fighter
    Archer,
}

/// Enemy kinds.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EnemyKind {
    /// Agile melee fighter
    Goblin,
    /// Magic-resistant melee fighter
    Orc,
    /// Boss holding every fighting capability
    Dragon,
}

impl EnemyKind {
    /// Every enemy kind, in declaration order.
    pub const ALL: [Self; 3] = [Self::Goblin, Self::Orc, Self::Dragon];
}

/// What an entity is.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    /// The player character
    Player(PlayerClass),
    /// An autonomous enemy
    Enemy(EnemyKind),
    /// A map item
    Item(ItemKind),
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Player(class) => write!(f, "{class:?}"),
            Self::Enemy(kind) => write!(f, "{kind:?}"),
            Self::Item(kind) => write!(f, "{kind:?}"),
        }
    }
}

/// Type-safe storage for the entity payload.
///
/// The variant must agree with the entity's [`EntityKind`]: players and enemies
/// carry a [`Combatant`], items carry an [`Item`].
#[derive(Debug)]
pub enum Body {
    /// Combat participant
    Combatant(Combatant),
    /// Map item
    Item(Item),
}

impl Body {
    /// Returns the combatant payload, if any.
    #[must_use]
    pub const fn as_combatant(&self) -> Option<&Combatant> {
        match self {
            Self::Combatant(combatant) => Some(combatant),
            Self::Item(_) => None,
        }
    }

    /// Returns the item payload, if any.
    #[must_use]
    pub const fn as_item(&self) -> Option<&Item> {
        match self {
            Self::Item(item) => Some(item),
            Self::Combatant(_) => None,
        }
    }
}

/// A placeable entity.
///
/// # Invariants
///
/// - `id` is unique within a world
/// - `kind` matches the `body` variant
/// - while registered, `coordinate` equals the registry key (maintained by the
///   registry, which is the only caller of [`Placeable::relocate`])
#[derive(Debug)]
pub struct Entity {
    id: EntityId,
    kind: EntityKind,
    name: String,
    coordinate: Mutex<Coordinate>,
    visible: AtomicBool,
    body: Body,
}

impl Entity {
    /// Creates an entity. The caller keeps `kind` and `body` consistent.
    #[must_use]
    pub fn new(
        id: EntityId,
        kind: EntityKind,
        name: impl Into<String>,
        at: Coordinate,
        body: Body,
    ) -> Self {
        Self {
            id,
            kind,
            name: name.into(),
            coordinate: Mutex::new(at),
            visible: AtomicBool::new(true),
            body,
        }
    }

    /// Creates an item entity named after its kind.
    #[must_use]
    pub fn item(id: EntityId, item: Item, at: Coordinate) -> Self {
        let kind = item.kind();
        Self::new(id, EntityKind::Item(kind), format!("{kind:?}"), at, Body::Item(item))
    }

    /// Returns the entity's unique identifier.
    #[must_use]
    pub const fn id(&self) -> EntityId {
        self.id
    }

    /// Returns the entity's kind.
    #[must_use]
    pub const fn kind(&self) -> EntityKind {
        self.kind
    }

    /// Display identity.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current coordinate.
    #[must_use]
    pub fn coordinate(&self) -> Coordinate {
        *self.coordinate.lock()
    }

    /// Returns the visibility flag.
    #[must_use]
    pub fn is_visible(&self) -> bool {
        self.visible.load(Ordering::Acquire)
    }

    /// Sets the visibility flag.
    pub fn set_visible(&self, visible: bool) {
        self.visible.store(visible, Ordering::Release);
    }

    /// Returns the payload.
    #[must_use]
    pub const fn body(&self) -> &Body {
        &self.body
    }

    /// Returns the combatant payload, if any.
    #[must_use]
    pub const fn as_combatant(&self) -> Option<&Combatant> {
        self.body.as_combatant()
    }

    /// Returns the item payload, if any.
    #[must_use]
    pub const fn as_item(&self) -> Option<&Item> {
        self.body.as_item()
    }

    /// Returns `true` if this entity is the player.
    #[must_use]
    pub const fn is_player(&self) -> bool {
        matches!(self.kind, EntityKind::Player(_))
    }

    /// Returns `true` if this entity is an enemy.
    #[must_use]
    pub const fn is_enemy(&self) -> bool {
        matches!(self.kind, EntityKind::Enemy(_))
    }

    /// Returns `true` if this entity is an item.
    #[must_use]
    pub const fn is_item(&self) -> bool {
        matches!(self.kind, EntityKind::Item(_))
    }

    /// Returns `true` if this entity takes part in combat.
    #[must_use]
    pub const fn is_combatant(&self) -> bool {
        self.as_combatant().is_some()
    }

    /// Enemy kind, if this is an enemy.
    #[must_use]
    pub const fn enemy_kind(&self) -> Option<EnemyKind> {
        match self.kind {
            EntityKind::Enemy(kind) => Some(kind),
            _ => None,
        }
    }

    /// Returns `true` if this is a combatant whose health has reached zero.
    #[must_use]
    pub fn is_defeated(&self) -> bool {
        self.as_combatant().is_some_and(Combatant::is_defeated)
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{} at {}", self.name, self.id, self.coordinate())
    }
}

impl Placeable for Entity {
    type Id = EntityId;

    fn id(&self) -> EntityId {
        self.id
    }

    fn coordinate(&self) -> Coordinate {
        Entity::coordinate(self)
    }

    fn relocate(&self, to: Coordinate) {
        *self.coordinate.lock() = to;
    }

    fn occupancy(&self) -> Occupancy {
        match &self.body {
            Body::Combatant(_) => Occupancy::Exclusive,
            Body::Item(item) if item.is_blocking() => Occupancy::Blocking,
            Body::Item(_) => Occupancy::Open,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn goblin(id: u64) -> Entity {
        Entity::new(
            EntityId::new(id),
            EntityKind::Enemy(EnemyKind::Goblin),
            "Goblin",
            Coordinate::new(1, 1),
            Body::Combatant(Combatant::new(
                CombatProfile::new(Capabilities::PHYSICAL | Capabilities::MELEE),
                Vitals::new(7, 8),
            )),
        )
    }

    mod entity_id_tests {
        use super::*;

        #[test]
        fn ordering() {
            let mut ids = vec![EntityId::new(3), EntityId::new(1), EntityId::new(2)];
            ids.sort();
            assert_eq!(ids, vec![EntityId::new(1), EntityId::new(2), EntityId::new(3)]);
        }

        #[test]
        fn debug_format() {
            assert_eq!(format!("{:?}", EntityId::new(42)), "EntityId(42)");
        }

        #[test]
        fn display_format() {
            assert_eq!(format!("{}", EntityId::new(42)), "42");
        }

        #[test]
        fn conversions() {
            let id: EntityId = 42u64.into();
            let raw: u64 = id.into();
            assert_eq!(raw, 42);
        }

        #[test]
        fn serialization_roundtrip() {
            let id = EntityId::new(12345);
            let json = serde_json::to_string(&id).unwrap();
            let back: EntityId = serde_json::from_str(&json).unwrap();
            assert_eq!(id, back);
        }
    }

    mod entity_tests {
        use super::*;

        #[test]
        fn kind_predicates() {
            let g = goblin(1);
            assert!(g.is_enemy());
            assert!(g.is_combatant());
            assert!(!g.is_player());
            assert!(!g.is_item());
            assert_eq!(g.enemy_kind(), Some(EnemyKind::Goblin));
        }

        #[test]
        fn occupancy_follows_body() {
            let g = goblin(1);
            let wall = Entity::item(EntityId::new(2), Item::wall(), Coordinate::new(0, 0));
            let potion = Entity::item(EntityId::new(3), Item::potion(10), Coordinate::new(0, 0));

            assert_eq!(g.occupancy(), Occupancy::Exclusive);
            assert_eq!(wall.occupancy(), Occupancy::Blocking);
            assert_eq!(potion.occupancy(), Occupancy::Open);
        }

        #[test]
        fn relocate_updates_coordinate() {
            let g = goblin(1);
            g.relocate(Coordinate::new(4, 5));
            assert_eq!(g.coordinate(), Coordinate::new(4, 5));
        }

        #[test]
        fn visibility_flag() {
            let g = goblin(1);
            assert!(g.is_visible());
            g.set_visible(false);
            assert!(!g.is_visible());
        }

        #[test]
        fn display_includes_identity_and_position() {
            assert_eq!(goblin(9).to_string(), "Goblin#9 at (1, 1)");
        }

        #[test]
        fn items_are_never_defeated() {
            let potion = Entity::item(EntityId::new(3), Item::potion(10), Coordinate::new(0, 0));
            assert!(!potion.is_defeated());
        }
    }
}
