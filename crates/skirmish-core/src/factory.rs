//! Construction of enemies and players.
//!
//! Enemy stats come from a per-kind budget of health and power. A symmetric
//! adjustment moves up to two points between them, so the total is the same
//! for every enemy of a kind.

use std::collections::BTreeSet;

use rand::seq::SliceRandom;
use rand::{Rng, RngCore};
use tessera::Coordinate;

use crate::combat::MagicElement;
use crate::entity::{
    Body, Capabilities, CombatProfile, Combatant, EnemyKind, Entity, EntityId, EntityKind,
    Mitigation, PlayerClass, Vitals,
};
use crate::entity::components::MAX_HEALTH;
use crate::world::World;

/// Largest stat adjustment applied to an enemy budget.
pub const BUDGET_SWING: i32 = 2;

/// Builds enemies by kind.
///
/// The population manager calls this from worker threads, so implementations
/// must be shareable.
pub trait EnemyFactory: Send + Sync {
    /// Builds an enemy of `kind` at `at`. The result is not yet in any world.
    fn build_enemy(
        &self,
        kind: EnemyKind,
        id: EntityId,
        at: Coordinate,
        rng: &mut dyn RngCore,
    ) -> Entity;
}

/// The stock goblin, orc and dragon.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardEnemyFactory;

impl StandardEnemyFactory {
    /// Base `(health, power)` for `kind`.
    #[must_use]
    pub const fn budget(kind: EnemyKind) -> (i32, i32) {
        match kind {
            EnemyKind::Goblin => (7, 8),
            EnemyKind::Orc => (10, 5),
            EnemyKind::Dragon => (20, 15),
        }
    }
}

impl EnemyFactory for StandardEnemyFactory {
    fn build_enemy(
        &self,
        kind: EnemyKind,
        id: EntityId,
        at: Coordinate,
        rng: &mut dyn RngCore,
    ) -> Entity {
        let (health, power) = Self::budget(kind);
        let swing = rng.gen_range(-BUDGET_SWING..=BUDGET_SWING);
        let melee = Capabilities::PHYSICAL | Capabilities::MELEE;

        let profile = match kind {
            EnemyKind::Goblin => {
                let agility = rng.gen_range(0..=80_u32);
                CombatProfile::new(melee).with_evasion((f64::from(agility) / 100.0).min(0.8))
            }
            EnemyKind::Orc => CombatProfile::new(melee).with_mitigation(Mitigation::Ward {
                resistance: rng.gen_range(0.0..0.5),
            }),
            EnemyKind::Dragon => CombatProfile::new(melee | Capabilities::MAGIC | Capabilities::RANGED)
                .with_element(MagicElement::random(&mut *rng)),
        }
        .with_loot(rng.gen_range(100..=300));

        Entity::new(
            id,
            EntityKind::Enemy(kind),
            format!("{kind:?}"),
            at,
            Body::Combatant(Combatant::new(profile, Vitals::new(health + swing, power - swing))),
        )
    }
}

/// Picks the kind for a replacement enemy: kinds missing from the map first,
/// otherwise any kind.
pub fn choose_enemy_kind<R: Rng + ?Sized>(world: &World, rng: &mut R) -> EnemyKind {
    let present: BTreeSet<EnemyKind> = world
        .enemies()
        .iter()
        .filter_map(|enemy| enemy.enemy_kind())
        .collect();
    let absent: Vec<EnemyKind> = EnemyKind::ALL
        .into_iter()
        .filter(|kind| !present.contains(kind))
        .collect();
    let candidates = if absent.is_empty() {
        &EnemyKind::ALL[..]
    } else {
        &absent[..]
    };
    candidates.choose(rng).copied().unwrap_or(EnemyKind::Goblin)
}

/// Configures a player character.
///
/// # Example
///
/// ```
/// use rand::SeedableRng;
/// use rand_chacha::ChaCha8Rng;
/// use skirmish_core::entity::{EntityId, PlayerClass};
/// use skirmish_core::factory::PlayerBuilder;
/// use tessera::Coordinate;
///
/// let mut rng = ChaCha8Rng::seed_from_u64(7);
/// let hero = PlayerBuilder::new(PlayerClass::Mage)
///     .with_name("Ilse")
///     .at(Coordinate::new(2, 3))
///     .with_power(9)
///     .build(EntityId::new(1), &mut rng);
///
/// assert_eq!(hero.name(), "Ilse");
/// assert_eq!(hero.as_combatant().unwrap().power(), 9);
/// ```
#[derive(Debug, Clone)]
pub struct PlayerBuilder {
    class: PlayerClass,
    name: String,
    at: Coordinate,
    health: i32,
    power: Option<i32>,
}

impl PlayerBuilder {
    /// A full-health player of `class` at the origin with rolled power.
    #[must_use]
    pub fn new(class: PlayerClass) -> Self {
        Self {
            class,
            name: format!("{class:?}"),
            at: Coordinate::new(0, 0),
            health: MAX_HEALTH,
            power: None,
        }
    }

    /// Sets the display name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the starting cell.
    #[must_use]
    pub fn at(mut self, at: Coordinate) -> Self {
        self.at = at;
        self
    }

    /// Sets starting health (clamped to the maximum).
    #[must_use]
    pub fn with_health(mut self, health: i32) -> Self {
        self.health = health;
        self
    }

    /// Fixes power instead of rolling 4 to 14.
    #[must_use]
    pub fn with_power(mut self, power: i32) -> Self {
        self.power = Some(power);
        self
    }

    /// Rolls the class parameters and builds the player.
    pub fn build<R: Rng + ?Sized>(self, id: EntityId, rng: &mut R) -> Entity {
        let profile = match self.class {
            PlayerClass::Warrior => CombatProfile::new(Capabilities::PHYSICAL | Capabilities::MELEE)
                .with_mitigation(Mitigation::Armor {
                    defense: rng.gen_range(0..=120),
                }),
            PlayerClass::Mage => CombatProfile::new(Capabilities::MAGIC | Capabilities::RANGED)
                .with_element(MagicElement::random(&mut *rng)),
            PlayerClass::Archer => CombatProfile::new(Capabilities::PHYSICAL | Capabilities::RANGED)
                .with_accuracy(rng.gen_range(0.0..0.8)),
        };
        let power = match self.power {
            Some(power) => power,
            None => rng.gen_range(4..=14),
        };

        Entity::new(
            id,
            EntityKind::Player(self.class),
            self.name.clone(),
            self.at,
            Body::Combatant(Combatant::player(
                profile,
                Vitals::new(self.health, power),
                self.name,
            )),
        )
    }
}
