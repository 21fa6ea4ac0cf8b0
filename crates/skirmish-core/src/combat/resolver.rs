//! Combat resolver for a single attacker/defender exchange.
//!
//! The `CombatResolver` runs, in order:
//! 1. range check (melee before ranged)
//! 2. evasion roll
//! 3. damage dispatch (spell if the attacker casts, weapon strike otherwise)
//! 4. defeat handling: removal from the world and loot drop
//! 5. a single physical counterattack if the defender survives
//!
//! # Locking
//!
//! The resolver takes no locks of its own beyond the combatants' vitals. A
//! caller attacking the player must hold the world's player lock for the whole
//! call.

use std::sync::Arc;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tessera::Coordinate;

use super::{
    attack_kind, evasion_chance, physical_strike, reach_check, spell_strike, CombatError,
    DamageKind, Strike,
};
use crate::entity::{Capabilities, Combatant, Entity, EntityId, Item};
use crate::world::World;

/// Treasure left behind by a defeated loot dropper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LootDrop {
    /// The new treasure entity.
    pub item: EntityId,
    /// Where it was dropped.
    pub at: Coordinate,
    /// Its value.
    pub value: u32,
    /// True if the value went straight to the player's score.
    pub credited: bool,
}

/// The defender's retaliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counterattack {
    /// The retaliating strike.
    pub strike: Strike,
    /// Damage the original attacker took.
    pub damage: i32,
    /// The original attacker's health afterwards.
    pub attacker_health: i32,
    /// Whether the retaliation defeated the original attacker.
    pub attacker_defeated: bool,
    /// Loot dropped by the original attacker, if it fell.
    pub loot: Option<LootDrop>,
}

/// Outcome of an exchange that landed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CombatReport {
    /// Attacking entity.
    pub attacker: EntityId,
    /// Defending entity.
    pub defender: EntityId,
    /// The strike that landed.
    pub strike: Strike,
    /// Damage the defender took after mitigation.
    pub damage: i32,
    /// The defender's health afterwards.
    pub defender_health: i32,
    /// Whether the defender was defeated.
    pub defender_defeated: bool,
    /// Treasure dropped by the defender.
    pub loot: Option<LootDrop>,
    /// The defender's retaliation, if any.
    pub counter: Option<Counterattack>,
}

/// Stateless resolver for one combat exchange.
///
/// # Example
///
/// ```ignore
/// let report = CombatResolver::new().resolve(&goblin, &player, &world, &mut rng)?;
/// if report.defender_defeated { /* game over */ }
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct CombatResolver;

impl CombatResolver {
    /// Creates a new combat resolver.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Resolves one attack of `attacker` against `defender`.
    ///
    /// # Errors
    ///
    /// Every non-landing outcome is a [`CombatError`] and leaves all state
    /// untouched.
    pub fn resolve<R: Rng + ?Sized>(
        &self,
        attacker: &Arc<Entity>,
        defender: &Arc<Entity>,
        world: &World,
        rng: &mut R,
    ) -> Result<CombatReport, CombatError> {
        let offence = attacker
            .as_combatant()
            .ok_or(CombatError::NoAttackCapability)?;
        let defence = defender.as_combatant().ok_or(CombatError::InvalidTarget)?;
        if offence.is_defeated() {
            return Err(CombatError::AttackerDefeated);
        }
        if defence.is_defeated() {
            return Err(CombatError::DefenderDefeated);
        }

        if let Err(err) = reach_check(
            offence.profile(),
            attacker.coordinate(),
            defender.coordinate(),
        ) {
            tracing::debug!(attacker = %attacker, defender = %defender, %err, "combat skipped");
            return Err(err);
        }

        let kind = attack_kind(offence.profile());
        if rng.gen_bool(evasion_chance(defence.profile(), offence.profile(), kind)) {
            tracing::info!(attacker = %attacker, defender = %defender, "attack evaded");
            return Err(CombatError::Evaded);
        }

        let strike = match kind {
            DamageKind::Magic => spell_strike(
                offence.power(),
                offence.profile().element,
                defence.profile().element,
            ),
            DamageKind::Physical => physical_strike(offence.power(), rng),
        };
        let receipt = defence.receive_damage(strike.amount, strike.kind);
        tracing::info!(
            attacker = %attacker,
            defender = %defender,
            damage = receipt.dealt,
            critical = strike.critical,
            health = receipt.health,
            "attack landed"
        );

        let mut report = CombatReport {
            attacker: attacker.id(),
            defender: defender.id(),
            strike,
            damage: receipt.dealt,
            defender_health: receipt.health,
            defender_defeated: receipt.health == 0,
            loot: None,
            counter: None,
        };

        if receipt.defeated_now {
            report.loot = Self::settle_defeat(attacker, defender, world);
        } else if receipt.health > 0 && defence.profile().has(Capabilities::PHYSICAL) {
            report.counter = Some(Self::counterattack(defender, defence, attacker, offence, world, rng));
        }

        Ok(report)
    }

    /// Single-level retaliation: an unconditional weapon strike back.
    fn counterattack<R: Rng + ?Sized>(
        retaliator: &Arc<Entity>,
        retaliator_stats: &Combatant,
        target: &Arc<Entity>,
        target_stats: &Combatant,
        world: &World,
        rng: &mut R,
    ) -> Counterattack {
        let strike = physical_strike(retaliator_stats.power(), rng);
        let receipt = target_stats.receive_damage(strike.amount, DamageKind::Physical);
        tracing::info!(
            attacker = %retaliator,
            defender = %target,
            damage = receipt.dealt,
            health = receipt.health,
            "counterattack"
        );

        let loot = if receipt.defeated_now {
            Self::settle_defeat(retaliator, target, world)
        } else {
            None
        };
        Counterattack {
            strike,
            damage: receipt.dealt,
            attacker_health: receipt.health,
            attacker_defeated: receipt.health == 0,
            loot,
        }
    }

    /// Removes a fallen enemy (or reports a fallen player) and drops its loot.
    fn settle_defeat(victor: &Arc<Entity>, fallen: &Arc<Entity>, world: &World) -> Option<LootDrop> {
        let at = fallen.coordinate();
        tracing::info!(entity = %fallen, by = %victor, "defeated");

        if fallen.is_player() {
            world.report_player_defeat(fallen);
        } else {
            world.remove_enemy(fallen);
        }

        let profile = fallen.as_combatant()?.profile();
        if !profile.has(Capabilities::LOOT) {
            return None;
        }

        let credited = victor.is_player();
        let item = if credited {
            Item::claimed_treasure(profile.loot)
        } else {
            Item::treasure(profile.loot)
        };
        let treasure = Arc::new(Entity::item(world.allocate_id(), item, at));
        let drop = LootDrop {
            item: treasure.id(),
            at,
            value: profile.loot,
            credited,
        };
        if !world.add_item(treasure) {
            tracing::warn!(cell = %at, "loot could not be placed");
        }
        if let Some(player) = victor.as_combatant().filter(|_| credited) {
            player.credit_score(u64::from(profile.loot));
            tracing::info!(value = profile.loot, score = player.score(), "loot collected");
        } else {
            tracing::info!(value = profile.loot, cell = %at, "loot dropped");
        }
        Some(drop)
    }
}
