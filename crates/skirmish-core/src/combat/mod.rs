//! Combat capability model.
//!
//! The narrow contracts every fighter satisfies, expressed as free functions
//! over a [`CombatProfile`] instead of per-type methods:
//!
//! - reach: [`in_melee_range`], [`in_range`] and [`reach_check`]
//! - evasion: [`evasion_chance`]
//! - offence: [`physical_strike`] (10 % critical hits) and [`spell_strike`]
//!   (×1.5 with a ±20 % elemental edge)
//! - elements: [`MagicElement::is_stronger_than`], a four-element cycle
//!
//! Defender mitigation is not applied here; it happens inside
//! [`Combatant::receive_damage`](crate::entity::Combatant::receive_damage).
//!
//! [`CombatResolver`] sequences these steps for one attacker/defender exchange.

mod resolver;

pub use resolver::{CombatReport, CombatResolver, Counterattack, LootDrop};

use std::fmt;

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tessera::Coordinate;
use thiserror::Error;

use crate::entity::components::round_damage;
use crate::entity::{Capabilities, CombatProfile};

/// Probability that a physical strike is critical.
pub const CRITICAL_CHANCE: f64 = 0.10;

/// Base multiplier applied to spell damage.
pub const SPELL_MULTIPLIER: f64 = 1.5;

/// Multiplier bonus (or malus) for elemental advantage (or disadvantage).
pub const ELEMENTAL_EDGE: f64 = 0.2;

/// Reach of melee attacks.
pub const MELEE_REACH: u32 = 1;

/// Why an exchange produced no damage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CombatError {
    /// The defender is beyond the attacker's reach.
    #[error("target out of range (distance {distance}, reach {reach})")]
    OutOfRange {
        /// Manhattan distance between the two
        distance: u32,
        /// The attacker's reach
        reach: u32,
    },
    /// The defender evaded the attack.
    #[error("attack evaded")]
    Evaded,
    /// The attacker has no way of attacking.
    #[error("attacker cannot attack")]
    NoAttackCapability,
    /// The defender is not a combatant.
    #[error("target cannot be attacked")]
    InvalidTarget,
    /// The attacker has already been defeated.
    #[error("attacker is defeated")]
    AttackerDefeated,
    /// The defender has already been defeated.
    #[error("target is already defeated")]
    DefenderDefeated,
}

/// Damage channel, used to pick the mitigation that applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DamageKind {
    /// Weapon damage
    Physical,
    /// Spell damage
    Magic,
}

/// Spell elements.
///
/// Dominance is cyclic: Fire → Ice → Lightning → Acid → Fire.
///
/// # Example
///
/// ```
/// use skirmish_core::combat::MagicElement;
///
/// assert!(MagicElement::Fire.is_stronger_than(MagicElement::Ice));
/// assert!(!MagicElement::Ice.is_stronger_than(MagicElement::Fire));
/// assert!(!MagicElement::Fire.is_stronger_than(MagicElement::Fire));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MagicElement {
    /// Beats Ice
    Fire,
    /// Beats Lightning
    Ice,
    /// Beats Acid
    Lightning,
    /// Beats Fire
    Acid,
}

impl MagicElement {
    /// Every element, in cycle order.
    pub const ALL: [Self; 4] = [Self::Fire, Self::Ice, Self::Lightning, Self::Acid];

    /// The single element this one dominates.
    #[must_use]
    pub const fn prey(self) -> Self {
        match self {
            Self::Fire => Self::Ice,
            Self::Ice => Self::Lightning,
            Self::Lightning => Self::Acid,
            Self::Acid => Self::Fire,
        }
    }

    /// Returns true if `self` dominates `other`.
    #[must_use]
    pub fn is_stronger_than(self, other: Self) -> bool {
        self.prey() == other
    }

    /// Picks an element uniformly at random.
    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self::ALL.choose(rng).copied().unwrap_or(Self::Fire)
    }
}

impl fmt::Display for MagicElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Fire => "fire",
            Self::Ice => "ice",
            Self::Lightning => "lightning",
            Self::Acid => "acid",
        };
        f.write_str(name)
    }
}

/// Spell multiplier from the attacker's element against the defender's:
/// 1.2 on advantage, 0.8 on disadvantage, 1.0 otherwise.
#[must_use]
pub fn elemental_modifier(attacker: Option<MagicElement>, defender: Option<MagicElement>) -> f64 {
    match (attacker, defender) {
        (Some(a), Some(d)) if a.is_stronger_than(d) => 1.0 + ELEMENTAL_EDGE,
        (Some(a), Some(d)) if d.is_stronger_than(a) => 1.0 - ELEMENTAL_EDGE,
        _ => 1.0,
    }
}

/// True iff the Manhattan distance is exactly [`MELEE_REACH`].
#[must_use]
pub fn in_melee_range(a: Coordinate, b: Coordinate) -> bool {
    a.manhattan(b) == MELEE_REACH
}

/// True iff the Manhattan distance is at most `range`.
#[must_use]
pub fn in_range(a: Coordinate, b: Coordinate, range: u32) -> bool {
    a.manhattan(b) <= range
}

/// Checks that `profile` can reach `to` from `from`.
///
/// Melee takes precedence over ranged, so a fighter holding both must be
/// adjacent.
///
/// # Errors
///
/// [`CombatError::NoAttackCapability`] if the profile has neither a reach
/// capability nor an offensive one; [`CombatError::OutOfRange`] if the target
/// is too far.
pub fn reach_check(profile: &CombatProfile, from: Coordinate, to: Coordinate) -> Result<(), CombatError> {
    if !profile
        .capabilities
        .intersects(Capabilities::PHYSICAL | Capabilities::MAGIC)
    {
        return Err(CombatError::NoAttackCapability);
    }
    let distance = from.manhattan(to);
    let (ok, reach) = if profile.has(Capabilities::MELEE) {
        (in_melee_range(from, to), MELEE_REACH)
    } else if profile.has(Capabilities::RANGED) {
        (in_range(from, to, profile.range), profile.range)
    } else {
        return Err(CombatError::NoAttackCapability);
    };
    if ok {
        Ok(())
    } else {
        Err(CombatError::OutOfRange { distance, reach })
    }
}

/// Damage channel an attacker uses. Magic wins when both are held.
#[must_use]
pub fn attack_kind(profile: &CombatProfile) -> DamageKind {
    if profile.has(Capabilities::MAGIC) {
        DamageKind::Magic
    } else {
        DamageKind::Physical
    }
}

/// Chance that `defender` evades an attack of `kind` from `attacker`.
///
/// Physical attacks scale the defender's evasion by `1 - accuracy`; spells
/// divide it by the elemental modifier. The result is clamped to [0, 1].
#[must_use]
pub fn evasion_chance(defender: &CombatProfile, attacker: &CombatProfile, kind: DamageKind) -> f64 {
    let chance = match kind {
        DamageKind::Physical => defender.evasion * (1.0 - attacker.accuracy),
        DamageKind::Magic => {
            defender.evasion / elemental_modifier(attacker.element, defender.element)
        }
    };
    chance.clamp(0.0, 1.0)
}

/// One computed hit, before defender mitigation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Strike {
    /// Raw damage
    pub amount: i32,
    /// Damage channel
    pub kind: DamageKind,
    /// Whether a physical critical hit doubled the damage
    pub critical: bool,
}

/// A weapon strike: `power`, doubled on a critical hit, at least 1.
pub fn physical_strike<R: Rng + ?Sized>(power: i32, rng: &mut R) -> Strike {
    let critical = rng.gen_bool(CRITICAL_CHANCE);
    let amount = if critical { power.saturating_mul(2) } else { power };
    Strike {
        amount: amount.max(1),
        kind: DamageKind::Physical,
        critical,
    }
}

/// A spell: `power × 1.5 × elemental modifier`, rounded, at least 1.
#[must_use]
pub fn spell_strike(power: i32, attacker: Option<MagicElement>, defender: Option<MagicElement>) -> Strike {
    let raw = f64::from(power) * SPELL_MULTIPLIER * elemental_modifier(attacker, defender);
    Strike {
        amount: round_damage(raw).max(1),
        kind: DamageKind::Magic,
        critical: false,
    }
}
