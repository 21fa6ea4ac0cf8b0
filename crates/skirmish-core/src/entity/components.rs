//! Component structs held by entities.
//!
//! Combatants are described by a [`Capabilities`] set resolved once at
//! construction plus a [`CombatProfile`] of per-variant parameters. Mutable
//! state (health, power, the defeat flag, the player's score and inventory) sits
//! behind short-lived locks so that agents on other threads can read it while
//! the player lock serialises writes to the player.

use bitflags::bitflags;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::combat::{DamageKind, MagicElement};

/// Upper bound of a combatant's health.
pub const MAX_HEALTH: i32 = 100;

/// Base chance of evading an attack, before accuracy or element modifiers.
pub const BASE_EVASION: f64 = 0.25;

/// Reach shared by every ranged fighter.
pub const RANGED_REACH: u32 = 2;

bitflags! {
    /// Combat capabilities a combatant holds.
    ///
    /// Several may be combined; a dragon holds all four fighting flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct Capabilities: u8 {
        /// Strikes with weapons; can critically hit and counterattack.
        const PHYSICAL = 1 << 0;
        /// Casts elemental spells.
        const MAGIC = 1 << 1;
        /// Attacks adjacent targets only.
        const MELEE = 1 << 2;
        /// Attacks anything within [`RANGED_REACH`].
        const RANGED = 1 << 3;
        /// Leaves treasure behind when defeated.
        const LOOT = 1 << 4;
    }
}

/// Defender-side damage reduction.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub enum Mitigation {
    /// Takes damage as dealt.
    #[default]
    None,
    /// Reduces physical damage by `min(0.6, defense / 200)`.
    Armor {
        /// Defense rating, 0 to 120.
        defense: u32,
    },
    /// Reduces magic damage by the resistance fraction.
    Ward {
        /// Fraction of magic damage absorbed, 0 to 0.5.
        resistance: f64,
    },
}

impl Mitigation {
    /// Damage remaining after mitigation, never below 1.
    #[must_use]
    pub fn apply(self, amount: i32, kind: DamageKind) -> i32 {
        let reduced = match (self, kind) {
            (Self::Armor { defense }, DamageKind::Physical) => {
                let reduction = (f64::from(defense) / 200.0).min(0.6);
                round_damage(f64::from(amount) * (1.0 - reduction))
            }
            (Self::Ward { resistance }, DamageKind::Magic) => {
                round_damage(f64::from(amount) * (1.0 - resistance))
            }
            _ => amount,
        };
        reduced.max(1)
    }
}

/// Rounds a fractional damage value to the nearest whole point.
#[allow(clippy::cast_possible_truncation)]
pub(crate) fn round_damage(value: f64) -> i32 {
    value.round().clamp(f64::from(i32::MIN), f64::from(i32::MAX)) as i32
}

/// Immutable combat parameters of one combatant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombatProfile {
    /// What the combatant can do.
    pub capabilities: Capabilities,
    /// Chance of evading an incoming attack, [0, 1].
    pub evasion: f64,
    /// Fraction of the target's evasion negated by physical attacks, [0, 1].
    pub accuracy: f64,
    /// Spell element for magic users.
    pub element: Option<MagicElement>,
    /// Reach of ranged attacks.
    pub range: u32,
    /// Incoming damage reduction.
    pub mitigation: Mitigation,
    /// Treasure value dropped on defeat (zero without [`Capabilities::LOOT`]).
    pub loot: u32,
}

impl CombatProfile {
    /// A profile with the given capabilities and default parameters.
    #[must_use]
    pub fn new(capabilities: Capabilities) -> Self {
        Self {
            capabilities,
            evasion: BASE_EVASION,
            accuracy: 0.0,
            element: None,
            range: RANGED_REACH,
            mitigation: Mitigation::None,
            loot: 0,
        }
    }

    /// Sets the evasion chance, clamped to [0, 1].
    #[must_use]
    pub fn with_evasion(mut self, evasion: f64) -> Self {
        self.evasion = evasion.clamp(0.0, 1.0);
        self
    }

    /// Sets the accuracy, clamped to [0, 1].
    #[must_use]
    pub fn with_accuracy(mut self, accuracy: f64) -> Self {
        self.accuracy = accuracy.clamp(0.0, 1.0);
        self
    }

    /// Sets the spell element.
    #[must_use]
    pub fn with_element(mut self, element: MagicElement) -> Self {
        self.element = Some(element);
        self
    }

    /// Sets the mitigation policy.
    #[must_use]
    pub fn with_mitigation(mut self, mitigation: Mitigation) -> Self {
        self.mitigation = mitigation;
        self
    }

    /// Sets the loot value and grants [`Capabilities::LOOT`].
    #[must_use]
    pub fn with_loot(mut self, value: u32) -> Self {
        self.loot = value;
        self.capabilities |= Capabilities::LOOT;
        self
    }

    /// Returns true if every flag in `caps` is held.
    #[must_use]
    pub fn has(&self, caps: Capabilities) -> bool {
        self.capabilities.contains(caps)
    }
}

/// Mutable combat state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vitals {
    /// Health, [0, 100].
    pub health: i32,
    /// Attack power, ≥ 0.
    pub power: i32,
    /// Set once when health first reaches zero.
    pub defeated: bool,
}

impl Vitals {
    /// Fresh vitals with the values clamped to their ranges.
    #[must_use]
    pub fn new(health: i32, power: i32) -> Self {
        Self {
            health: health.clamp(0, MAX_HEALTH),
            power: power.max(0),
            defeated: false,
        }
    }
}

/// Outcome of applying damage to a combatant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DamageReceipt {
    /// Points actually removed (after mitigation and the zero floor).
    pub dealt: i32,
    /// Health after the hit.
    pub health: i32,
    /// True only on the hit that first brought health to zero.
    pub defeated_now: bool,
}

/// Player-only bookkeeping.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlayerLedger {
    /// Display name chosen by the player.
    pub name: String,
    /// Accumulated treasure points.
    pub score: u64,
    /// Carried consumables, oldest first.
    pub inventory: Vec<Item>,
}

/// A participant in combat.
#[derive(Debug)]
pub struct Combatant {
    profile: CombatProfile,
    vitals: Mutex<Vitals>,
    ledger: Option<Mutex<PlayerLedger>>,
}

impl Combatant {
    /// Creates a non-player combatant.
    #[must_use]
    pub fn new(profile: CombatProfile, vitals: Vitals) -> Self {
        Self {
            profile,
            vitals: Mutex::new(vitals),
            ledger: None,
        }
    }

    /// Creates a player combatant with an empty ledger.
    #[must_use]
    pub fn player(profile: CombatProfile, vitals: Vitals, name: impl Into<String>) -> Self {
        Self {
            profile,
            vitals: Mutex::new(vitals),
            ledger: Some(Mutex::new(PlayerLedger {
                name: name.into(),
                ..PlayerLedger::default()
            })),
        }
    }

    /// Combat parameters.
    #[must_use]
    pub const fn profile(&self) -> &CombatProfile {
        &self.profile
    }

    /// Capability set.
    #[must_use]
    pub const fn capabilities(&self) -> Capabilities {
        self.profile.capabilities
    }

    /// Copy of the current vitals.
    #[must_use]
    pub fn vitals(&self) -> Vitals {
        *self.vitals.lock()
    }

    /// Current health.
    #[must_use]
    pub fn health(&self) -> i32 {
        self.vitals.lock().health
    }

    /// Current power.
    #[must_use]
    pub fn power(&self) -> i32 {
        self.vitals.lock().power
    }

    /// Returns true once health has reached zero.
    #[must_use]
    pub fn is_defeated(&self) -> bool {
        let vitals = self.vitals.lock();
        vitals.defeated || vitals.health <= 0
    }

    /// Applies mitigated damage.
    pub fn receive_damage(&self, amount: i32, kind: DamageKind) -> DamageReceipt {
        let dealt = self.profile.mitigation.apply(amount, kind);
        let mut vitals = self.vitals.lock();
        let before = vitals.health;
        vitals.health = (before - dealt).clamp(0, MAX_HEALTH);
        let defeated_now = vitals.health == 0 && !vitals.defeated;
        if defeated_now {
            vitals.defeated = true;
        }
        DamageReceipt {
            dealt: before - vitals.health,
            health: vitals.health,
            defeated_now,
        }
    }

    /// Restores health, capped at [`MAX_HEALTH`]. Returns the new health.
    pub fn heal(&self, amount: i32) -> i32 {
        let mut vitals = self.vitals.lock();
        if amount > 0 && !vitals.defeated {
            vitals.health = (vitals.health + amount).min(MAX_HEALTH);
        }
        vitals.health
    }

    /// Raises power. Returns the new power.
    pub fn boost_power(&self, amount: i32) -> i32 {
        let mut vitals = self.vitals.lock();
        vitals.power = (vitals.power + amount.max(0)).max(0);
        vitals.power
    }

    /// Flags the combatant as defeated. Returns true only on the first call.
    pub fn mark_defeated(&self) -> bool {
        let mut vitals = self.vitals.lock();
        let first = !vitals.defeated;
        vitals.defeated = true;
        first
    }

    /// Overwrites the vitals (used by snapshot restore).
    pub fn restore_vitals(&self, vitals: Vitals) {
        *self.vitals.lock() = vitals;
    }

    /// Player ledger, if this is a player.
    #[must_use]
    pub fn ledger(&self) -> Option<&Mutex<PlayerLedger>> {
        self.ledger.as_ref()
    }

    /// Adds treasure points. No-op for non-players.
    pub fn credit_score(&self, value: u64) {
        if let Some(ledger) = &self.ledger {
            ledger.lock().score += value;
        }
    }

    /// Accumulated treasure points (zero for non-players).
    #[must_use]
    pub fn score(&self) -> u64 {
        self.ledger.as_ref().map_or(0, |ledger| ledger.lock().score)
    }
}

/// Kind of map item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ItemKind {
    /// Impassable terrain.
    Wall,
    /// Restores health.
    Potion,
    /// Raises power.
    PowerPotion,
    /// Worth treasure points.
    Treasure,
}

impl ItemKind {
    /// Returns true for items that prevent movement.
    #[must_use]
    pub const fn is_blocking(self) -> bool {
        matches!(self, Self::Wall)
    }

    /// Returns true for items the player can pick up or use.
    #[must_use]
    pub const fn is_interactable(self) -> bool {
        !self.is_blocking()
    }
}

/// A map item and its effect magnitude.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    kind: ItemKind,
    amount: i32,
    claimed: bool,
}

impl Item {
    /// An impassable wall.
    #[must_use]
    pub const fn wall() -> Self {
        Self::new(ItemKind::Wall, 0)
    }

    /// A healing potion restoring `heal` health.
    #[must_use]
    pub const fn potion(heal: i32) -> Self {
        Self::new(ItemKind::Potion, heal)
    }

    /// A power potion adding `boost` power.
    #[must_use]
    pub const fn power_potion(boost: i32) -> Self {
        Self::new(ItemKind::PowerPotion, boost)
    }

    /// Treasure worth `value` points.
    #[must_use]
    pub fn treasure(value: u32) -> Self {
        Self::new(ItemKind::Treasure, i32::try_from(value).unwrap_or(i32::MAX))
    }

    /// Treasure whose value was already credited when it dropped.
    #[must_use]
    pub fn claimed_treasure(value: u32) -> Self {
        Self {
            claimed: true,
            ..Self::treasure(value)
        }
    }

    const fn new(kind: ItemKind, amount: i32) -> Self {
        Self {
            kind,
            amount,
            claimed: false,
        }
    }

    /// Item kind.
    #[must_use]
    pub const fn kind(&self) -> ItemKind {
        self.kind
    }

    /// Heal amount, power boost or treasure value.
    #[must_use]
    pub const fn amount(&self) -> i32 {
        self.amount
    }

    /// Returns true for treasure already credited to a player.
    #[must_use]
    pub const fn is_claimed(&self) -> bool {
        self.claimed
    }

    /// Returns true if the item prevents movement.
    #[must_use]
    pub const fn is_blocking(&self) -> bool {
        self.kind.is_blocking()
    }
}
