//! Player-initiated actions.
//!
//! These run on the caller's thread (UI or test) and follow the same lock
//! discipline as the agents: movement goes through the cell-lock protocol and
//! anything touching the player's health holds the player lock. Every wait is
//! bounded by [`World::action_timeout`]; a timeout surfaces as
//! [`ActionError::Contention`] and changes nothing.

use std::sync::Arc;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tessera::{Coordinate, MoveOutcome, MoveRule};
use thiserror::Error;

use super::World;
use crate::combat::{CombatError, CombatReport, CombatResolver};
use crate::entity::{Entity, EntityId, ItemKind};

/// Why a player action did not happen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ActionError {
    /// A lock could not be taken in time; nothing changed.
    #[error("lock contention, action skipped")]
    Contention,
    /// The destination cannot be entered.
    #[error("cell {0} is blocked")]
    Blocked(Coordinate),
    /// Moves are one orthogonal step at a time.
    #[error("{to} is not adjacent to {from}")]
    NotAdjacent {
        /// Current cell
        from: Coordinate,
        /// Requested cell
        to: Coordinate,
    },
    /// The target is not in the world.
    #[error("no such entity: {0}")]
    NoSuchEntity(EntityId),
    /// The player can no longer act.
    #[error("player is defeated")]
    PlayerDefeated,
    /// The world has no player.
    #[error("no player in the world")]
    NoPlayer,
    /// Nothing of the requested kind is carried.
    #[error("no {0:?} in inventory")]
    EmptyInventory(ItemKind),
    /// The attack did not land.
    #[error(transparent)]
    Combat(#[from] CombatError),
}

/// What happened when the player met an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Interaction {
    /// A consumable went into the inventory.
    Stored {
        /// The picked-up item
        item: EntityId,
        /// Its kind
        kind: ItemKind,
        /// Heal or boost amount
        amount: i32,
    },
    /// Treasure was collected.
    Collected {
        /// The treasure item
        item: EntityId,
        /// Points credited (zero if already credited at the drop)
        value: u64,
    },
}

/// A completed player move.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerMove {
    /// Previous cell.
    pub from: Coordinate,
    /// New cell.
    pub to: Coordinate,
    /// Items picked up on arrival.
    pub interactions: Vec<Interaction>,
}

impl World {
    /// Moves the player one step and interacts with whatever lies there.
    ///
    /// # Errors
    ///
    /// [`ActionError::NotAdjacent`] for non-unit steps,
    /// [`ActionError::Blocked`] for walls, enemies or out-of-bounds cells,
    /// [`ActionError::Contention`] if the destination lock timed out.
    pub fn move_player(&self, to: Coordinate) -> Result<PlayerMove, ActionError> {
        let player = self.active_player()?;
        let from = player.coordinate();
        if from.manhattan(to) != 1 {
            return Err(ActionError::NotAdjacent { from, to });
        }

        match self.try_move(&player, to, self.action_timeout(), MoveRule::Passable) {
            MoveOutcome::Moved { .. } => {}
            MoveOutcome::Contended => {
                tracing::debug!(player = %player, cell = %to, "player move contended");
                return Err(ActionError::Contention);
            }
            MoveOutcome::Refused => return Err(ActionError::Blocked(to)),
        }
        tracing::info!(player = %player.name(), %from, %to, "player moved");

        let interactions = self
            .registry()
            .entities_at(to)
            .iter()
            .filter(|entity| entity.is_item())
            .filter_map(|item| self.interact(&player, item))
            .collect();
        Ok(PlayerMove {
            from,
            to,
            interactions,
        })
    }

    /// Applies an item's effect to the player.
    ///
    /// Consumables go to the inventory and treasure is credited; either way the
    /// item leaves the world. Walls and items no longer in the world yield
    /// `None`.
    pub fn interact(&self, player: &Entity, item: &Arc<Entity>) -> Option<Interaction> {
        let stats = player.as_combatant()?;
        let ledger = stats.ledger()?;
        let payload = *item.as_item()?;
        if !payload.kind().is_interactable() {
            return None;
        }
        // Whoever removes the item owns its effect.
        if !self.remove_item(item) {
            return None;
        }

        let interaction = match payload.kind() {
            ItemKind::Treasure => {
                let value = if payload.is_claimed() {
                    0
                } else {
                    u64::try_from(payload.amount()).unwrap_or(0)
                };
                stats.credit_score(value);
                Interaction::Collected {
                    item: item.id(),
                    value,
                }
            }
            kind => {
                ledger.lock().inventory.push(payload);
                Interaction::Stored {
                    item: item.id(),
                    kind,
                    amount: payload.amount(),
                }
            }
        };
        tracing::info!(player = %player.name(), ?interaction, "item picked up");
        Some(interaction)
    }

    /// The player attacks an enemy while holding the player lock.
    ///
    /// # Errors
    ///
    /// [`ActionError::NoSuchEntity`] if the enemy is gone,
    /// [`ActionError::Contention`] if the player is busy being attacked,
    /// [`ActionError::Combat`] if the attack did not land.
    pub fn player_attack<R: Rng + ?Sized>(
        &self,
        target: EntityId,
        rng: &mut R,
    ) -> Result<CombatReport, ActionError> {
        let player = self.active_player()?;
        let enemy = self.enemy(target).ok_or(ActionError::NoSuchEntity(target))?;
        let _guard = self
            .try_lock_player(self.action_timeout())
            .ok_or(ActionError::Contention)?;
        Ok(CombatResolver::new().resolve(&player, &enemy, self, rng)?)
    }

    /// Drinks the oldest healing potion. Returns the new health.
    ///
    /// # Errors
    ///
    /// [`ActionError::EmptyInventory`] if no potion is carried.
    pub fn use_potion(&self) -> Result<i32, ActionError> {
        self.consume(ItemKind::Potion)
    }

    /// Drinks the oldest power potion. Returns the new power.
    ///
    /// # Errors
    ///
    /// [`ActionError::EmptyInventory`] if no power potion is carried.
    pub fn use_power_potion(&self) -> Result<i32, ActionError> {
        self.consume(ItemKind::PowerPotion)
    }

    fn consume(&self, kind: ItemKind) -> Result<i32, ActionError> {
        let player = self.active_player()?;
        let stats = player.as_combatant().ok_or(ActionError::NoPlayer)?;
        let ledger = stats.ledger().ok_or(ActionError::NoPlayer)?;
        let _guard = self
            .try_lock_player(self.action_timeout())
            .ok_or(ActionError::Contention)?;

        let item = {
            let mut ledger = ledger.lock();
            let index = ledger
                .inventory
                .iter()
                .position(|item| item.kind() == kind)
                .ok_or(ActionError::EmptyInventory(kind))?;
            ledger.inventory.remove(index)
        };
        let value = match kind {
            ItemKind::PowerPotion => stats.boost_power(item.amount()),
            _ => stats.heal(item.amount()),
        };
        tracing::info!(player = %player.name(), ?kind, amount = item.amount(), value, "potion used");
        Ok(value)
    }

    fn active_player(&self) -> Result<Arc<Entity>, ActionError> {
        let player = self.player().ok_or(ActionError::NoPlayer)?;
        if player.is_defeated() {
            return Err(ActionError::PlayerDefeated);
        }
        Ok(player)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::Item;
    use crate::tests::helpers::{enemy_with, world_with_player};
    use rand::rngs::mock::StepRng;

    fn place_item(world: &World, item: Item, at: Coordinate) -> Arc<Entity> {
        let entity = Arc::new(Entity::item(world.allocate_id(), item, at));
        assert!(world.add_item(Arc::clone(&entity)));
        entity
    }

    mod movement_tests {
        use super::*;

        #[test]
        fn player_moves_one_step() {
            let (world, player) = world_with_player(Coordinate::new(0, 0));
            let step = world.move_player(Coordinate::new(0, 1)).unwrap();
            assert_eq!(step.from, Coordinate::new(0, 0));
            assert_eq!(player.coordinate(), Coordinate::new(0, 1));
            assert!(step.interactions.is_empty());
        }

        #[test]
        fn diagonal_and_long_moves_rejected() {
            let (world, _) = world_with_player(Coordinate::new(2, 2));
            assert!(matches!(
                world.move_player(Coordinate::new(3, 3)),
                Err(ActionError::NotAdjacent { .. })
            ));
            assert!(matches!(
                world.move_player(Coordinate::new(2, 4)),
                Err(ActionError::NotAdjacent { .. })
            ));
        }

        #[test]
        fn walls_enemies_and_edges_block() {
            let (world, _) = world_with_player(Coordinate::new(0, 0));
            place_item(&world, Item::wall(), Coordinate::new(0, 1));
            enemy_with(&world, Coordinate::new(1, 0), 10, 5, 0.0);

            assert_eq!(
                world.move_player(Coordinate::new(0, 1)),
                Err(ActionError::Blocked(Coordinate::new(0, 1)))
            );
            assert_eq!(
                world.move_player(Coordinate::new(1, 0)),
                Err(ActionError::Blocked(Coordinate::new(1, 0)))
            );
            assert_eq!(
                world.move_player(Coordinate::new(-1, 0)),
                Err(ActionError::Blocked(Coordinate::new(-1, 0)))
            );
        }

        #[test]
        fn held_destination_lock_is_contention() {
            let (world, player) = world_with_player(Coordinate::new(0, 0));
            let _held = world
                .registry()
                .cell_locks()
                .try_acquire(Coordinate::new(0, 1), std::time::Duration::from_millis(10))
                .unwrap();
            assert_eq!(world.move_player(Coordinate::new(0, 1)), Err(ActionError::Contention));
            assert_eq!(player.coordinate(), Coordinate::new(0, 0));
        }
    }

    mod item_tests {
        use super::*;

        #[test]
        fn potions_are_stored_then_used() {
            let (world, player) = world_with_player(Coordinate::new(0, 0));
            let potion = place_item(&world, Item::potion(30), Coordinate::new(0, 1));
            player.as_combatant().unwrap().receive_damage(50, crate::combat::DamageKind::Physical);

            let step = world.move_player(Coordinate::new(0, 1)).unwrap();
            assert_eq!(
                step.interactions,
                vec![Interaction::Stored {
                    item: potion.id(),
                    kind: ItemKind::Potion,
                    amount: 30
                }]
            );
            assert!(!world.contains(potion.id()));
            assert_eq!(world.registry().entities_at(Coordinate::new(0, 1)).len(), 1);

            assert_eq!(world.use_potion(), Ok(80));
            assert_eq!(world.use_potion(), Err(ActionError::EmptyInventory(ItemKind::Potion)));
        }

        #[test]
        fn power_potion_raises_power() {
            let (world, player) = world_with_player(Coordinate::new(0, 0));
            place_item(&world, Item::power_potion(4), Coordinate::new(1, 0));
            let before = player.as_combatant().unwrap().power();

            world.move_player(Coordinate::new(1, 0)).unwrap();
            assert_eq!(world.use_power_potion(), Ok(before + 4));
        }

        #[test]
        fn treasure_credits_score_unless_claimed() {
            let (world, player) = world_with_player(Coordinate::new(0, 0));
            place_item(&world, Item::treasure(150), Coordinate::new(0, 1));
            place_item(&world, Item::claimed_treasure(200), Coordinate::new(0, 2));

            world.move_player(Coordinate::new(0, 1)).unwrap();
            let step = world.move_player(Coordinate::new(0, 2)).unwrap();
            assert!(matches!(
                step.interactions[..],
                [Interaction::Collected { value: 0, .. }]
            ));
            assert_eq!(player.as_combatant().unwrap().score(), 150);
            assert!(world.items().is_empty());
        }
    }

    mod attack_tests {
        use super::*;

        #[test]
        fn attack_requires_known_enemy() {
            let (world, _) = world_with_player(Coordinate::new(0, 0));
            let ghost = EntityId::new(999);
            assert_eq!(
                world.player_attack(ghost, &mut StepRng::new(u64::MAX, 0)),
                Err(ActionError::NoSuchEntity(ghost))
            );
        }

        #[test]
        fn busy_player_cannot_attack() {
            let (world, _) = world_with_player(Coordinate::new(0, 0));
            let goblin = enemy_with(&world, Coordinate::new(0, 1), 10, 5, 0.0);
            let _busy = world.try_lock_player(std::time::Duration::ZERO).unwrap();

            assert_eq!(
                world.player_attack(goblin.id(), &mut StepRng::new(u64::MAX, 0)),
                Err(ActionError::Contention)
            );
            assert_eq!(goblin.as_combatant().unwrap().health(), 10);
        }

        #[test]
        fn combat_errors_pass_through() {
            let (world, _) = world_with_player(Coordinate::new(0, 0));
            let goblin = enemy_with(&world, Coordinate::new(4, 4), 10, 5, 0.0);
            assert!(matches!(
                world.player_attack(goblin.id(), &mut StepRng::new(u64::MAX, 0)),
                Err(ActionError::Combat(CombatError::OutOfRange { .. }))
            ));
        }

        #[test]
        fn defeated_player_cannot_act() {
            let (world, player) = world_with_player(Coordinate::new(0, 0));
            player.as_combatant().unwrap().receive_damage(500, crate::combat::DamageKind::Physical);
            assert_eq!(world.move_player(Coordinate::new(0, 1)), Err(ActionError::PlayerDefeated));
            assert_eq!(world.use_potion(), Err(ActionError::PlayerDefeated));
        }
    }
}
