//! # Skirmish Core
//!
//! Concurrent agent/world engine for grid combat.
//!
//! A shared [`World`](world::World) is perceived and mutated at the same time
//! by autonomous enemy agents and by a player. Placement changes go through
//! the per-cell lock protocol of [`tessera`]; attacks on the player are
//! serialised by a fair player lock; every attack is resolved by the
//! stateless [`CombatResolver`](combat::CombatResolver).
//!
//! ## Architecture
//!
//! - **Entities**: players, enemies and items with capability flags
//! - **Combat**: range, evasion, damage, criticals, counterattack, loot
//! - **Agents**: randomized decide/act loops with cancellable sleeps
//! - **Population**: a fixed roster or a self-replenishing worker pool
//! - **Memento**: bounded save/undo history of the placement map
//!
//! ## Usage
//!
//! ```rust,ignore
//! use skirmish_core::prelude::*;
//!
//! let world = Arc::new(World::new(config.grid));
//! world.add_player(Arc::new(PlayerBuilder::new(PlayerClass::Warrior).build(world.allocate_id(), &mut rng)));
//! MapPopulator::new(&StandardEnemyFactory).populate(&world, &mut rng);
//!
//! let mut roster = AgentRoster::new(Arc::clone(&world), config);
//! roster.start()?;
//! world.move_player(Coordinate::new(0, 1))?;
//! roster.stop();
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

// Re-export the grid substrate
pub use tessera;

pub mod agent;
pub mod combat;
pub mod config;
pub mod entity;
pub mod factory;
pub mod memento;
pub mod population;
pub mod telemetry;
pub mod world;

#[cfg(test)]
mod tests;

/// Commonly used types.
pub mod prelude {
    pub use std::sync::Arc;

    pub use tessera::{Coordinate, GridBounds};

    pub use crate::agent::{AgentExit, EnemyAgent, RunSwitch};
    pub use crate::combat::{CombatError, CombatReport, CombatResolver};
    pub use crate::config::EngineConfig;
    pub use crate::entity::{EnemyKind, Entity, EntityId, Item, PlayerClass};
    pub use crate::factory::{EnemyFactory, PlayerBuilder, StandardEnemyFactory};
    pub use crate::memento::{Caretaker, UndoOutcome};
    pub use crate::population::{AgentRoster, PopulationManager};
    pub use crate::world::{ActionError, MapPopulator, World, WorldChange, WorldObserver};
}
