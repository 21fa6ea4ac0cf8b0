//! Initial map population.

use std::sync::Arc;

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tessera::Coordinate;

use super::World;
use crate::entity::{EnemyKind, Entity, Item};
use crate::factory::EnemyFactory;

/// Counts of what [`MapPopulator::populate`] placed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PopulationSummary {
    /// Enemies added
    pub enemies: usize,
    /// Walls added
    pub walls: usize,
    /// Healing potions added
    pub potions: usize,
    /// Power potions added
    pub power_potions: usize,
}

impl PopulationSummary {
    /// Total entities placed.
    #[must_use]
    pub const fn total(&self) -> usize {
        self.enemies + self.walls + self.potions + self.power_potions
    }
}

/// Fills every unoccupied cell by a percentile roll:
/// 40 empty, 30 enemy, 10 wall, 15 potion, 5 power potion.
pub struct MapPopulator<'a> {
    factory: &'a dyn EnemyFactory,
}

impl<'a> MapPopulator<'a> {
    /// A populator building its enemies with `factory`.
    #[must_use]
    pub fn new(factory: &'a dyn EnemyFactory) -> Self {
        Self { factory }
    }

    /// Populates `world`, leaving occupied cells (the player's) alone.
    pub fn populate<R: Rng>(&self, world: &World, rng: &mut R) -> PopulationSummary {
        let mut summary = PopulationSummary::default();

        for at in world.bounds().cells() {
            if world.registry().is_occupied(at) {
                continue;
            }
            let roll = rng.gen_range(0..100_u32);
            let added = match roll {
                0..=39 => continue,
                40..=69 => {
                    let kind = EnemyKind::ALL.choose(rng).copied().unwrap_or(EnemyKind::Goblin);
                    let enemy = self
                        .factory
                        .build_enemy(kind, world.allocate_id(), at, &mut *rng);
                    world.add_enemy(Arc::new(enemy)).then_some(&mut summary.enemies)
                }
                70..=79 => Self::add_item(world, Item::wall(), at).then_some(&mut summary.walls),
                80..=94 => {
                    let potion = Item::potion(rng.gen_range(10..=50));
                    Self::add_item(world, potion, at).then_some(&mut summary.potions)
                }
                _ => {
                    let potion = Item::power_potion(rng.gen_range(1..=5));
                    Self::add_item(world, potion, at).then_some(&mut summary.power_potions)
                }
            };
            match added {
                Some(count) => *count += 1,
                None => tracing::warn!(cell = %at, "populator could not place entity"),
            }
        }

        tracing::info!(?summary, "map populated");
        summary
    }

    fn add_item(world: &World, item: Item, at: Coordinate) -> bool {
        world.add_item(Arc::new(Entity::item(world.allocate_id(), item, at)))
    }
}
