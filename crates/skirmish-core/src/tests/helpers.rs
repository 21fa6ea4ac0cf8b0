//! Test helpers for setting up worlds and combatants.
//!
//! Everything built here is deterministic: zero evasion unless asked for, no
//! rolled stats, and a 10×10 grid.

use std::sync::Arc;

use tessera::{Coordinate, GridBounds};

use crate::entity::{
    Body, Capabilities, CombatProfile, Combatant, EnemyKind, Entity, EntityKind, PlayerClass,
    Vitals,
};
use crate::world::World;

/// Health of the player built by [`world_with_player`].
pub const PLAYER_HEALTH: i32 = 100;

/// Power of the player built by [`world_with_player`].
pub const PLAYER_POWER: i32 = 5;

/// Loot carried by enemies built with [`enemy_with`].
pub const ENEMY_LOOT: u32 = 150;

/// A 10×10 world holding one unarmoured, never-evading melee player.
pub fn world_with_player(at: Coordinate) -> (Arc<World>, Arc<Entity>) {
    let world = Arc::new(World::new(GridBounds::default()));
    let profile = CombatProfile::new(Capabilities::PHYSICAL | Capabilities::MELEE).with_evasion(0.0);
    let player = player_with(&world, at, profile, PLAYER_POWER);
    (world, player)
}

/// Adds a player with `profile` and full health.
pub fn player_with(world: &World, at: Coordinate, profile: CombatProfile, power: i32) -> Arc<Entity> {
    let player = Arc::new(Entity::new(
        world.allocate_id(),
        EntityKind::Player(PlayerClass::Warrior),
        "Hero",
        at,
        Body::Combatant(Combatant::player(profile, Vitals::new(PLAYER_HEALTH, power), "Hero")),
    ));
    assert!(world.add_player(Arc::clone(&player)), "player placed at {at}");
    player
}

/// Adds a melee goblin with fixed stats and [`ENEMY_LOOT`].
pub fn enemy_with(world: &World, at: Coordinate, health: i32, power: i32, evasion: f64) -> Arc<Entity> {
    let profile = CombatProfile::new(Capabilities::PHYSICAL | Capabilities::MELEE)
        .with_evasion(evasion)
        .with_loot(ENEMY_LOOT);
    let enemy = Arc::new(Entity::new(
        world.allocate_id(),
        EntityKind::Enemy(EnemyKind::Goblin),
        "Goblin",
        at,
        Body::Combatant(Combatant::new(profile, Vitals::new(health, power))),
    ));
    assert!(world.add_enemy(Arc::clone(&enemy)), "enemy placed at {at}");
    enemy
}
