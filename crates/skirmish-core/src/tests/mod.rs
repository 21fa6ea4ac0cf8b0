//! Crate-level tests.
//!
//! - `helpers.rs`: world and combatant setup shared by unit tests
//! - `concurrency.rs`: races between agents, the player and the pool
//! - `scenarios.rs`: end-to-end combat and save/undo scenarios

pub mod helpers;
