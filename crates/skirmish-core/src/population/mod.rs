//! Supervision of enemy agents.
//!
//! Two policies are provided:
//!
//! - [`AgentRoster`]: one dedicated thread per enemy already on the map, all
//!   stopped together through a shared [`RunSwitch`](crate::agent::RunSwitch).
//! - [`PopulationManager`]: a bounded worker pool sized from the map area. It
//!   spawns fresh enemies and replaces each one that dies, until stopped.
//!
//! Both stop promptly: stopping wakes sleeping agents, and neither launches a
//! new agent once stop has been requested.

mod pool;
mod roster;

pub use pool::PopulationManager;
pub use roster::AgentRoster;

use thiserror::Error;

use crate::config::PopulationConfig;

/// Errors from starting a population.
#[derive(Debug, Error)]
pub enum PopulationError {
    /// The worker pool could not be built.
    #[error("failed to build worker pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),
    /// An agent thread could not be spawned.
    #[error("failed to spawn agent thread: {0}")]
    Spawn(#[from] std::io::Error),
    /// `start` was called twice, or after `stop`.
    #[error("population already started")]
    AlreadyStarted,
}

/// Worker count for a map of `area` cells: `floor(area * ratio)` clamped to
/// `[min_workers, max_workers]`.
///
/// # Example
///
/// ```
/// use skirmish_core::config::PopulationConfig;
/// use skirmish_core::population::pool_size;
///
/// let config = PopulationConfig::default();
/// assert_eq!(pool_size(1, &config), 1);
/// assert_eq!(pool_size(100, &config), 3);
/// assert_eq!(pool_size(10_000, &config), 10);
/// ```
#[must_use]
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn pool_size(area: u64, config: &PopulationConfig) -> usize {
    let scaled = (area as f64 * config.ratio).floor().max(0.0) as usize;
    scaled.max(config.min_workers).min(config.max_workers.max(config.min_workers))
}
