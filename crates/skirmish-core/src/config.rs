//! Engine configuration.
//!
//! Every tunable of the agent loop, the worker pool and the caretaker lives
//! here. [`EngineConfig::default`] reproduces the stock game: a 10×10 grid,
//! vision 5, melee reach 1, agents ticking every 500 to 1500 ms, 20 % wander
//! chance, a pool of `clamp(floor(area × 0.03), 1, 10)` workers and ten levels
//! of undo.
//!
//! # Example
//!
//! ```
//! use skirmish_core::config::EngineConfig;
//!
//! let config = EngineConfig::from_json_str(r#"{ "grid": { "rows": 20, "cols": 20 } }"#).unwrap();
//! assert_eq!(config.grid.area(), 400);
//! assert_eq!(config.agent.vision_range, 5);
//! ```

use std::time::Duration;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tessera::GridBounds;
use thiserror::Error;

use crate::entity::EntityId;
use crate::memento::DEFAULT_HISTORY;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A field holds a value outside its legal range.
    #[error("invalid value for `{field}`: {reason}")]
    Invalid {
        /// Dotted path of the offending field
        field: &'static str,
        /// What is wrong with it
        reason: String,
    },
    /// The JSON document could not be parsed.
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Timing and perception parameters of one enemy agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Manhattan distance within which the player is noticed.
    pub vision_range: u32,
    /// Manhattan distance within which the agent attacks instead of moving.
    pub melee_range: u32,
    /// Lower bound of the inter-cycle delay, in milliseconds.
    pub min_delay_ms: u64,
    /// Upper bound (exclusive unless equal to the lower bound) of the delay.
    pub max_delay_ms: u64,
    /// Chance of a random step when the player is out of sight.
    pub wander_chance: f64,
    /// Bounded wait for a destination cell lock.
    pub move_lock_timeout_ms: u64,
    /// Bounded wait for the player lock. Zero means a single try.
    pub player_lock_timeout_ms: u64,
}

impl AgentConfig {
    /// Draws one inter-cycle delay.
    pub fn sample_delay<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        let millis = if self.min_delay_ms < self.max_delay_ms {
            rng.gen_range(self.min_delay_ms..self.max_delay_ms)
        } else {
            self.min_delay_ms
        };
        Duration::from_millis(millis)
    }

    /// Destination cell lock timeout.
    #[must_use]
    pub const fn move_lock_timeout(&self) -> Duration {
        Duration::from_millis(self.move_lock_timeout_ms)
    }

    /// Player lock timeout.
    #[must_use]
    pub const fn player_lock_timeout(&self) -> Duration {
        Duration::from_millis(self.player_lock_timeout_ms)
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            vision_range: 5,
            melee_range: 1,
            min_delay_ms: 500,
            max_delay_ms: 1500,
            wander_chance: 0.2,
            move_lock_timeout_ms: 50,
            player_lock_timeout_ms: 0,
        }
    }
}

/// Sizing of the dynamic agent pool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PopulationConfig {
    /// Workers per grid cell before clamping.
    pub ratio: f64,
    /// Lower clamp on the worker count.
    pub min_workers: usize,
    /// Upper clamp on the worker count.
    pub max_workers: usize,
    /// Random probes made when looking for a free spawn cell.
    pub spawn_attempts: u32,
}

impl Default for PopulationConfig {
    fn default() -> Self {
        Self {
            ratio: 0.03,
            min_workers: 1,
            max_workers: 10,
            spawn_attempts: 100,
        }
    }
}

/// Top-level engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// World extent.
    pub grid: GridBounds,
    /// Per-agent behaviour.
    pub agent: AgentConfig,
    /// Dynamic pool sizing.
    pub population: PopulationConfig,
    /// Maximum number of snapshots kept for undo.
    pub history_capacity: usize,
    /// Master seed. `None` seeds every RNG from entropy.
    pub seed: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            grid: GridBounds::default(),
            agent: AgentConfig::default(),
            population: PopulationConfig::default(),
            history_capacity: DEFAULT_HISTORY,
            seed: None,
        }
    }
}

impl EngineConfig {
    /// Parses a JSON document (missing fields take their defaults) and
    /// validates it.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed JSON and
    /// [`ConfigError::Invalid`] for out-of-range values.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks every field against its legal range.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError::Invalid`] found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.grid.rows == 0 || self.grid.cols == 0 {
            return Err(invalid("grid", "dimensions must be non-zero"));
        }
        if self.agent.min_delay_ms > self.agent.max_delay_ms {
            return Err(invalid("agent.min_delay_ms", "exceeds agent.max_delay_ms"));
        }
        if !(0.0..=1.0).contains(&self.agent.wander_chance) {
            return Err(invalid("agent.wander_chance", "must lie in [0, 1]"));
        }
        if !(self.population.ratio >= 0.0 && self.population.ratio.is_finite()) {
            return Err(invalid("population.ratio", "must be a non-negative number"));
        }
        if self.population.min_workers == 0 {
            return Err(invalid("population.min_workers", "must be at least 1"));
        }
        if self.population.min_workers > self.population.max_workers {
            return Err(invalid(
                "population.min_workers",
                "exceeds population.max_workers",
            ));
        }
        if self.history_capacity == 0 {
            return Err(invalid("history_capacity", "must be at least 1"));
        }
        Ok(())
    }

    /// RNG for one agent: derived from the master seed and the entity id when
    /// seeded, otherwise from entropy.
    #[must_use]
    pub fn agent_rng(&self, id: EntityId) -> ChaCha8Rng {
        match self.seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed ^ id.as_u64()),
            None => ChaCha8Rng::from_entropy(),
        }
    }

    /// RNG for world-level decisions (spawning, population).
    #[must_use]
    pub fn world_rng(&self) -> ChaCha8Rng {
        match self.seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        }
    }
}

fn invalid(field: &'static str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.to_string(),
    }
}
