//! Enemy agent loop.
//!
//! Each enemy is driven by one [`EnemyAgent`] running on its own thread (or
//! pool worker). A cycle is: sleep a random delay, look at the player, decide,
//! act. Acting never blocks without a bound; a lock that cannot be had in time
//! turns the cycle into [`AgentAction::Contended`] and the agent carries on.
//!
//! Cancellation goes through a [`RunSwitch`]. Stopping it clears the shared
//! flag and wakes every agent that is asleep, so shutdown does not wait out
//! the remaining delay.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use rand::seq::SliceRandom;
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use tessera::{Coordinate, MoveOutcome, MoveRule};

use crate::combat::{CombatError, CombatReport, CombatResolver};
use crate::config::AgentConfig;
use crate::entity::Entity;
use crate::world::World;

// ============================================================================
// Cancellation
// ============================================================================

/// Owning side of a shared running flag.
///
/// Created running. [`RunSwitch::stop`] is permanent.
pub struct RunSwitch {
    running: Arc<AtomicBool>,
    wake: Mutex<Option<Sender<()>>>,
    sleeper: Receiver<()>,
}

impl RunSwitch {
    /// A switch in the running position.
    #[must_use]
    pub fn new() -> Self {
        let (wake, sleeper) = crossbeam_channel::bounded(0);
        Self {
            running: Arc::new(AtomicBool::new(true)),
            wake: Mutex::new(Some(wake)),
            sleeper,
        }
    }

    /// A flag observing this switch.
    #[must_use]
    pub fn flag(&self) -> RunFlag {
        RunFlag {
            running: Arc::clone(&self.running),
            sleeper: self.sleeper.clone(),
        }
    }

    /// Returns true until [`RunSwitch::stop`] is called.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Clears the flag and wakes every sleeping agent.
    pub fn stop(&self) {
        self.running.store(false, Ordering::Release);
        // Dropping the only sender disconnects every sleeper at once.
        self.wake.lock().take();
    }
}

impl Default for RunSwitch {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for RunSwitch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunSwitch")
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}

/// Observing side of a [`RunSwitch`].
#[derive(Clone)]
pub struct RunFlag {
    running: Arc<AtomicBool>,
    sleeper: Receiver<()>,
}

impl RunFlag {
    /// Returns true while the switch is running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Sleeps for `duration` unless stopped first.
    ///
    /// Returns true if the full duration elapsed and the switch is still
    /// running.
    pub fn sleep(&self, duration: Duration) -> bool {
        if !self.is_running() {
            return false;
        }
        match self.sleeper.recv_timeout(duration) {
            Err(RecvTimeoutError::Timeout) => self.is_running(),
            Ok(()) | Err(RecvTimeoutError::Disconnected) => false,
        }
    }
}

impl fmt::Debug for RunFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunFlag")
            .field("running", &self.is_running())
            .finish()
    }
}

// ============================================================================
// Decision
// ============================================================================

/// Lifecycle of an agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AgentState {
    /// Sleeping between cycles.
    Idle,
    /// Looking at the world.
    Deciding,
    /// Executing the chosen intent.
    Acting,
    /// The loop has exited.
    Terminated,
}

/// What an agent chose to do this cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    /// Attack the player.
    Attack,
    /// Step toward the player.
    Approach(Coordinate),
    /// Step to a random neighbour.
    Wander(Coordinate),
    /// Do nothing.
    Idle,
}

/// Picks an intent from the agent's cell and the player's, if visible.
///
/// Within melee range the agent attacks; within vision it steps toward the
/// player (one unit on each axis); otherwise it wanders with
/// `wander_chance` or idles.
pub fn decide<R: Rng + ?Sized>(
    at: Coordinate,
    player_at: Option<Coordinate>,
    config: &AgentConfig,
    rng: &mut R,
) -> Intent {
    if let Some(target) = player_at {
        let distance = at.manhattan(target);
        if distance <= config.vision_range {
            if distance <= config.melee_range {
                return Intent::Attack;
            }
            return Intent::Approach(at.step_toward(target));
        }
    }
    if rng.gen_bool(config.wander_chance) {
        if let Some(next) = at.neighbors().choose(rng) {
            return Intent::Wander(*next);
        }
    }
    Intent::Idle
}

// ============================================================================
// Agent
// ============================================================================

/// Result of one agent cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentAction {
    /// The resolver ran against the player.
    Attacked(Result<CombatReport, CombatError>),
    /// The agent changed cell.
    Moved {
        /// Previous cell
        from: Coordinate,
        /// New cell
        to: Coordinate,
    },
    /// A lock could not be had in time; nothing changed.
    Contended,
    /// The destination was occupied or off the grid.
    Blocked,
    /// Nothing to do.
    Idled,
}

/// Why an agent loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AgentExit {
    /// The running flag was cleared.
    Stopped,
    /// The enemy's health reached zero.
    Defeated,
    /// The enemy left the world by other means (undo, removal).
    Removed,
}

impl AgentExit {
    /// Returns true if the pool should put a fresh enemy in its place.
    #[must_use]
    pub const fn wants_replacement(self) -> bool {
        !matches!(self, Self::Stopped)
    }
}

/// Autonomous decide/act loop bound to one enemy.
pub struct EnemyAgent<R = ChaCha8Rng> {
    enemy: Arc<Entity>,
    world: Arc<World>,
    config: AgentConfig,
    flag: RunFlag,
    rng: R,
    state: AgentState,
}

impl<R: Rng> EnemyAgent<R> {
    /// Binds an agent to `enemy`.
    pub fn new(enemy: Arc<Entity>, world: Arc<World>, config: AgentConfig, flag: RunFlag, rng: R) -> Self {
        Self {
            enemy,
            world,
            config,
            flag,
            rng,
            state: AgentState::Idle,
        }
    }

    /// The driven enemy.
    #[must_use]
    pub const fn enemy(&self) -> &Arc<Entity> {
        &self.enemy
    }

    /// Current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> AgentState {
        self.state
    }

    /// Returns why the loop must end, if it must.
    #[must_use]
    pub fn exit_reason(&self) -> Option<AgentExit> {
        if !self.flag.is_running() {
            Some(AgentExit::Stopped)
        } else if self.enemy.is_defeated() {
            Some(AgentExit::Defeated)
        } else if !self.world.contains(self.enemy.id()) {
            Some(AgentExit::Removed)
        } else {
            None
        }
    }

    /// Runs one decide/act cycle without sleeping.
    pub fn step(&mut self) -> AgentAction {
        self.state = AgentState::Deciding;
        let at = self.enemy.coordinate();
        let player = self.world.player().filter(|player| !player.is_defeated());
        let intent = decide(
            at,
            player.as_ref().map(|player| player.coordinate()),
            &self.config,
            &mut self.rng,
        );

        self.state = AgentState::Acting;
        let action = match (intent, player) {
            (Intent::Attack, Some(player)) => self.attack(&player),
            (Intent::Approach(to) | Intent::Wander(to), _) => self.step_to(to),
            (Intent::Attack | Intent::Idle, _) => AgentAction::Idled,
        };
        self.state = AgentState::Idle;
        action
    }

    /// Runs until stopped, defeated or removed.
    pub fn run(mut self) -> AgentExit {
        tracing::info!(enemy = %self.enemy, "agent started");
        let exit = loop {
            if let Some(exit) = self.exit_reason() {
                break exit;
            }
            let delay = self.config.sample_delay(&mut self.rng);
            if !self.flag.sleep(delay) {
                break AgentExit::Stopped;
            }
            // The world may have changed while asleep.
            if let Some(exit) = self.exit_reason() {
                break exit;
            }
            let action = self.step();
            tracing::trace!(enemy = %self.enemy.id(), ?action, "cycle");
        };
        self.state = AgentState::Terminated;
        tracing::info!(enemy = %self.enemy.id(), ?exit, "agent stopped");
        exit
    }

    fn attack(&mut self, player: &Arc<Entity>) -> AgentAction {
        let Some(_busy) = self.world.try_lock_player(self.config.player_lock_timeout()) else {
            tracing::debug!(enemy = %self.enemy.id(), "player busy, attack skipped");
            return AgentAction::Contended;
        };
        let outcome = CombatResolver::new().resolve(&self.enemy, player, &self.world, &mut self.rng);
        if let Err(err) = &outcome {
            tracing::debug!(enemy = %self.enemy.id(), %err, "attack failed");
        }
        AgentAction::Attacked(outcome)
    }

    fn step_to(&self, to: Coordinate) -> AgentAction {
        match self
            .world
            .try_move(&self.enemy, to, self.config.move_lock_timeout(), MoveRule::VacantOnly)
        {
            MoveOutcome::Moved { from, to } => {
                tracing::debug!(enemy = %self.enemy.id(), %from, %to, "enemy moved");
                AgentAction::Moved { from, to }
            }
            MoveOutcome::Contended => {
                tracing::debug!(enemy = %self.enemy.id(), cell = %to, "move contended");
                AgentAction::Contended
            }
            MoveOutcome::Refused => AgentAction::Blocked,
        }
    }
}

impl<R> fmt::Debug for EnemyAgent<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnemyAgent")
            .field("enemy", &self.enemy.id())
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}
