//! Dynamic pool: a bounded set of workers, each driving one enemy, with
//! replacements spawned as enemies fall.

use std::fmt;
use std::sync::Arc;

use parking_lot::{Condvar, Mutex};
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use rayon::{ThreadPool, ThreadPoolBuilder};
use tessera::{Coordinate, MoveOutcome};

use super::{pool_size, PopulationError};
use crate::agent::{EnemyAgent, RunSwitch};
use crate::config::EngineConfig;
use crate::entity::Entity;
use crate::factory::{choose_enemy_kind, EnemyFactory};
use crate::world::World;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Ready,
    Running,
    Stopped,
}

/// State shared by the manager and every worker.
struct Supervisor {
    world: Arc<World>,
    factory: Arc<dyn EnemyFactory>,
    config: EngineConfig,
    // Held while launching, so a stop request either precedes a launch
    // (which then does nothing) or waits for it to be counted.
    phase: Mutex<Phase>,
    switch: RunSwitch,
    active: Mutex<usize>,
    drained: Condvar,
    rng: Mutex<ChaCha8Rng>,
}

impl Supervisor {
    /// Spawns an enemy and schedules its agent with `schedule`, unless the
    /// pool is no longer running.
    fn launch(self: &Arc<Self>, schedule: impl FnOnce(Box<dyn FnOnce() + Send>)) -> bool {
        let phase = self.phase.lock();
        if *phase != Phase::Running {
            return false;
        }
        let Some(enemy) = self.spawn_enemy() else {
            return false;
        };
        *self.active.lock() += 1;
        drop(phase);

        let supervisor = Arc::clone(self);
        schedule(Box::new(move || supervisor.drive(enemy)));
        true
    }

    fn drive(self: Arc<Self>, enemy: Arc<Entity>) {
        let rng = self.config.agent_rng(enemy.id());
        let exit = EnemyAgent::new(
            enemy,
            Arc::clone(&self.world),
            self.config.agent.clone(),
            self.switch.flag(),
            rng,
        )
        .run();

        if exit.wants_replacement() {
            // On a pool worker, so this queues onto the same pool.
            self.launch(|job| rayon::spawn(job));
        }

        let mut active = self.active.lock();
        *active = active.saturating_sub(1);
        if *active == 0 {
            self.drained.notify_all();
        }
    }

    /// Places a freshly built enemy on a random free cell.
    fn spawn_enemy(&self) -> Option<Arc<Entity>> {
        let bounds = self.world.bounds();
        if bounds.area() == 0 {
            return None;
        }
        let mut rng = self.rng.lock();
        for _ in 0..self.config.population.spawn_attempts {
            let at = Coordinate::from_unsigned(rng.gen_range(0..bounds.rows), rng.gen_range(0..bounds.cols));
            if self.world.registry().is_occupied(at) {
                continue;
            }
            let kind = choose_enemy_kind(&self.world, &mut *rng);
            let enemy = Arc::new(
                self.factory
                    .build_enemy(kind, self.world.allocate_id(), at, &mut *rng),
            );
            match self
                .world
                .try_spawn_enemy(Arc::clone(&enemy), self.config.agent.move_lock_timeout())
            {
                MoveOutcome::Moved { .. } => {
                    tracing::info!(enemy = %enemy, "enemy spawned");
                    return Some(enemy);
                }
                MoveOutcome::Contended | MoveOutcome::Refused => {}
            }
        }
        tracing::warn!(
            attempts = self.config.population.spawn_attempts,
            "no free cell for a new enemy"
        );
        None
    }
}

/// Keeps a bounded number of enemies alive on the map.
///
/// The pool has `pool_size(area)` workers. [`PopulationManager::start`] fills
/// it with fresh enemies; whenever one dies (or is removed) its worker spawns
/// a replacement, until [`PopulationManager::stop`].
pub struct PopulationManager {
    supervisor: Arc<Supervisor>,
    pool: ThreadPool,
}

impl PopulationManager {
    /// Builds the worker pool for `world`.
    ///
    /// # Errors
    ///
    /// [`PopulationError::Pool`] if the pool cannot be built.
    pub fn new(
        world: Arc<World>,
        factory: Arc<dyn EnemyFactory>,
        config: EngineConfig,
    ) -> Result<Self, PopulationError> {
        let workers = pool_size(world.bounds().area(), &config.population);
        let pool = ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|index| format!("enemy-worker-{index}"))
            .build()?;
        let rng = config.world_rng();

        Ok(Self {
            supervisor: Arc::new(Supervisor {
                world,
                factory,
                config,
                phase: Mutex::new(Phase::Ready),
                switch: RunSwitch::new(),
                active: Mutex::new(0),
                drained: Condvar::new(),
                rng: Mutex::new(rng),
            }),
            pool,
        })
    }

    /// Number of workers.
    #[must_use]
    pub fn workers(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Spawns one enemy per worker and starts their agents. Returns the number
    /// launched, which is lower if the map ran out of free cells.
    ///
    /// # Errors
    ///
    /// [`PopulationError::AlreadyStarted`] unless this is the first call.
    pub fn start(&self) -> Result<usize, PopulationError> {
        {
            let mut phase = self.supervisor.phase.lock();
            if *phase != Phase::Ready {
                return Err(PopulationError::AlreadyStarted);
            }
            *phase = Phase::Running;
        }

        let launched = (0..self.workers())
            .filter(|_| self.supervisor.launch(|job| self.pool.spawn(job)))
            .count();
        tracing::info!(workers = self.workers(), launched, "population started");
        Ok(launched)
    }

    /// Returns true between start and stop.
    #[must_use]
    pub fn is_running(&self) -> bool {
        *self.supervisor.phase.lock() == Phase::Running
    }

    /// Agents currently running.
    #[must_use]
    pub fn active_agents(&self) -> usize {
        *self.supervisor.active.lock()
    }

    /// Stops every agent, suppresses replacements and waits for the workers
    /// to drain.
    pub fn stop(&self) {
        {
            let mut phase = self.supervisor.phase.lock();
            if *phase == Phase::Stopped {
                return;
            }
            *phase = Phase::Stopped;
            self.supervisor.switch.stop();
        }

        let mut active = self.supervisor.active.lock();
        while *active > 0 {
            self.supervisor.drained.wait(&mut active);
        }
        tracing::info!("population stopped");
    }
}

impl Drop for PopulationManager {
    fn drop(&mut self) {
        self.stop();
    }
}

impl fmt::Debug for PopulationManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PopulationManager")
            .field("workers", &self.workers())
            .field("active", &self.active_agents())
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}
