//! Fixed roster: one thread per enemy.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use super::PopulationError;
use crate::agent::{AgentExit, EnemyAgent, RunSwitch};
use crate::config::EngineConfig;
use crate::world::World;

/// Drives every enemy present at [`AgentRoster::start`] on its own thread.
///
/// Dropping the roster stops and joins its agents.
#[derive(Debug)]
pub struct AgentRoster {
    world: Arc<World>,
    config: EngineConfig,
    switch: RunSwitch,
    handles: Vec<JoinHandle<AgentExit>>,
    started: bool,
}

impl AgentRoster {
    /// A roster over `world`'s current enemies.
    #[must_use]
    pub fn new(world: Arc<World>, config: EngineConfig) -> Self {
        Self {
            world,
            config,
            switch: RunSwitch::new(),
            handles: Vec::new(),
            started: false,
        }
    }

    /// Launches one agent per enemy. Returns the number launched.
    ///
    /// # Errors
    ///
    /// [`PopulationError::AlreadyStarted`] on a second call,
    /// [`PopulationError::Spawn`] if a thread cannot be created (agents
    /// launched before the failure keep running until stop).
    pub fn start(&mut self) -> Result<usize, PopulationError> {
        if self.started {
            return Err(PopulationError::AlreadyStarted);
        }
        self.started = true;

        for enemy in self.world.enemies() {
            let agent = EnemyAgent::new(
                Arc::clone(&enemy),
                Arc::clone(&self.world),
                self.config.agent.clone(),
                self.switch.flag(),
                self.config.agent_rng(enemy.id()),
            );
            let handle = thread::Builder::new()
                .name(format!("agent-{}", enemy.id()))
                .spawn(move || agent.run())?;
            self.handles.push(handle);
        }
        tracing::info!(agents = self.handles.len(), "roster started");
        Ok(self.handles.len())
    }

    /// Returns true between start and stop.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.started && self.switch.is_running()
    }

    /// Agents launched and not yet joined.
    #[must_use]
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    /// Returns true if no agent is outstanding.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Stops every agent and waits for them. Returns how each one ended.
    pub fn stop(&mut self) -> Vec<AgentExit> {
        self.switch.stop();
        let exits: Vec<AgentExit> = self
            .handles
            .drain(..)
            .filter_map(|handle| match handle.join() {
                Ok(exit) => Some(exit),
                Err(_) => {
                    tracing::warn!("agent thread panicked");
                    None
                }
            })
            .collect();
        if !exits.is_empty() {
            tracing::info!(agents = exits.len(), "roster stopped");
        }
        exits
    }
}

impl Drop for AgentRoster {
    fn drop(&mut self) {
        self.stop();
    }
}
