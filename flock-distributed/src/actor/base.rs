use crate::{ActorConfig, ActorStat, Executor, ParameterStore, Parameters, Policy, SyncModel};
use anyhow::Result;
use flock_core::{Env, ReplaySink};
use log::{debug, info};
use std::{
    sync::{Arc, Mutex},
    time::Instant,
};

/// Runs interaction between an [`Executor`] and an [`Env`], taking samples.
///
/// Samples are written through the adder of the executor. After every episode the
/// actor adds the number of environment steps and completed episodes to the counters
/// in the parameter store.
pub struct Actor<E, P, W, S>
where
    E: Env,
    W: ReplaySink,
    S: ParameterStore,
{
    id: usize,
    config: ActorConfig,
    env_config: E::Config,
    env_seed: i64,
    executor: Executor<P, W, S>,

    /// Stops sampling process if this field is set to `true`.
    stop: Arc<Mutex<bool>>,
}

impl<E, P, W, S> Actor<E, P, W, S>
where
    E: Env,
    P: Policy + SyncModel,
    W: ReplaySink,
    S: ParameterStore + Clone + Send + 'static,
{
    /// Creates an actor. The environment is built when [`run()`](Self::run) is called.
    pub fn build(
        id: usize,
        config: &ActorConfig,
        env_config: &E::Config,
        env_seed: i64,
        executor: Executor<P, W, S>,
        stop: Arc<Mutex<bool>>,
    ) -> Self {
        Self {
            id,
            config: config.clone(),
            env_config: env_config.clone(),
            env_seed,
            executor,
            stop,
        }
    }

    /// Consumes the actor, returning the executor.
    pub fn into_executor(self) -> Executor<P, W, S> {
        self.executor
    }

    /// Runs episodes until `max_episodes` is reached or the stop flag is raised.
    ///
    /// An episode interrupted by the stop flag is drained, so that its steps are still
    /// written. Requests of the parameter client in flight are awaited before returning.
    pub fn run(&mut self) -> Result<ActorStat> {
        let mut env = E::build(&self.env_config, self.env_seed)?;
        let time = Instant::now();
        let mut stat = ActorStat::default();
        info!("Starts actor {}", self.id);

        // Initial model
        self.executor.update(true)?;

        while !self.stopped() {
            if let Some(max_episodes) = self.config.max_episodes {
                if stat.episodes >= max_episodes {
                    break;
                }
            }
            let (env_steps, completed) = self.run_episode(&mut env)?;
            stat.env_steps += env_steps;
            stat.episodes += completed as usize;
            self.publish_counters(env_steps, completed as usize)?;
        }

        if let Some(client) = self.executor.parameter_client_mut() {
            client.wait_pending()?;
        }
        stat.duration = time.elapsed();
        info!(
            "Stopped actor {} after {} episodes, {} steps",
            self.id, stat.episodes, stat.env_steps
        );
        Ok(stat)
    }

    /// Returns the number of environment steps and whether the episode was completed.
    fn run_episode(&mut self, env: &mut E) -> Result<(usize, bool)> {
        let (mut state, mut timestep) = env.reset()?;
        self.executor.observe_first(&timestep)?;
        let mut env_steps = 0;

        while !timestep.last() {
            if self.stopped() {
                debug!("Actor {} interrupted after {} steps", self.id, env_steps);
                self.executor.end_episode()?;
                return Ok((env_steps, false));
            }
            let actions = self.executor.select_actions(&timestep.observations)?;
            let (next_state, next_timestep) = env.step(state, &actions)?;
            self.executor.observe(&actions, &next_timestep)?;
            self.executor.update(false)?;
            state = next_state;
            timestep = next_timestep;
            env_steps += 1;
        }
        Ok((env_steps, true))
    }

    fn publish_counters(&mut self, env_steps: usize, episodes: usize) -> Result<()> {
        let mut deltas = Parameters::new();
        if let Some(key) = &self.config.env_steps_key {
            deltas.insert(key.clone(), (env_steps as i64).into());
        }
        if let Some(key) = &self.config.episodes_key {
            deltas.insert(key.clone(), (episodes as i64).into());
        }
        match self.executor.parameter_client_mut() {
            Some(client) if !deltas.is_empty() => client.add_async(deltas),
            _ => Ok(()),
        }
    }

    fn stopped(&self) -> bool {
        // A poisoned flag means another thread panicked.
        self.stop.lock().map(|stop| *stop).unwrap_or(true)
    }
}
