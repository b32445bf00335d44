//! Environment.
use super::AgentMap;
use crate::Tensor;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Position of a [`TimeStep`] in an episode.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepType {
    /// The first timestep, returned by [`Env::reset`].
    First,

    /// Any timestep which is neither the first nor the last one.
    Mid,

    /// The last timestep of an episode.
    Last,
}

impl fmt::Display for StepType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Output of an environment at every interaction step.
///
/// `rewards` and `discounts` are keyed by agent. Both are usually empty in the first
/// timestep of an episode.
#[derive(Clone, Debug, PartialEq)]
pub struct TimeStep {
    /// Position in the episode.
    pub step_type: StepType,

    /// Observations of the agents.
    pub observations: AgentMap<Tensor>,

    /// Rewards ensuing from the previous actions.
    pub rewards: AgentMap<Tensor>,

    /// Environment discounts, typically 1 except 0 at termination.
    pub discounts: AgentMap<Tensor>,
}

impl TimeStep {
    /// Creates the first timestep of an episode.
    pub fn restart(observations: AgentMap<Tensor>) -> Self {
        Self {
            step_type: StepType::First,
            observations,
            rewards: AgentMap::new(),
            discounts: AgentMap::new(),
        }
    }

    /// Creates an intermediate timestep.
    pub fn transition(
        observations: AgentMap<Tensor>,
        rewards: AgentMap<Tensor>,
        discounts: AgentMap<Tensor>,
    ) -> Self {
        Self {
            step_type: StepType::Mid,
            observations,
            rewards,
            discounts,
        }
    }

    /// Creates the last timestep of an episode.
    pub fn termination(
        observations: AgentMap<Tensor>,
        rewards: AgentMap<Tensor>,
        discounts: AgentMap<Tensor>,
    ) -> Self {
        Self {
            step_type: StepType::Last,
            observations,
            rewards,
            discounts,
        }
    }

    #[inline]
    /// Returns `true` for the first timestep of an episode.
    pub fn first(&self) -> bool {
        self.step_type == StepType::First
    }

    #[inline]
    /// Returns `true` for the last timestep of an episode.
    pub fn last(&self) -> bool {
        self.step_type == StepType::Last
    }
}

/// Represents a multi-agent environment.
///
/// The state of the environment is threaded through [`Env::reset`] and [`Env::step`]
/// explicitly, so that wrappers can carry their own bookkeeping along with it.
pub trait Env {
    /// Configurations.
    type Config: Clone;

    /// State of the environment between steps.
    type State;

    /// Builds an environment with a given random seed.
    fn build(config: &Self::Config, seed: i64) -> Result<Self>
    where
        Self: Sized;

    /// Starts a new episode.
    fn reset(&mut self) -> Result<(Self::State, TimeStep)>;

    /// Applies the actions of the agents.
    fn step(
        &mut self,
        state: Self::State,
        actions: &AgentMap<Tensor>,
    ) -> Result<(Self::State, TimeStep)>;
}
