//! Environment step seen by the adder.
use crate::{error::FlockError, Tensor};
use anyhow::Result;
use std::collections::BTreeMap;

/// Values keyed by agent id.
pub type AgentMap<T> = BTreeMap<String, T>;

/// Auxiliary data persisted in replay along with a transition, e.g. recurrent states.
pub type Extras = BTreeMap<String, Tensor>;

/// One timestep of all agents: `(o_t, a_t, r_t, d_t, e_t)`.
///
/// `rewards[agent]` and `discounts[agent]` ensue from `actions[agent]` taken at
/// `observations[agent]`.
#[derive(Clone, Debug, PartialEq)]
pub struct Step {
    /// Observations at time t.
    pub observations: AgentMap<Tensor>,

    /// Actions taken from the observations.
    pub actions: AgentMap<Tensor>,

    /// Rewards. An empty mapping is read as zero rewards.
    pub rewards: AgentMap<Tensor>,

    /// Environment discounts.
    pub discounts: AgentMap<Tensor>,

    /// `true` if this is the first step of an episode.
    pub start_of_episode: bool,

    /// Extra data. May be empty.
    pub extras: Extras,
}

impl Step {
    /// Checks that all per-agent mappings share the agents of `observations`.
    ///
    /// `rewards` may be empty.
    pub fn validate(&self) -> Result<()> {
        check_agents("actions", &self.observations, &self.actions)?;
        check_agents("discounts", &self.observations, &self.discounts)?;
        if !self.rewards.is_empty() {
            check_agents("rewards", &self.observations, &self.rewards)?;
        }
        Ok(())
    }

    /// Reward of `agent`.
    ///
    /// When the reward mapping is empty, a zero scalar with the type of the agent's
    /// discount is returned.
    pub fn reward(&self, agent: &str) -> Option<Tensor> {
        match self.rewards.is_empty() {
            true => self
                .discounts
                .get(agent)
                .map(|d| Tensor::zeros(&[], d.dtype())),
            false => self.rewards.get(agent).cloned(),
        }
    }

    /// A step which carries `observations` and zeros like `self` everywhere else.
    pub(crate) fn zeros_like(&self, observations: AgentMap<Tensor>) -> Self {
        let zeros = |m: &BTreeMap<String, Tensor>| {
            m.iter()
                .map(|(k, v)| (k.clone(), v.zeros_like()))
                .collect::<BTreeMap<_, _>>()
        };
        let rewards = match self.rewards.is_empty() {
            true => self
                .discounts
                .iter()
                .map(|(k, d)| (k.clone(), Tensor::zeros(&[], d.dtype())))
                .collect(),
            false => zeros(&self.rewards),
        };
        Self {
            observations,
            actions: zeros(&self.actions),
            rewards,
            discounts: zeros(&self.discounts),
            start_of_episode: false,
            extras: zeros(&self.extras),
        }
    }
}

fn check_agents<T, U>(
    field: &'static str,
    expected: &AgentMap<T>,
    actual: &AgentMap<U>,
) -> Result<()> {
    if expected.keys().eq(actual.keys()) {
        Ok(())
    } else {
        Err(FlockError::AgentKeyMismatch {
            field,
            expected: expected.keys().cloned().collect(),
            actual: actual.keys().cloned().collect(),
        }
        .into())
    }
}
