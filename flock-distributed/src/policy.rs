use anyhow::Result;
use flock_core::{AgentMap, Extras, Tensor};

/// Selects the actions of all agents.
pub trait Policy {
    /// Returns an action for every agent in `observations`.
    fn select_actions(&mut self, observations: &AgentMap<Tensor>) -> Result<AgentMap<Tensor>>;

    /// Extras recorded with the step of the last selected actions, such as the state
    /// of a recurrent network.
    fn extras(&self) -> Extras {
        Extras::new()
    }
}
