//! Replay sink interface.
//!
//! A replay sink is an append-only store of transitions. Sampling is done by the
//! consumer of the sink and is not part of this interface.
use super::Transition;
use anyhow::Result;

/// Destination of the transitions produced by an adder.
///
/// The adder appends a transition, then creates one prioritized item per table
/// referencing the last `num_timesteps` appended transitions. A transition without
/// any item is never exposed to sampling.
pub trait ReplaySink {
    /// Appends a transition.
    fn append(&mut self, transition: Transition) -> Result<()>;

    /// Creates an item in `table` referencing the last `num_timesteps` transitions.
    fn create_item(&mut self, table: &str, num_timesteps: usize, priority: f64) -> Result<()>;
}

impl<S: ReplaySink + ?Sized> ReplaySink for Box<S> {
    fn append(&mut self, transition: Transition) -> Result<()> {
        (**self).append(transition)
    }

    fn create_item(&mut self, table: &str, num_timesteps: usize, priority: f64) -> Result<()> {
        (**self).create_item(table, num_timesteps, priority)
    }
}
