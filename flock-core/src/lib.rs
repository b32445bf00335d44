#![warn(missing_docs)]
//! Experience collection for multi-agent reinforcement learning.
//!
//! Environment steps of all agents flow through an [`NStepTransitionAdder`], which
//! keeps the last N steps of the episode in a [`StepBuffer`] and writes N-step
//! [`Transition`]s with priorities into a [`ReplaySink`].
pub mod adder;
pub mod error;
mod replay_sink;
pub mod tensor;

mod base;
pub use adder::{NStepTransitionAdder, NStepTransitionAdderConfig, StepBuffer};
pub use base::{
    AgentMap, Env, Extras, ReplaySink, Step, StepType, TimeStep, Transition,
};
pub use replay_sink::{MemoryReplaySink, ReplayItemRef};
pub use tensor::{DType, Tensor};
