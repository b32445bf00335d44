//! Core types and the boundaries to collaborators.
mod env;
mod replay_sink;
mod step;
mod transition;
pub use env::{Env, StepType, TimeStep};
pub use replay_sink::ReplaySink;
pub use step::{AgentMap, Extras, Step};
pub use transition::Transition;
