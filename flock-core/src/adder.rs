//! N-step transition adder.
//!
//! The adder buffers the last N steps of an episode in a [`StepBuffer`] and collapses
//! them into a single [`Transition`](crate::Transition), which is written to a
//! [`ReplaySink`](crate::ReplaySink) together with one priority per table.
//! For N=1 the transitions are standard one-step transitions.
mod base;
mod config;
mod priority;
mod step_buffer;
pub use base::NStepTransitionAdder;
pub use config::NStepTransitionAdderConfig;
pub use priority::{
    calculate_priorities, default_priority_fns, PriorityFn, PriorityFnMapping,
    DEFAULT_PRIORITY_TABLE,
};
pub use step_buffer::StepBuffer;
