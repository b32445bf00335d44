//! Errors in the library.
use thiserror::Error;

/// Errors in the library.
#[derive(Error, Debug, PartialEq)]
pub enum FlockError {
    /// The N-step horizon of an adder or the capacity of a step buffer is less than 1.
    #[error("n_step must be at least 1, but got {0}")]
    InvalidNStep(usize),

    /// A step was appended to a full [`StepBuffer`](crate::StepBuffer).
    #[error("step buffer is full (capacity {0})")]
    CapacityExceeded(usize),

    /// The per-agent mappings of a step do not share the same set of agents.
    #[error("agent key mismatch in {field}: expected {expected:?}, got {actual:?}")]
    AgentKeyMismatch {
        /// Name of the offending mapping.
        field: &'static str,
        /// Agents of the reference mapping.
        expected: Vec<String>,
        /// Agents of the offending mapping.
        actual: Vec<String>,
    },

    /// Two arrays could not be broadcast together.
    #[error("shape mismatch: cannot broadcast {0:?} into {1:?}")]
    ShapeMismatch(Vec<usize>, Vec<usize>),

    /// An in-place operation would need to cast a float into an integer array.
    #[error("cannot cast {from} into {to} in place")]
    UnsafeCast {
        /// Dtype of the right hand side.
        from: String,
        /// Dtype of the array being updated.
        to: String,
    },

    /// The number of elements does not match the given shape.
    #[error("cannot build an array of shape {0:?} from {1} elements")]
    InvalidShape(Vec<usize>, usize),

    /// [`add()`](crate::NStepTransitionAdder::add) was called before
    /// [`add_first()`](crate::NStepTransitionAdder::add_first).
    #[error("add_first() must be called before add()")]
    AddFirstRequired,

    /// [`add_first()`](crate::NStepTransitionAdder::add_first) was given a timestep which
    /// does not start an episode.
    #[error("add_first() requires a timestep of type First, but got {0}")]
    NotFirstTimeStep(String),

    /// An item references transitions which have not been appended to the sink.
    #[error("invalid item for table {table}: num_timesteps = {num_timesteps}, appended = {appended}")]
    InvalidItem {
        /// Table of the item.
        table: String,
        /// Requested number of timesteps.
        num_timesteps: usize,
        /// Number of transitions appended so far.
        appended: usize,
    },
}
