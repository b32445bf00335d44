use super::{AgentMap, Extras};
use crate::Tensor;

/// An N-step transition `(s_t, a_t, R_{t:t+n}, D_{t:t+n}, s_{t+n}, e_t)`.
///
/// `total_discount` holds one environment discount less than the number of steps
/// accumulated, so that a learner applying its own bootstrap discount does not
/// apply the last one twice.
#[derive(Clone, Debug, PartialEq)]
pub struct Transition {
    /// Observations at the start of the window.
    pub observations: AgentMap<Tensor>,

    /// Actions taken from `observations`.
    pub actions: AgentMap<Tensor>,

    /// Discounted return accumulated over the window.
    pub n_step_return: AgentMap<Tensor>,

    /// Product of the accumulator and environment discounts over the window.
    pub total_discount: AgentMap<Tensor>,

    /// Arrival observations.
    pub next_observations: AgentMap<Tensor>,

    /// Extras of the first step of the window, if any.
    pub extras: Option<Extras>,
}
