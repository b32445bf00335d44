use crate::Parameters;
use anyhow::Result;
use std::sync::Arc;

/// Shared storage of named parameters.
///
/// Stores are used concurrently by the learner and every executor, so all methods take
/// `&self`. Each parameter is read and written under its own critical section; a
/// single call touching several parameters is not atomic as a whole.
pub trait ParameterStore {
    /// Returns copies of the parameters named in `names`.
    fn get_parameters(&self, names: &[String]) -> Result<Parameters>;

    /// Overwrites parameters with `values`.
    fn set_parameters(&self, values: Parameters) -> Result<()>;

    /// Adds `deltas` to the stored parameters.
    fn add_to_parameters(&self, deltas: Parameters) -> Result<()>;
}

impl<S: ParameterStore + ?Sized> ParameterStore for Arc<S> {
    fn get_parameters(&self, names: &[String]) -> Result<Parameters> {
        (**self).get_parameters(names)
    }

    fn set_parameters(&self, values: Parameters) -> Result<()> {
        (**self).set_parameters(values)
    }

    fn add_to_parameters(&self, deltas: Parameters) -> Result<()> {
        (**self).add_to_parameters(deltas)
    }
}
