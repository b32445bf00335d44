use crate::Parameters;
use anyhow::Result;

/// Synchronizes the model of a policy with parameters fetched from the store.
pub trait SyncModel {
    /// Loads the parameters cached by the parameter client.
    ///
    /// Called after every fetch which updated the cache.
    fn sync_model(&mut self, parameters: &Parameters) -> Result<()>;
}
