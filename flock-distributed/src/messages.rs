use crate::Parameters;
use anyhow::Result;
use crossbeam_channel::Sender;

/// Message containing items pushed by an executor.
pub struct PushedItemMessage<T> {
    /// ID of the actor which pushed the items.
    pub id: usize,

    /// Pushed items.
    pub pushed_items: Vec<T>,
}

/// Requests handled by the service thread of a
/// [`ParameterServer`](crate::ParameterServer).
///
/// Each request carries the sender of its reply.
pub enum ServerMessage {
    /// Call [`ParameterStore::get_parameters()`](crate::ParameterStore::get_parameters).
    Get(Vec<String>, Sender<Result<Parameters>>),

    /// Call [`ParameterStore::set_parameters()`](crate::ParameterStore::set_parameters).
    Set(Parameters, Sender<Result<()>>),

    /// Call [`ParameterStore::add_to_parameters()`](crate::ParameterStore::add_to_parameters).
    Add(Parameters, Sender<Result<()>>),

    /// Stops the service thread.
    Stop,
}
