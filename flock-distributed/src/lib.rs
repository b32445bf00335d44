#![warn(missing_docs)]
//! Distributed experience collection with shared parameters.
//!
//! A learner and any number of executors share named parameters through a
//! [`ParameterStore`]. Each executor keeps a local cache in a [`ParameterClient`],
//! fetching the parameters it reads (`get_keys`) and pushing the ones it owns
//! (`set_keys`), such as counters of environment steps.
//!
//! # Threads
//! * Every [`Actor`] runs on its own thread and writes transitions through its
//!   [`Executor`]. With a [`ChannelReplaySink`] they are sent to the replay tables as
//!   [`PushedItemMessage`]s.
//! * The [`ParameterServer`] is either shared as `Arc<ParameterServer>` or moved onto
//!   its own thread with [`ParameterServer::spawn()`], and reached through a
//!   [`ParameterServerHandle`] over [`ServerMessage`]s.
//! * Periodic synchronizations of a [`ParameterClient`] run on short-lived background
//!   threads.
//! * Actors stop when a shared `Arc<Mutex<bool>>` flag is set to `true`.
mod actor;
mod error;
mod executor;
mod messages;
mod param;
mod parameter_client;
mod parameter_server;
mod policy;
mod replay_sink_proxy;
mod store;
mod sync_model;
pub use actor::{actor_stats_fmt, Actor, ActorConfig, ActorStat};
pub use error::FlockDistributedError;
pub use executor::Executor;
pub use messages::{PushedItemMessage, ServerMessage};
pub use param::{ParamValue, Parameters};
pub use parameter_client::{ParameterClient, ParameterClientConfig};
pub use parameter_server::{ParameterServer, ParameterServerHandle};
pub use policy::Policy;
pub use replay_sink_proxy::{ChannelReplaySink, ChannelReplaySinkConfig, ReplayItem};
pub use store::ParameterStore;
pub use sync_model::SyncModel;
