//! Runs episodes in an environment and feeds the experience to the replay tables.
mod base;
mod config;
mod stat;
pub use base::Actor;
pub use config::ActorConfig;
pub use stat::{actor_stats_fmt, ActorStat};
