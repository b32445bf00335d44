//! Parameter client.
mod base;
mod config;
pub use base::ParameterClient;
pub use config::ParameterClientConfig;
