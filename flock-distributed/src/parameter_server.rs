//! Parameter server.
mod base;
mod service;
pub use base::ParameterServer;
pub use service::ParameterServerHandle;
