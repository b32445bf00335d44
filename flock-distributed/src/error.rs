//! Errors in the library.
use thiserror::Error;

/// Errors in the library.
#[derive(Error, Debug, PartialEq)]
pub enum FlockDistributedError {
    /// A parameter name is not held by the store or the client cache.
    #[error("unknown parameter: {0}")]
    UnknownParameter(String),

    /// A parameter value cannot be merged or accumulated.
    #[error("unsupported type of parameter {name}: {kind}")]
    UnsupportedParameterType {
        /// Name of the parameter.
        name: String,
        /// Variant of the offending value.
        kind: &'static str,
    },

    /// The same keys are both fetched from and pushed to the store.
    #[error("keys appear in both get_keys and set_keys: {0:?}")]
    OverlappingKeys(Vec<String>),

    /// The update period of a parameter client is zero.
    #[error("update_period must be at least 1, but got {0}")]
    InvalidUpdatePeriod(usize),

    /// The service thread of the parameter server has stopped.
    #[error("parameter server disconnected")]
    ServerDisconnected,

    /// A background request of a parameter client ended without a reply.
    #[error("background {0} request dropped without a reply")]
    RequestDropped(&'static str),

    /// The lock of a parameter was poisoned by a panicking thread.
    #[error("lock of parameter {0} is poisoned")]
    Poisoned(String),

    /// Pushed items could not be sent to the consumer of the replay channel.
    #[error("failed to send pushed items")]
    SendMsgForPush,
}
