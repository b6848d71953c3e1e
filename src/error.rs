use std::time::Duration;

use thiserror::Error;

/// Errors surfaced by the greeting client and server.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum GreeterError {
    /// The configured endpoint is not a valid URI.
    #[error("invalid endpoint '{endpoint}'")]
    InvalidEndpoint {
        endpoint: String,
        #[source]
        source: tonic::transport::Error,
    },

    /// Connecting to, or serving on, the transport failed.
    #[error("transport error: {0}")]
    Connect(#[from] tonic::transport::Error),

    /// The call returned a non-OK status.
    #[error("call failed: {0}")]
    Status(#[from] tonic::Status),

    /// The call did not finish within the configured timeout.
    #[error("call timed out after {0:?}")]
    Timeout(Duration),

    /// A session direction failed.
    #[error(transparent)]
    Transport(#[from] duplex::TransportError),

    /// The reflection service could not be built from the descriptor set.
    #[error("reflection setup failed: {0}")]
    Reflection(#[from] tonic_reflection::server::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
