use std::time::Duration;

use thiserror::Error;

/// Errors that can occur while moving messages over one direction of a session.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TransportError {
    /// The local send direction was already half-closed.
    #[error("send direction already closed")]
    SendClosed,

    /// The peer (or the queue feeding it) is gone.
    #[error("peer disconnected")]
    Disconnected,

    /// The session deadline elapsed before the direction finished.
    #[error("session timed out after {0:?}")]
    Timeout(Duration),

    /// The session was cancelled from outside.
    #[error("session cancelled")]
    Cancelled,

    /// The gRPC layer reported a failure.
    #[error("gRPC error: {0}")]
    Status(#[from] tonic::Status),
}

impl TransportError {
    /// Returns true if the error came from an external cancellation.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, TransportError::Cancelled)
    }
}

impl From<TransportError> for tonic::Status {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Status(status) => status,
            TransportError::Cancelled => tonic::Status::cancelled(err.to_string()),
            TransportError::Timeout(_) => tonic::Status::deadline_exceeded(err.to_string()),
            TransportError::SendClosed | TransportError::Disconnected => {
                tonic::Status::unavailable(err.to_string())
            }
        }
    }
}

/// Outcome of a failed `receive`.
///
/// End-of-stream is the normal half-close signal from the peer and is kept
/// apart from real transport failures so callers never confuse the two.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RecvError {
    /// The peer half-closed its send direction; no more messages will arrive.
    #[error("end of stream")]
    EndOfStream,

    /// The receive direction failed.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl RecvError {
    pub fn is_end_of_stream(&self) -> bool {
        matches!(self, RecvError::EndOfStream)
    }
}
