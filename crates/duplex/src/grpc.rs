//! Adapters binding tonic streaming calls to the duplex transport traits.
//!
//! On the initiator side a call's request body is fed by a [`RequestSink`]
//! and its responses are read from a `tonic::Streaming`. On the responder
//! side the inbound `Streaming` is read the same way and responses are queued
//! through a [`ResponseSink`] backing the returned response stream.

use std::num::NonZeroUsize;

use tokio::sync::mpsc;
use tonic::{Status, Streaming};

use crate::error::{RecvError, TransportError};
use crate::transport::{RecvHalf, SendHalf};

impl<T: Send + 'static> RecvHalf for Streaming<T> {
    type Message = T;

    async fn receive(&mut self) -> Result<T, RecvError> {
        match self.message().await {
            Ok(Some(message)) => Ok(message),
            Ok(None) => Err(RecvError::EndOfStream),
            Err(status) => Err(RecvError::Transport(TransportError::Status(status))),
        }
    }
}

/// Feeds the request body of an outgoing streaming call.
///
/// Hand the paired receiver to the tonic client (wrapped in a
/// `ReceiverStream`); closing the sink ends the request body.
#[derive(Debug)]
pub struct RequestSink<T> {
    tx: Option<mpsc::Sender<T>>,
}

impl<T> RequestSink<T> {
    pub fn new(tx: mpsc::Sender<T>) -> Self {
        Self { tx: Some(tx) }
    }

    /// Create a sink and the receiver that must become the request body.
    pub fn channel(capacity: NonZeroUsize) -> (Self, mpsc::Receiver<T>) {
        let (tx, rx) = mpsc::channel(capacity.get());
        (Self::new(tx), rx)
    }
}

impl<T: Send> SendHalf for RequestSink<T> {
    type Message = T;

    async fn send(&mut self, message: T) -> Result<(), TransportError> {
        let tx = self.tx.as_ref().ok_or(TransportError::SendClosed)?;
        tx.send(message)
            .await
            .map_err(|_| TransportError::Disconnected)
    }

    async fn close_send(&mut self) -> Result<(), TransportError> {
        self.tx.take().map(drop).ok_or(TransportError::SendClosed)
    }
    async fn closed(&self) {
        match &self.tx {
            Some(tx) => tx.closed().await,
            None => std::future::pending().await,
        }
    }
}

/// Queues responses onto the stream a server handler returned to tonic.
#[derive(Debug)]
pub struct ResponseSink<T> {
    tx: Option<mpsc::Sender<Result<T, Status>>>,
}

impl<T> ResponseSink<T> {
    pub fn new(tx: mpsc::Sender<Result<T, Status>>) -> Self {
        Self { tx: Some(tx) }
    }

    /// Create a sink and the receiver that must become the response stream.
    pub fn channel(capacity: NonZeroUsize) -> (Self, mpsc::Receiver<Result<T, Status>>) {
        let (tx, rx) = mpsc::channel(capacity.get());
        (Self::new(tx), rx)
    }

    /// End the response stream with `status` instead of a clean close.
    ///
    /// Fails with `Disconnected` if the initiator already went away.
    pub async fn fail(&mut self, status: Status) -> Result<(), TransportError> {
        let tx = self.tx.take().ok_or(TransportError::SendClosed)?;
        tx.send(Err(status))
            .await
            .map_err(|_| TransportError::Disconnected)
    }
}

impl<T: Send> SendHalf for ResponseSink<T> {
    type Message = T;

    async fn send(&mut self, message: T) -> Result<(), TransportError> {
        let tx = self.tx.as_ref().ok_or(TransportError::SendClosed)?;
        tx.send(Ok(message))
            .await
            .map_err(|_| TransportError::Disconnected)
    }

    async fn close_send(&mut self) -> Result<(), TransportError> {
        self.tx.take().map(drop).ok_or(TransportError::SendClosed)
    }
    async fn closed(&self) {
        match &self.tx {
            Some(tx) => tx.closed().await,
            None => std::future::pending().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::capacity;

    #[tokio::test]
    async fn test_request_sink_close_ends_body() {
        let (mut sink, mut rx) = RequestSink::channel(capacity(2));

        sink.send("Taro").await.unwrap();
        sink.close_send().await.unwrap();

        assert_eq!(rx.recv().await, Some("Taro"));
        assert_eq!(rx.recv().await, None);
        assert!(matches!(
            sink.send("late").await,
            Err(TransportError::SendClosed)
        ));
    }

    #[tokio::test]
    async fn test_response_sink_fail_terminates_with_status() {
        let (mut sink, mut rx) = ResponseSink::channel(capacity(2));

        sink.send(1u32).await.unwrap();
        sink.fail(Status::internal("boom")).await.unwrap();

        assert_eq!(rx.recv().await.unwrap().unwrap(), 1);
        let status = rx.recv().await.unwrap().unwrap_err();
        assert_eq!(status.code(), tonic::Code::Internal);
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_response_sink_detects_gone_initiator() {
        let (mut sink, rx) = ResponseSink::<u32>::channel(capacity(1));
        drop(rx);

        assert!(matches!(
            sink.send(1).await,
            Err(TransportError::Disconnected)
        ));
    }
}
