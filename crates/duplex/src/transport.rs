use std::future::Future;

use crate::error::{RecvError, TransportError};

/// The send half of a duplex session.
pub trait SendHalf: Send {
    type Message: Send;

    /// Enqueue a message for delivery to the peer.
    ///
    /// May suspend while the outbound queue is full.
    fn send(
        &mut self,
        message: Self::Message,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Half-close: tell the peer no more messages follow on this direction.
    ///
    /// The receive direction is unaffected.
    fn close_send(&mut self) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Resolves once the peer stops accepting messages on this direction.
    ///
    /// Never resolves after a local half-close.
    fn closed(&self) -> impl Future<Output = ()> + Send;
}

/// The receive half of a duplex session.
pub trait RecvHalf: Send {
    type Message: Send;

    /// Wait for the next message, the peer's end-of-stream, or a failure.
    fn receive(&mut self) -> impl Future<Output = Result<Self::Message, RecvError>> + Send;
}

/// A bidirectional stream of messages.
///
/// Wraps independent send and receive halves. Use it directly for lockstep
/// exchanges, or `split()` it so each direction can be driven by its own loop.
///
/// # Example
///
/// ```ignore
/// let mut duplex = client.open_bi_streams().await?;
/// duplex.send(request).await?;
/// let response = duplex.receive().await?;
/// duplex.close_send().await?;
///
/// // Or split for concurrent send/receive
/// let (sender, receiver) = duplex.split();
/// ```
#[derive(Debug)]
pub struct Duplex<S, R> {
    sender: S,
    receiver: R,
}

impl<S, R> Duplex<S, R> {
    /// Build a duplex stream from its halves.
    pub fn new(sender: S, receiver: R) -> Self {
        Self { sender, receiver }
    }

    /// Split into separate send and receive halves.
    pub fn split(self) -> (S, R) {
        (self.sender, self.receiver)
    }

    pub fn sender_mut(&mut self) -> &mut S {
        &mut self.sender
    }

    pub fn receiver_mut(&mut self) -> &mut R {
        &mut self.receiver
    }

    pub async fn send(&mut self, message: S::Message) -> Result<(), TransportError>
    where
        S: SendHalf,
    {
        self.sender.send(message).await
    }

    pub async fn close_send(&mut self) -> Result<(), TransportError>
    where
        S: SendHalf,
    {
        self.sender.close_send().await
    }

    pub async fn receive(&mut self) -> Result<R::Message, RecvError>
    where
        R: RecvHalf,
    {
        self.receiver.receive().await
    }
}
