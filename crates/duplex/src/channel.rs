//! In-memory duplex transport backed by bounded tokio channels.
//!
//! Each direction is its own `mpsc` queue, so the two directions progress
//! independently. Dropping a sender half-closes that direction the same way
//! `close_send` does.

use std::num::NonZeroUsize;

use tokio::sync::mpsc;

use crate::error::{RecvError, TransportError};
use crate::transport::{Duplex, RecvHalf, SendHalf};

/// One endpoint of an in-memory session sending `Out` and receiving `In`.
pub type Endpoint<Out, In> = Duplex<ChannelSender<Out>, ChannelReceiver<In>>;

/// Create two connected endpoints.
///
/// `capacity` bounds each direction's queue; a send suspends while the
/// peer has `capacity` unread messages.
pub fn pair<A, B>(capacity: NonZeroUsize) -> (Endpoint<A, B>, Endpoint<B, A>)
where
    A: Send,
    B: Send,
{
    let (a_tx, a_rx) = mpsc::channel(capacity.get());
    let (b_tx, b_rx) = mpsc::channel(capacity.get());

    (
        Duplex::new(ChannelSender::new(a_tx), ChannelReceiver::new(b_rx)),
        Duplex::new(ChannelSender::new(b_tx), ChannelReceiver::new(a_rx)),
    )
}

/// The sending side of one in-memory direction.
#[derive(Debug)]
pub struct ChannelSender<T> {
    tx: Option<mpsc::Sender<Result<T, TransportError>>>,
}

impl<T> ChannelSender<T> {
    fn new(tx: mpsc::Sender<Result<T, TransportError>>) -> Self {
        Self { tx: Some(tx) }
    }

    pub fn is_closed(&self) -> bool {
        self.tx.as_ref().is_none_or(|tx| tx.is_closed())
    }

    /// Terminate this direction with an error instead of end-of-stream.
    ///
    /// The peer's next `receive` after any queued messages yields `err`.
    pub async fn abort(&mut self, err: TransportError) -> Result<(), TransportError> {
        let tx = self.tx.take().ok_or(TransportError::SendClosed)?;
        tx.send(Err(err))
            .await
            .map_err(|_| TransportError::Disconnected)
    }
}

impl<T: Send> SendHalf for ChannelSender<T> {
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

/// The receiving side of one in-memory direction.
#[derive(Debug)]
pub struct ChannelReceiver<T> {
    rx: mpsc::Receiver<Result<T, TransportError>>,
}

impl<T> ChannelReceiver<T> {
    fn new(rx: mpsc::Receiver<Result<T, TransportError>>) -> Self {
        Self { rx }
    }
}

impl<T: Send> RecvHalf for ChannelReceiver<T> {
    type Message = T;

    async fn receive(&mut self) -> Result<T, RecvError> {
        match self.rx.recv().await {
            Some(Ok(message)) => Ok(message),
            Some(Err(err)) => Err(RecvError::Transport(err)),
            None => Err(RecvError::EndOfStream),
        }
    }
}

/// Shorthand for test queue bounds.
#[cfg(test)]
pub(crate) fn capacity(n: usize) -> NonZeroUsize {
    NonZeroUsize::new(n).expect("test capacity must be non-zero")
}
