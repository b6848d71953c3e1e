//! The initiator side of a bidirectional session.
//!
//! The driver owns both halves of one [`Duplex`] and runs a send loop and a
//! receive loop concurrently in the calling task. Each loop tracks its own
//! direction's state, so one direction failing or finishing never stalls the
//! other:
//!
//! ```text
//! send:  Open ──quota reached / source done──> Closing ──close_send──> Closed
//!          └────────send failed / peer gone / cancelled────────────────┘
//! recv:  Open ──end of stream──> Ended
//!          └────receive failed / cancelled / timed out──> Failed
//! ```
//!
//! The session is terminated once send is `Closed` and recv is no longer
//! `Open`. Responses are handed to the caller in arrival order; the driver
//! never waits for request N's response before sending request N+1.

use std::pin::pin;
use std::time::Duration;

use futures::{Stream, StreamExt};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::{RecvError, TransportError};
use crate::transport::{Duplex, RecvHalf, SendHalf};

/// State of the initiator's send direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SendState {
    #[default]
    Open,
    /// Quota reached, half-close in flight.
    Closing,
    Closed,
}

/// State of the initiator's receive direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecvState {
    #[default]
    Open,
    /// The responder half-closed cleanly.
    Ended,
    Failed,
}

/// Combined state of both directions of one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SessionState {
    pub send: SendState,
    pub recv: RecvState,
}

impl SessionState {
    /// True once neither direction can make further progress.
    pub fn is_terminated(&self) -> bool {
        self.send == SendState::Closed && self.recv != RecvState::Open
    }
}

/// Configuration for a [`SessionDriver`].
#[derive(Debug, Clone)]
pub struct DriverConfig {
    /// Maximum number of requests sent before half-closing.
    pub send_quota: usize,

    /// Deadline for the whole session. `None` waits indefinitely.
    pub timeout: Option<Duration>,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            send_quota: 5,
            timeout: None,
        }
    }
}

impl DriverConfig {
    pub fn with_send_quota(mut self, quota: usize) -> Self {
        self.send_quota = quota;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// What happened over the course of one session.
#[derive(Debug)]
pub struct SessionReport {
    /// Requests successfully handed to the transport.
    pub sent: usize,
    /// Responses delivered to the caller.
    pub received: usize,
    pub state: SessionState,
    /// The failure that stopped the send loop early, if any.
    pub send_error: Option<TransportError>,
    /// A failure reported by `close_send`. The direction is closed regardless.
    pub close_error: Option<TransportError>,
    /// The failure that ended the receive loop, if it did not end cleanly.
    pub recv_error: Option<TransportError>,
}

impl SessionReport {
    /// True if every request went out, the half-close succeeded and the
    /// responder ended its stream normally.
    pub fn is_clean(&self) -> bool {
        self.send_error.is_none()
            && self.close_error.is_none()
            && self.recv_error.is_none()
            && self.state.recv == RecvState::Ended
    }

    /// All errors observed, send side first.
    pub fn errors(&self) -> impl Iterator<Item = &TransportError> {
        self.send_error
            .iter()
            .chain(self.close_error.iter())
            .chain(self.recv_error.iter())
    }
}

#[derive(Debug, Default)]
struct SendOutcome {
    sent: usize,
    state: SendState,
    error: Option<TransportError>,
    close_error: Option<TransportError>,
}

#[derive(Debug, Default)]
struct RecvOutcome {
    received: usize,
    state: RecvState,
    error: Option<TransportError>,
}

#[derive(Debug, Clone, Copy)]
struct Deadline {
    at: Instant,
    after: Duration,
}

/// Drives one bidirectional session to termination.
#[derive(Debug, Clone, Default)]
pub struct SessionDriver {
    config: DriverConfig,
    cancel: CancellationToken,
}

impl SessionDriver {
    pub fn new(config: DriverConfig) -> Self {
        Self {
            config,
            cancel: CancellationToken::new(),
        }
    }

    /// Abort the session when `token` is cancelled.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Run the session until both directions are terminal.
    ///
    /// Up to `send_quota` messages are taken from `outbound`; if it runs dry
    /// first the send direction is half-closed early. Every response is passed
    /// to `on_response` as it arrives.
    pub async fn run<S, R, I, F>(
        &self,
        duplex: Duplex<S, R>,
        outbound: I,
        mut on_response: F,
    ) -> SessionReport
    where
        S: SendHalf,
        R: RecvHalf,
        I: Stream<Item = S::Message>,
        F: FnMut(R::Message),
    {
        let deadline = self.config.timeout.map(|after| Deadline {
            at: Instant::now() + after,
            after,
        });
        let (sender, receiver) = duplex.split();

        let (send, recv) = tokio::join!(
            self.drive_send(sender, outbound, deadline),
            self.drive_recv(receiver, &mut on_response, deadline),
        );

        let report = SessionReport {
            sent: send.sent,
            received: recv.received,
            state: SessionState {
                send: send.state,
                recv: recv.state,
            },
            send_error: send.error,
            close_error: send.close_error,
            recv_error: recv.error,
        };

        debug!(
            sent = report.sent,
            received = report.received,
            recv_state = ?report.state.recv,
            "Session terminated"
        );
        report
    }

    /// Send loop. The sender is dropped on return, which half-closes the
    /// direction even when `close_send` was never reached.
    async fn drive_send<S, I>(
        &self,
        mut sender: S,
        outbound: I,
        deadline: Option<Deadline>,
    ) -> SendOutcome
    where
        S: SendHalf,
        I: Stream<Item = S::Message>,
    {
        let mut outbound = pin!(outbound);
        let mut outcome = SendOutcome::default();

        while outcome.sent < self.config.send_quota {
            let next = tokio::select! {
                biased;
                err = self.interrupted(deadline) => {
                    return outcome.abort(err);
                }
                () = sender.closed() => {
                    debug!(sent = outcome.sent, "Peer stopped receiving, closing send direction");
                    return outcome.abort(TransportError::Disconnected);
                }
                next = outbound.next() => next,
            };

            let Some(message) = next else {
                debug!(sent = outcome.sent, "Outbound source exhausted before quota");
                break;
            };

            let result = tokio::select! {
                biased;
                err = self.interrupted(deadline) => Err(err),
                result = sender.send(message) => result,
            };

            if let Err(error) = result {
                warn!(sent = outcome.sent, error = %error, "Send failed, closing send direction");
                return outcome.abort(error);
            }
            outcome.sent += 1;
        }

        outcome.state = SendState::Closing;
        debug!(sent = outcome.sent, "Half-closing send direction");

        if let Err(error) = sender.close_send().await {
            warn!(error = %error, "Half-close failed");
            outcome.close_error = Some(error);
        }
        outcome.state = SendState::Closed;
        outcome
    }

    async fn drive_recv<R, F>(
        &self,
        mut receiver: R,
        on_response: &mut F,
        deadline: Option<Deadline>,
    ) -> RecvOutcome
    where
        R: RecvHalf,
        F: FnMut(R::Message),
    {
        let mut outcome = RecvOutcome::default();

        loop {
            let result = tokio::select! {
                biased;
                err = self.interrupted(deadline) => Err(RecvError::Transport(err)),
                result = receiver.receive() => result,
            };

            match result {
                Ok(message) => {
                    outcome.received += 1;
                    on_response(message);
                }
                Err(RecvError::EndOfStream) => {
                    debug!(received = outcome.received, "Responder ended stream");
                    outcome.state = RecvState::Ended;
                    return outcome;
                }
                Err(RecvError::Transport(error)) => {
                    warn!(received = outcome.received, error = %error, "Receive failed");
                    outcome.state = RecvState::Failed;
                    outcome.error = Some(error);
                    return outcome;
                }
            }
        }
    }

    /// Resolves when the session is cancelled or its deadline passes.
    async fn interrupted(&self, deadline: Option<Deadline>) -> TransportError {
        let expired = async {
            match deadline {
                Some(deadline) => {
                    tokio::time::sleep_until(deadline.at).await;
                    TransportError::Timeout(deadline.after)
                }
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            _ = self.cancel.cancelled() => TransportError::Cancelled,
            err = expired => err,
        }
    }
}

impl SendOutcome {
    fn abort(mut self, error: TransportError) -> Self {
        self.state = SendState::Closed;
        self.error = Some(error);
        self
    }
}

#[cfg(test)]
mod tests {
    use futures::stream;

    use super::*;
    use crate::channel::{self, Endpoint, capacity};

    /// Answers every request with its double until the driver half-closes.
    async fn doubling_peer(mut peer: Endpoint<u32, u32>) {
        while let Ok(n) = peer.receive().await {
            if peer.send(n * 2).await.is_err() {
                return;
            }
        }
        let _ = peer.close_send().await;
    }

    #[tokio::test]
    async fn test_quota_reached_then_clean_end() {
        let (local, peer) = channel::pair::<u32, u32>(capacity(4));
        tokio::spawn(doubling_peer(peer));

        let driver = SessionDriver::new(DriverConfig::default().with_send_quota(3));
        let mut responses = Vec::new();
        let report = driver
            .run(local, stream::iter(1..=10), |n| responses.push(n))
            .await;

        assert!(report.is_clean());
        assert!(report.state.is_terminated());
        assert_eq!(report.state.send, SendState::Closed);
        assert_eq!(report.state.recv, RecvState::Ended);
        assert_eq!(report.sent, 3);
        assert_eq!(report.received, 3);
        assert_eq!(responses, vec![2, 4, 6]);
    }

    #[tokio::test]
    async fn test_source_exhausted_before_quota() {
        let (local, peer) = channel::pair::<u32, u32>(capacity(4));
        tokio::spawn(doubling_peer(peer));

        let driver = SessionDriver::new(DriverConfig::default().with_send_quota(5));
        let report = driver.run(local, stream::iter([7, 8]), |_| {}).await;

        assert!(report.is_clean());
        assert_eq!(report.sent, 2);
        assert_eq!(report.received, 2);
    }

    #[tokio::test]
    async fn test_empty_session_terminates() {
        let (local, peer) = channel::pair::<u32, u32>(capacity(1));
        tokio::spawn(doubling_peer(peer));

        let driver = SessionDriver::new(DriverConfig::default().with_send_quota(0));
        let report = driver.run(local, stream::iter(1..), |_| {}).await;

        assert!(report.is_clean());
        assert_eq!(report.sent, 0);
        assert_eq!(report.received, 0);
    }

    #[tokio::test]
    async fn test_sends_do_not_wait_for_responses() {
        // The peer reads every request before answering any, so a driver
        // that waited for each response in lockstep would never finish.
        let (local, mut peer) = channel::pair::<u32, u32>(capacity(1));
        tokio::spawn(async move {
            let mut seen = Vec::new();
            while let Ok(n) = peer.receive().await {
                seen.push(n);
            }
            for n in seen.into_iter().rev() {
                let _ = peer.send(n).await;
            }
        });

        let driver = SessionDriver::new(
            DriverConfig::default()
                .with_send_quota(4)
                .with_timeout(Duration::from_secs(5)),
        );
        let mut responses = Vec::new();
        let report = driver
            .run(local, stream::iter(1..=4), |n| responses.push(n))
            .await;

        assert!(report.is_clean());
        assert_eq!(responses, vec![4, 3, 2, 1]);
    }

    #[tokio::test]
    async fn test_send_failure_keeps_receiving() {
        // The peer answers once, stops reading, then finishes its own
        // direction normally.
        let (local, mut peer) = channel::pair::<u32, u32>(capacity(1));
        tokio::spawn(async move {
            let n = peer.receive().await.unwrap();
            let (mut tx, rx) = peer.split();
            drop(rx);
            tx.send(n).await.unwrap();
            tx.send(99).await.unwrap();
            tx.close_send().await.unwrap();
        });

        let driver = SessionDriver::new(
            DriverConfig::default()
                .with_send_quota(50)
                .with_timeout(Duration::from_secs(5)),
        );
        let mut responses = Vec::new();
        let report = driver
            .run(local, stream::iter(1..), |n| responses.push(n))
            .await;

        assert!(matches!(
            report.send_error,
            Some(TransportError::Disconnected)
        ));
        assert!(report.close_error.is_none());
        assert_eq!(report.state.send, SendState::Closed);
        assert_eq!(report.state.recv, RecvState::Ended);
        assert_eq!(responses, vec![1, 99]);
        assert!(report.sent < 50);
    }

    #[tokio::test]
    async fn test_receive_failure_keeps_sending() {
        let (local, mut peer) = channel::pair::<u32, u32>(capacity(8));
        tokio::spawn(async move {
            peer.sender_mut()
                .abort(TransportError::Status(tonic::Status::internal("boom")))
                .await
                .unwrap();
            while peer.receive().await.is_ok() {}
        });

        let driver = SessionDriver::new(DriverConfig::default().with_send_quota(5));
        let report = driver.run(local, stream::iter(1..), |_| {}).await;

        assert!(report.state.is_terminated());
        assert_eq!(report.state.recv, RecvState::Failed);
        assert!(matches!(
            report.recv_error,
            Some(TransportError::Status(ref status)) if status.code() == tonic::Code::Internal
        ));
        assert!(report.send_error.is_none());
        assert_eq!(report.sent, 5);
        assert!(!report.is_clean());
        assert_eq!(report.errors().count(), 1);
    }

    #[tokio::test]
    async fn test_timeout_fails_both_directions() {
        // A peer that never reads or answers and never closes.
        let (local, peer) = channel::pair::<u32, u32>(capacity(1));

        let driver = SessionDriver::new(
            DriverConfig::default()
                .with_send_quota(10)
                .with_timeout(Duration::from_millis(50)),
        );
        let report = driver.run(local, stream::iter(1..), |_| {}).await;
        drop(peer);

        assert!(report.state.is_terminated());
        assert_eq!(report.state.recv, RecvState::Failed);
        assert!(matches!(report.send_error, Some(TransportError::Timeout(_))));
        assert!(matches!(report.recv_error, Some(TransportError::Timeout(_))));
        assert_eq!(report.sent, 1);
    }

    #[tokio::test]
    async fn test_cancellation_aborts_session() {
        let (local, _peer) = channel::pair::<u32, u32>(capacity(1));
        let token = CancellationToken::new();
        let driver = SessionDriver::new(DriverConfig::default()).with_cancellation(token.clone());

        let cancel = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            token.cancel();
        });
        let report = driver.run(local, stream::pending(), |_| {}).await;
        cancel.await.unwrap();

        assert!(report.state.is_terminated());
        assert!(report.send_error.as_ref().is_some_and(TransportError::is_cancelled));
        assert!(report.recv_error.as_ref().is_some_and(TransportError::is_cancelled));
    }

    #[tokio::test]
    async fn test_peer_gone_ends_stalled_send() {
        let (local, peer) = channel::pair::<u32, u32>(capacity(1));
        let source = stream::iter([1u32]).chain(stream::pending());

        let driver = SessionDriver::new(DriverConfig::default());
        let session = driver.run(local, source, |_| {});
        let peer = tokio::spawn(async move {
            let mut peer = peer;
            let first = peer.receive().await.unwrap();
            drop(peer);
            first
        });

        let report = tokio::time::timeout(Duration::from_secs(1), session)
            .await
            .expect("session did not terminate");

        assert_eq!(peer.await.unwrap(), 1);
        assert_eq!(report.sent, 1);
        assert!(report.state.is_terminated());
        assert_eq!(report.state.recv, RecvState::Ended);
        assert!(matches!(report.send_error, Some(TransportError::Disconnected)));
    }
}
