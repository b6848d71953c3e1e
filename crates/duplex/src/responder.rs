use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{RecvError, TransportError};
use crate::transport::{RecvHalf, SendHalf};

/// The responder side of a bidirectional session.
///
/// Answers each inbound request with exactly one response computed from that
/// request alone, until the initiator half-closes. Holds at most the one
/// request currently being answered.
#[derive(Debug, Clone)]
pub struct Responder<F> {
    reply: F,
    cancel: CancellationToken,
}

impl<F> Responder<F> {
    pub fn new(reply: F) -> Self {
        Self {
            reply,
            cancel: CancellationToken::new(),
        }
    }

    /// Stop the loop when `token` is cancelled.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Run the receive/reply loop.
    ///
    /// Returns the number of requests answered once the initiator ends its
    /// stream. Any receive failure other than end-of-stream, any send failure
    /// and cancellation all end the loop with that error; a response is
    /// either sent whole or not at all.
    pub async fn run<Req, Resp, R, S>(
        &mut self,
        inbound: &mut R,
        outbound: &mut S,
    ) -> Result<usize, TransportError>
    where
        R: RecvHalf<Message = Req>,
        S: SendHalf<Message = Resp>,
        F: FnMut(Req) -> Resp,
    {
        let mut handled = 0;

        loop {
            let received = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    debug!(handled, "Responder cancelled while waiting");
                    return Err(TransportError::Cancelled);
                }
                received = inbound.receive() => received,
            };

            let request = match received {
                Ok(request) => request,
                Err(RecvError::EndOfStream) => {
                    debug!(handled, "Initiator closed its send direction");
                    return Ok(handled);
                }
                Err(RecvError::Transport(err)) => return Err(err),
            };

            let response = (self.reply)(request);

            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    debug!(handled, "Responder cancelled while sending");
                    return Err(TransportError::Cancelled);
                }
                sent = outbound.send(response) => sent?,
            }
            handled += 1;
        }
    }
}
