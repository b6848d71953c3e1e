use std::future::Future;

use duplex::{Duplex, RequestSink, SessionDriver, SessionReport};
use futures::{Stream, StreamExt};
use tokio_stream::wrappers::ReceiverStream;
use tonic::transport::{Channel, Endpoint};
use tonic::Streaming;
use tracing::debug;

use crate::config::ClientConfig;
use crate::error::GreeterError;
use crate::proto::greeting_service_client::GreetingServiceClient;
use crate::proto::{HelloRequest, HelloResponse};

/// Initiator end of a bidirectional greeting session.
pub type BiStreams = Duplex<RequestSink<HelloRequest>, Streaming<HelloResponse>>;

/// A connected greeting client.
///
/// Holds the channel and settings shared by every call; pass it to whatever
/// needs to make calls instead of keeping it in a global.
#[derive(Debug, Clone)]
pub struct GreeterClient {
    inner: GreetingServiceClient<Channel>,
    config: ClientConfig,
}

impl GreeterClient {
    /// Connect to `config.endpoint`.
    pub async fn connect(config: ClientConfig) -> Result<Self, GreeterError> {
        let endpoint = Endpoint::from_shared(config.endpoint.clone())
            .map_err(|source| GreeterError::InvalidEndpoint {
                endpoint: config.endpoint.clone(),
                source,
            })?
            .connect_timeout(config.connect_timeout);

        let channel = endpoint.connect().await?;
        debug!(endpoint = %config.endpoint, "Connected");

        Ok(Self {
            inner: GreetingServiceClient::new(channel),
            config,
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Unary call.
    pub async fn hello(&mut self, name: impl Into<String>) -> Result<String, GreeterError> {
        let request = HelloRequest { name: name.into() };
        let inner = &mut self.inner;
        let response = with_timeout(self.config.call_timeout, inner.hello(request)).await??;
        Ok(response.into_inner().message)
    }

    /// Server-streaming call. Each message is passed to `on_message` as it
    /// arrives; returns how many arrived before the server ended the stream.
    pub async fn hello_server_stream<F>(
        &mut self,
        name: impl Into<String>,
        mut on_message: F,
    ) -> Result<usize, GreeterError>
    where
        F: FnMut(String),
    {
        let request = HelloRequest { name: name.into() };
        let inner = &mut self.inner;

        let call = async move {
            let mut stream = inner.hello_server_stream(request).await?.into_inner();
            let mut count = 0;
            while let Some(response) = stream.message().await? {
                count += 1;
                on_message(response.message);
            }
            Ok::<_, GreeterError>(count)
        };

        with_timeout(self.config.call_timeout, call).await?
    }

    /// Client-streaming call: sends every name, half-closes, and returns the
    /// single aggregate response.
    pub async fn hello_client_stream<I>(&mut self, names: I) -> Result<String, GreeterError>
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        let requests: Vec<HelloRequest> = names
            .into_iter()
            .map(|name| HelloRequest { name: name.into() })
            .collect();
        let inner = &mut self.inner;

        let response = with_timeout(
            self.config.call_timeout,
            inner.hello_client_stream(futures::stream::iter(requests)),
        )
        .await??;
        Ok(response.into_inner().message)
    }

    /// Open a bidirectional session without driving it.
    pub async fn open_bi_streams(&mut self) -> Result<BiStreams, GreeterError> {
        let (sender, rx) = RequestSink::channel(self.config.channel_capacity);
        let response = self.inner.hello_bi_streams(ReceiverStream::new(rx)).await?;
        Ok(Duplex::new(sender, response.into_inner()))
    }

    /// Bidirectional call driven to completion.
    ///
    /// Sends up to `send_count` names from `names` while concurrently passing
    /// each response to `on_message`. Failures of either direction are
    /// recorded in the returned report; only a failure to open the session is
    /// returned as an error.
    pub async fn hello_bi_streams<I, F>(
        &mut self,
        names: I,
        on_message: F,
    ) -> Result<SessionReport, GreeterError>
    where
        I: Stream<Item = String>,
        F: FnMut(String),
    {
        let driver = SessionDriver::new(self.config.driver_config());
        self.hello_bi_streams_with(driver, names, on_message).await
    }

    /// Like [`hello_bi_streams`](Self::hello_bi_streams) with a caller-built
    /// driver, e.g. one tied to a cancellation token.
    pub async fn hello_bi_streams_with<I, F>(
        &mut self,
        driver: SessionDriver,
        names: I,
        mut on_message: F,
    ) -> Result<SessionReport, GreeterError>
    where
        I: Stream<Item = String>,
        F: FnMut(String),
    {
        let session = self.open_bi_streams().await?;
        let requests = names.map(|name| HelloRequest { name });

        Ok(driver
            .run(session, requests, |response| on_message(response.message))
            .await)
    }
}

async fn with_timeout<F: Future>(
    timeout: Option<std::time::Duration>,
    fut: F,
) -> Result<F::Output, GreeterError> {
    match timeout {
        Some(limit) => tokio::time::timeout(limit, fut)
            .await
            .map_err(|_| GreeterError::Timeout(limit)),
        None => Ok(fut.await),
    }
}
