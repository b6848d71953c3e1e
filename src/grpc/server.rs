use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use duplex::{CancellationToken, Responder, ResponseSink, SessionRegistry};
use futures::Stream;
use tokio::net::TcpListener;
use tokio_stream::wrappers::{ReceiverStream, TcpListenerStream};
use tonic::{Request, Response, Status, Streaming};
use tracing::{debug, info, warn};

use crate::config::ServerConfig;
use crate::error::GreeterError;
use crate::greeting::{self, SERVER_STREAM_COUNT};
use crate::proto::greeting_service_server::{GreetingService, GreetingServiceServer};
use crate::proto::{self, HelloRequest, HelloResponse};

pub const SERVER_STREAM_METHOD: &str = "hello.GreetingService/HelloServerStream";
pub const CLIENT_STREAM_METHOD: &str = "hello.GreetingService/HelloClientStream";
pub const BI_STREAMS_METHOD: &str = "hello.GreetingService/HelloBiStreams";

type ResponseStream = Pin<Box<dyn Stream<Item = Result<HelloResponse, Status>> + Send>>;

/// Bind `config.addr` and serve until Ctrl+C or SIGTERM.
pub async fn start_server(config: ServerConfig) -> Result<(), GreeterError> {
    let listener = TcpListener::bind(config.addr).await?;
    serve(listener, config, shutdown_signal()).await
}

/// Serve on an already-bound listener until `shutdown` resolves.
///
/// Shutdown stops accepting connections and waits for in-flight sessions.
/// If `drain_timeout` elapses first, the remaining sessions are cancelled.
pub async fn serve<F>(
    listener: TcpListener,
    config: ServerConfig,
    shutdown: F,
) -> Result<(), GreeterError>
where
    F: Future<Output = ()> + Send,
{
    let abort = CancellationToken::new();
    let sessions = Arc::new(SessionRegistry::new());
    let service = GreetingServiceImpl::new(config.clone(), Arc::clone(&sessions), abort.clone());

    let reflection = if config.reflection {
        Some(
            tonic_reflection::server::Builder::configure()
                .register_encoded_file_descriptor_set(proto::FILE_DESCRIPTOR_SET)
                .build_v1()?,
        )
    } else {
        None
    };

    info!(
        addr = %listener.local_addr()?,
        reflection = config.reflection,
        "gRPC server starting"
    );

    let drain = async move {
        shutdown.await;
        info!(in_flight = sessions.len(), "Stopping gRPC server, draining sessions");

        if let Some(limit) = config.drain_timeout {
            tokio::spawn(async move {
                tokio::time::sleep(limit).await;
                if !sessions.is_empty() {
                    warn!(
                        in_flight = sessions.len(),
                        "Drain timeout elapsed, cancelling remaining sessions"
                    );
                }
                abort.cancel();
            });
        }
    };

    tonic::transport::Server::builder()
        .add_service(GreetingServiceServer::new(service))
        .add_optional_service(reflection)
        .serve_with_incoming_shutdown(TcpListenerStream::new(listener), drain)
        .await?;

    info!("gRPC server shut down");
    Ok(())
}

/// Resolves on Ctrl+C, or SIGTERM on unix.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, initiating graceful shutdown"),
        _ = terminate => info!("Received SIGTERM, initiating graceful shutdown"),
    }
}

/// The greeting service: four call patterns over one `HelloRequest` /
/// `HelloResponse` schema.
#[derive(Debug, Clone)]
pub struct GreetingServiceImpl {
    config: ServerConfig,
    sessions: Arc<SessionRegistry>,
    abort: CancellationToken,
}

impl GreetingServiceImpl {
    pub fn new(
        config: ServerConfig,
        sessions: Arc<SessionRegistry>,
        abort: CancellationToken,
    ) -> Self {
        Self {
            config,
            sessions,
            abort,
        }
    }
}

#[tonic::async_trait]
impl GreetingService for GreetingServiceImpl {
    type HelloServerStreamStream = ResponseStream;
    type HelloBiStreamsStream = ResponseStream;

    async fn hello(
        &self,
        request: Request<HelloRequest>,
    ) -> Result<Response<HelloResponse>, Status> {
        let req = request.into_inner();
        Ok(Response::new(HelloResponse {
            message: greeting::greet(&req.name),
        }))
    }

    async fn hello_server_stream(
        &self,
        request: Request<HelloRequest>,
    ) -> Result<Response<Self::HelloServerStreamStream>, Status> {
        let name = request.into_inner().name;
        let guard = self.sessions.open(SERVER_STREAM_METHOD);
        let interval = self.config.stream_interval;
        let abort = self.abort.clone();

        let outbound = async_stream::stream! {
            let _guard = guard;
            for i in 0..SERVER_STREAM_COUNT {
                yield Ok(HelloResponse {
                    message: greeting::numbered_greeting(i, &name),
                });

                let aborted = tokio::select! {
                    biased;
                    _ = abort.cancelled() => true,
                    _ = tokio::time::sleep(interval) => false,
                };
                if aborted {
                    yield Err(Status::cancelled("server shutting down"));
                    break;
                }
            }
        };

        Ok(Response::new(Box::pin(outbound)))
    }

    async fn hello_client_stream(
        &self,
        request: Request<Streaming<HelloRequest>>,
    ) -> Result<Response<HelloResponse>, Status> {
        let mut inbound = request.into_inner();
        let _guard = self.sessions.open(CLIENT_STREAM_METHOD);
        let mut names = Vec::new();

        loop {
            let next = tokio::select! {
                biased;
                _ = self.abort.cancelled() => {
                    return Err(Status::cancelled("server shutting down"));
                }
                next = inbound.message() => next?,
            };

            match next {
                Some(req) => names.push(req.name),
                None => break,
            }
        }

        debug!(count = names.len(), "Client stream ended");
        Ok(Response::new(HelloResponse {
            message: greeting::list_greeting(&names),
        }))
    }

    async fn hello_bi_streams(
        &self,
        request: Request<Streaming<HelloRequest>>,
    ) -> Result<Response<Self::HelloBiStreamsStream>, Status> {
        let mut inbound = request.into_inner();
        let (mut outbound, rx) =
            ResponseSink::<HelloResponse>::channel(self.config.channel_capacity);
        let guard = self.sessions.open(BI_STREAMS_METHOD);
        let mut responder = Responder::new(echo).with_cancellation(self.abort.clone());

        tokio::spawn(async move {
            let session_id = guard.id();

            match responder.run(&mut inbound, &mut outbound).await {
                Ok(handled) => {
                    debug!(session_id = %session_id, handled, "Bidirectional session finished");
                }
                Err(err) => {
                    warn!(session_id = %session_id, error = %err, "Bidirectional session aborted");
                    // Nobody is listening if the initiator already went away.
                    let _ = outbound.fail(err.into()).await;
                }
            }
        });

        Ok(Response::new(Box::pin(ReceiverStream::new(rx))))
    }
}

fn echo(req: HelloRequest) -> HelloResponse {
    HelloResponse {
        message: greeting::greet(&req.name),
    }
}
