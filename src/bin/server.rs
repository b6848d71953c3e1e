use std::net::SocketAddr;
use std::num::NonZeroUsize;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use hello_grpc::ServerConfig;
use hello_grpc::config::DEFAULT_CHANNEL_CAPACITY;
use hello_grpc::grpc;

/// Greeting gRPC server
#[derive(Parser, Debug)]
#[command(name = "server")]
#[command(about = "Serves the hello.GreetingService over plaintext gRPC")]
struct Args {
    /// Address to listen on
    #[arg(long, default_value = "0.0.0.0:8080")]
    addr: SocketAddr,

    /// Milliseconds between server-stream messages
    #[arg(long, default_value_t = 1000)]
    stream_interval_ms: u64,

    /// Capacity of each session's response queue
    #[arg(long, default_value_t = DEFAULT_CHANNEL_CAPACITY)]
    channel_capacity: NonZeroUsize,

    /// Seconds in-flight sessions may run after shutdown starts (0 waits forever)
    #[arg(long, default_value_t = 10)]
    drain_timeout_secs: u64,

    /// Do not serve the gRPC reflection service
    #[arg(long)]
    no_reflection: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let args = Args::parse();

    let drain_timeout =
        (args.drain_timeout_secs > 0).then(|| Duration::from_secs(args.drain_timeout_secs));
    let config = ServerConfig::new(args.addr)
        .with_stream_interval(Duration::from_millis(args.stream_interval_ms))
        .with_channel_capacity(args.channel_capacity)
        .with_drain_timeout(drain_timeout)
        .with_reflection(!args.no_reflection);

    grpc::start_server(config).await?;

    Ok(())
}
