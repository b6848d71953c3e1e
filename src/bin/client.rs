use std::num::NonZeroUsize;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use duplex::CancellationToken;
use tokio::io::BufReader;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use hello_grpc::config::{DEFAULT_CHANNEL_CAPACITY, DEFAULT_SEND_COUNT};
use hello_grpc::menu::{self, Console};
use hello_grpc::{ClientConfig, GreeterClient};

/// Interactive greeting gRPC client
#[derive(Parser, Debug)]
#[command(name = "client")]
#[command(about = "Calls the hello.GreetingService from a numbered menu")]
struct Args {
    /// Server URI
    #[arg(long, default_value = "http://localhost:8080")]
    endpoint: String,

    /// Seconds to wait for the connection
    #[arg(long, default_value_t = 5)]
    connect_timeout_secs: u64,

    /// Per-call timeout in seconds (unset waits indefinitely)
    #[arg(long)]
    call_timeout_secs: Option<u64>,

    /// Names sent per streaming call
    #[arg(long, default_value_t = DEFAULT_SEND_COUNT)]
    send_count: usize,

    /// Capacity of the outbound request queue
    #[arg(long, default_value_t = DEFAULT_CHANNEL_CAPACITY)]
    channel_capacity: NonZeroUsize,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so they never interleave with menu output.
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::WARN.into()))
        .init();

    let args = Args::parse();

    let config = ClientConfig::new(args.endpoint)
        .with_connect_timeout(Duration::from_secs(args.connect_timeout_secs))
        .with_call_timeout(args.call_timeout_secs.map(Duration::from_secs))
        .with_send_count(args.send_count)
        .with_channel_capacity(args.channel_capacity);

    println!("start gRPC Client.");

    let mut client = GreeterClient::connect(config).await?;
    // Ctrl+C aborts a running session and ends the menu instead of killing
    // the process mid-call.
    let interrupt = CancellationToken::new();
    tokio::spawn({
        let interrupt = interrupt.clone();
        async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => interrupt.cancel(),
                Err(e) => tracing::error!(error = %e, "Failed to install Ctrl+C handler"),
            }
        }
    });

    let mut console = Console::new(BufReader::new(tokio::io::stdin()), std::io::stdout())
        .with_interrupt(interrupt.clone());

    menu::run_menu(&mut client, &mut console).await?;

    if interrupt.is_cancelled() {
        // A stdin read may still be parked on the blocking pool, which would
        // keep the runtime from shutting down.
        std::process::exit(130);
    }

    Ok(())
}
