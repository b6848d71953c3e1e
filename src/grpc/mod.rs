mod client;
mod server;

pub use client::{BiStreams, GreeterClient};
pub use server::{
    BI_STREAMS_METHOD, CLIENT_STREAM_METHOD, GreetingServiceImpl, SERVER_STREAM_METHOD, serve,
    shutdown_signal, start_server,
};
