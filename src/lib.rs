//! A greeting service exposing the four gRPC call patterns: unary, server
//! streaming, client streaming and bidirectional streaming.
//!
//! The bidirectional pattern is built on the [`duplex`] crate: the server runs
//! a [`duplex::Responder`] per session and the client drives its end with a
//! [`duplex::SessionDriver`].

pub mod config;
pub mod error;
pub mod greeting;
pub mod grpc;
pub mod menu;

pub use config::{ClientConfig, ServerConfig};
pub use error::GreeterError;
pub use grpc::GreeterClient;

pub mod proto {
    tonic::include_proto!("hello");

    /// Encoded descriptors of `hello.proto`, served over reflection.
    pub const FILE_DESCRIPTOR_SET: &[u8] = tonic::include_file_descriptor_set!("hello_descriptor");
}
