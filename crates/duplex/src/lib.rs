//! Transport-agnostic bidirectional streaming sessions.
//!
//! A session is a pair of independent directions over one connection. This
//! crate provides the transport traits ([`SendHalf`], [`RecvHalf`]), an
//! in-memory transport, tonic adapters, and the two endpoints of a session:
//! the [`SessionDriver`] on the initiator side and the [`Responder`] on the
//! responder side.
//!
//! # Example
//!
//! ```ignore
//! use duplex::{DriverConfig, SessionDriver};
//!
//! let driver = SessionDriver::new(DriverConfig::default().with_send_quota(5));
//! let report = driver
//!     .run(duplex, names, |response| println!("{}", response.message))
//!     .await;
//! assert!(report.state.is_terminated());
//! ```

pub mod channel;
pub mod driver;
pub mod error;
pub mod grpc;
pub mod responder;
pub mod session;
pub mod transport;

pub use driver::{DriverConfig, RecvState, SendState, SessionDriver, SessionReport, SessionState};
pub use error::{RecvError, TransportError};
pub use grpc::{RequestSink, ResponseSink};
pub use responder::Responder;
pub use session::{SessionGuard, SessionId, SessionRegistry};
pub use transport::{Duplex, RecvHalf, SendHalf};

pub use tokio_util::sync::CancellationToken;
