use std::net::{Ipv4Addr, SocketAddr};
use std::num::NonZeroUsize;
use std::time::Duration;

use duplex::DriverConfig;

/// Port the reference deployment listens on.
pub const DEFAULT_PORT: u16 = 8080;

/// Names read per streaming call from the menu.
pub const DEFAULT_SEND_COUNT: usize = 5;

/// Bound of every per-session message queue.
pub const DEFAULT_CHANNEL_CAPACITY: NonZeroUsize = NonZeroUsize::new(16).unwrap();

/// Configuration for the greeting server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address the listener binds to.
    pub addr: SocketAddr,

    /// Pause after each message of the server-streaming call.
    pub stream_interval: Duration,

    /// Capacity of each bidirectional session's response queue.
    pub channel_capacity: NonZeroUsize,

    /// How long in-flight sessions may keep running once shutdown starts.
    /// `None` waits for them indefinitely.
    pub drain_timeout: Option<Duration>,

    /// Serve the gRPC reflection service so tools can discover the schema.
    pub reflection: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from((Ipv4Addr::UNSPECIFIED, DEFAULT_PORT)),
            stream_interval: Duration::from_secs(1),
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            drain_timeout: Some(Duration::from_secs(10)),
            reflection: true,
        }
    }
}

impl ServerConfig {
    pub fn new(addr: SocketAddr) -> Self {
        Self {
            addr,
            ..Default::default()
        }
    }

    pub fn with_stream_interval(mut self, interval: Duration) -> Self {
        self.stream_interval = interval;
        self
    }

    pub fn with_channel_capacity(mut self, capacity: NonZeroUsize) -> Self {
        self.channel_capacity = capacity;
        self
    }

    pub fn with_drain_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.drain_timeout = timeout;
        self
    }

    pub fn with_reflection(mut self, enabled: bool) -> Self {
        self.reflection = enabled;
        self
    }
}

/// Configuration for the greeting client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Server URI, e.g. `http://localhost:8080`.
    pub endpoint: String,

    /// Timeout for establishing the connection.
    pub connect_timeout: Duration,

    /// Per-call timeout. `None` lets calls run indefinitely.
    pub call_timeout: Option<Duration>,

    /// Names sent per client-streaming or bidirectional call.
    pub send_count: usize,

    /// Capacity of the outbound request queue of streaming calls.
    pub channel_capacity: NonZeroUsize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: format!("http://localhost:{DEFAULT_PORT}"),
            connect_timeout: Duration::from_secs(5),
            call_timeout: None,
            send_count: DEFAULT_SEND_COUNT,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

impl ClientConfig {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            ..Default::default()
        }
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_call_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.call_timeout = timeout;
        self
    }

    pub fn with_send_count(mut self, count: usize) -> Self {
        self.send_count = count;
        self
    }

    pub fn with_channel_capacity(mut self, capacity: NonZeroUsize) -> Self {
        self.channel_capacity = capacity;
        self
    }

    /// Driver settings for one bidirectional session.
    pub(crate) fn driver_config(&self) -> DriverConfig {
        DriverConfig {
            send_quota: self.send_count,
            timeout: self.call_timeout,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.addr.port(), 8080);
        assert_eq!(config.stream_interval, Duration::from_secs(1));
        assert_eq!(config.channel_capacity.get(), 16);
        assert!(config.reflection);
    }

    #[test]
    fn test_client_driver_config() {
        let config = ClientConfig::new("http://127.0.0.1:9000")
            .with_send_count(3)
            .with_call_timeout(Some(Duration::from_secs(2)));

        let driver = config.driver_config();
        assert_eq!(driver.send_quota, 3);
        assert_eq!(driver.timeout, Some(Duration::from_secs(2)));
        assert_eq!(config.endpoint, "http://127.0.0.1:9000");
    }
}
