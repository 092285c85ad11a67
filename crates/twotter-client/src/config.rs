//! Session configuration.

use std::net::SocketAddr;
use std::time::Duration;

use twotter_protocol::ClientId;

/// Default time to wait for the server's HELLO reply.
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);

/// Default interval between keepalive LIST_ONLINE requests.
///
/// Well under the server's 300 s registration TTL, so an otherwise idle
/// client stays registered.
pub const DEFAULT_KEEPALIVE_INTERVAL: Duration = Duration::from_secs(60);

/// Everything a [`ChatSession`](crate::ChatSession) needs to connect.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Where the chat server listens.
    pub server_addr: SocketAddr,

    /// The id to claim. Must be non-zero; `0` is reserved for broadcast.
    pub client_id: ClientId,

    /// Display name. Truncated to 20 bytes on the wire.
    pub name: String,

    /// How long `connect` waits for the handshake to resolve.
    pub handshake_timeout: Duration,

    /// How often to send a LIST_ONLINE while connected. `None` disables
    /// the keepalive; the client then only refreshes its registration when
    /// it sends something.
    pub keepalive_interval: Option<Duration>,
}

impl SessionConfig {
    /// A config with default timeouts.
    pub fn new(server_addr: SocketAddr, client_id: ClientId, name: impl Into<String>) -> Self {
        Self {
            server_addr,
            client_id,
            name: name.into(),
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
            keepalive_interval: Some(DEFAULT_KEEPALIVE_INTERVAL),
        }
    }

    pub fn handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    pub fn keepalive_interval(mut self, interval: Option<Duration>) -> Self {
        self.keepalive_interval = interval;
        self
    }
}
