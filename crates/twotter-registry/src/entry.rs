//! Registry types: the configuration and the per-client record.
//!
//! An entry is the server's belief that a client id is reachable at an
//! address. It tracks:
//! - WHERE the client is (`addr`)
//! - WHEN we last heard from it (`last_seen`), so idle entries can expire

use std::net::SocketAddr;
use std::time::Duration;

use tokio::time::Instant;

// ---------------------------------------------------------------------------
// RegistryConfig
// ---------------------------------------------------------------------------

/// Liveness settings for the registry.
///
/// `Default` gives the protocol's standard values; tests usually shrink
/// them.
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// How long an entry may go untouched before the sweep removes it.
    ///
    /// Default: 300 seconds.
    pub ttl: Duration,

    /// How often the server runs the sweep.
    ///
    /// Default: 60 seconds.
    pub sweep_interval: Duration,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(300),
            sweep_interval: Duration::from_secs(60),
        }
    }
}

// ---------------------------------------------------------------------------
// Registration
// ---------------------------------------------------------------------------

/// One registered client.
///
/// `Instant` here is Tokio's, so paused-clock tests drive expiry without
/// sleeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Registration {
    /// The address datagrams for this client are sent to.
    pub addr: SocketAddr,

    /// Last time any datagram from this client was processed.
    pub last_seen: Instant,
}

impl Registration {
    /// `true` once more than `ttl` has passed between `last_seen` and `now`.
    ///
    /// An entry touched exactly `ttl` ago is still alive.
    pub fn is_expired(&self, now: Instant, ttl: Duration) -> bool {
        now.saturating_duration_since(self.last_seen) > ttl
    }
}
