//! Transport abstraction layer for Twotter.
//!
//! Provides the [`Transport`] trait, a connectionless datagram socket, and
//! [`UdpTransport`], its UDP implementation. There is no connection object:
//! every send names its destination and every receive reports its source.

mod error;
mod udp;

pub use error::TransportError;
pub use udp::{MAX_DATAGRAM_SIZE, UdpTransport};

use std::future::Future;
use std::net::SocketAddr;

/// A bound datagram endpoint.
///
/// The futures are `Send` so generic callers can run inside
/// `tokio::spawn`ed tasks.
pub trait Transport: Send + Sync + 'static {
    /// Sends one datagram to `addr`.
    fn send_to(
        &self,
        data: &[u8],
        addr: SocketAddr,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Waits for the next datagram and returns it with its source address.
    ///
    /// Datagrams larger than [`MAX_DATAGRAM_SIZE`] are truncated to that
    /// size, which is still large enough for the protocol layer to see the
    /// wrong length and reject them.
    fn recv_from(
        &self,
    ) -> impl Future<Output = Result<(Vec<u8>, SocketAddr), TransportError>> + Send;

    /// The address this endpoint is bound to.
    fn local_addr(&self) -> Result<SocketAddr, TransportError>;
}
