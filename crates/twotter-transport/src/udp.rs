//! UDP transport implementation using `tokio::net::UdpSocket`.

use std::net::SocketAddr;

use tokio::net::{ToSocketAddrs, UdpSocket};

use crate::{Transport, TransportError};

/// Receive buffer size. Comfortably above the protocol's record size so an
/// oversized datagram is seen as oversized instead of silently cut to fit.
pub const MAX_DATAGRAM_SIZE: usize = 1024;

/// A UDP socket implementing [`Transport`].
#[derive(Debug)]
pub struct UdpTransport {
    socket: UdpSocket,
}

impl UdpTransport {
    /// Binds a new UDP socket to the given address.
    ///
    /// Use port `0` to let the OS pick one; [`Transport::local_addr`]
    /// reports what was chosen.
    pub async fn bind(addr: impl ToSocketAddrs) -> Result<Self, TransportError> {
        let socket = UdpSocket::bind(addr)
            .await
            .map_err(TransportError::BindFailed)?;
        if let Ok(local) = socket.local_addr() {
            tracing::debug!(%local, "UDP transport bound");
        }
        Ok(Self { socket })
    }
}

impl Transport for UdpTransport {
    async fn send_to(
        &self,
        data: &[u8],
        addr: SocketAddr,
    ) -> Result<(), TransportError> {
        self.socket
            .send_to(data, addr)
            .await
            .map(|_| ())
            .map_err(|source| TransportError::SendFailed { addr, source })
    }

    async fn recv_from(&self) -> Result<(Vec<u8>, SocketAddr), TransportError> {
        let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];
        let (len, from) = self
            .socket
            .recv_from(&mut buf)
            .await
            .map_err(TransportError::ReceiveFailed)?;
        buf.truncate(len);
        Ok((buf, from))
    }

    fn local_addr(&self) -> Result<SocketAddr, TransportError> {
        self.socket.local_addr().map_err(TransportError::LocalAddr)
    }
}
