use std::net::SocketAddr;

/// Errors that can occur in the transport layer.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Binding the local socket failed.
    #[error("bind failed: {0}")]
    BindFailed(#[source] std::io::Error),

    /// Sending a datagram failed.
    #[error("send to {addr} failed: {source}")]
    SendFailed {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// Receiving a datagram failed.
    #[error("receive failed: {0}")]
    ReceiveFailed(#[source] std::io::Error),

    /// The socket's local address could not be determined.
    #[error("local address unavailable: {0}")]
    LocalAddr(#[source] std::io::Error),
}
