use std::time::Duration;

use twotter_protocol::{ClientId, MessageKind};
use twotter_transport::TransportError;

/// Errors surfaced to the caller of a [`ChatSession`](crate::ChatSession).
///
/// The first four end the connection attempt; the session is never
/// returned and its socket is dropped.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The server answered the HELLO with an ERROR: the id is taken.
    #[error("client id {0} is already connected")]
    DuplicateIdentifier(ClientId),

    /// Id `0` addresses broadcasts and cannot be claimed.
    #[error("client id 0 is reserved for broadcast")]
    ReservedIdentifier,

    /// No handshake reply arrived before the deadline.
    #[error("no handshake reply within {0:?}")]
    HandshakeTimeout(Duration),

    /// The server answered the HELLO with something other than HELLO or
    /// ERROR.
    #[error("unexpected {0} during handshake")]
    UnexpectedMessage(MessageKind),

    /// The session has been closed; nothing more can be sent on it.
    #[error("session is closed")]
    Closed,

    #[error(transparent)]
    Transport(#[from] TransportError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_identifier_message_names_the_id() {
        let err = ClientError::DuplicateIdentifier(ClientId(7));
        assert_eq!(err.to_string(), "client id 7 is already connected");
    }

    #[test]
    fn test_reserved_identifier_message() {
        assert_eq!(
            ClientError::ReservedIdentifier.to_string(),
            "client id 0 is reserved for broadcast"
        );
    }

    #[test]
    fn test_unexpected_message_names_the_kind() {
        let err = ClientError::UnexpectedMessage(MessageKind::ListOnline);
        assert_eq!(err.to_string(), "unexpected LIST_ONLINE during handshake");
    }

    #[test]
    fn test_from_transport_error() {
        let io = std::io::Error::new(std::io::ErrorKind::AddrInUse, "taken");
        let err: ClientError = TransportError::BindFailed(io).into();
        assert!(matches!(err, ClientError::Transport(_)));
        assert!(err.to_string().contains("taken"));
    }
}
