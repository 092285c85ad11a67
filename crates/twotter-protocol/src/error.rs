//! Error types for the protocol layer.
//!
//! Every variant describes a malformed datagram. The server drops such
//! datagrams after logging them; the client skips them. Nothing in the
//! protocol layer is fatal.

/// Errors that can occur while decoding a wire record.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    /// The datagram is not exactly one record long.
    ///
    /// UDP preserves datagram boundaries, so a short or long datagram is
    /// never a partial read: it was produced by something that does not
    /// speak this protocol.
    #[error("malformed message: expected {expected} bytes, got {actual}")]
    WrongSize { expected: usize, actual: usize },

    /// The `kind` field holds a value outside `0..=4`.
    #[error("malformed message: unknown kind {0}")]
    UnknownKind(u32),

    /// A text field is not valid UTF-8 once its padding is removed.
    #[error("malformed message: {field} is not valid UTF-8")]
    InvalidText { field: &'static str },
}
