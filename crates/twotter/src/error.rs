//! Unified error type for Twotter.

use twotter_client::ClientError;
use twotter_transport::TransportError;

/// Top-level error that wraps the crate-specific errors.
///
/// When using the `twotter` meta-crate you deal with this single type
/// instead of importing errors from each sub-crate; `?` converts them.
#[derive(Debug, thiserror::Error)]
pub enum TwotterError {
    /// Binding, sending or receiving failed.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A chat session failed to connect or was used after closing.
    #[error(transparent)]
    Client(#[from] ClientError),
}
