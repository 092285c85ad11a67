//! Wire protocol for Twotter.
//!
//! This crate defines the one record that travels between chat clients and
//! the server:
//!
//! - **Types** ([`Message`], [`MessageKind`], [`ClientId`]): the fields
//!   and their conventions.
//! - **Codec** ([`Codec`] trait, [`RecordCodec`]): the fixed 177-byte,
//!   big-endian layout.
//! - **Errors** ([`ProtocolError`]): ways a datagram can be malformed.
//!
//! # Architecture
//!
//! ```text
//! Transport (datagrams) → Protocol (Message) → Server dispatch / Client session
//! ```

mod codec;
mod error;
mod types;

pub use codec::{BODY_WIDTH, Codec, NAME_WIDTH, RECORD_SIZE, RecordCodec};
pub use error::ProtocolError;
pub use types::{
    ClientId, ERR_ID_ALREADY_CONNECTED, ERR_RECIPIENT_NOT_FOUND, ERR_RESERVED_ID, MAX_BODY_LEN,
    MAX_NAME_LEN, Message, MessageKind, SERVER_NAME, format_id_list,
    parse_id_list, truncate_utf8,
};
