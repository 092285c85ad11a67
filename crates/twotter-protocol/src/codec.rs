//! Codec trait and the fixed-record implementation.
//!
//! The server and client only depend on [`Codec`]. [`RecordCodec`] is the
//! single implementation and owns the byte layout:
//!
//! ```text
//! offset  size  field
//!      0     4  kind        (u32, big-endian)
//!      4     4  origin_id   (u32, big-endian)
//!      8     4  dest_id     (u32, big-endian)
//!     12     4  body_len    (u32, big-endian, informational)
//!     16    20  sender_name (UTF-8, NUL-padded)
//!     36   141  body        (UTF-8, NUL-padded)
//!    177        total
//! ```

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::types::{truncate_utf8, MAX_BODY_LEN, MAX_NAME_LEN};
use crate::{ClientId, Message, MessageKind, ProtocolError};

/// Width of the name field on the wire.
pub const NAME_WIDTH: usize = 20;

/// Width of the body field on the wire.
pub const BODY_WIDTH: usize = 141;

/// Size of the four integer fields.
const HEADER_SIZE: usize = 4 * 4;

/// Size of every datagram this protocol produces or accepts.
pub const RECORD_SIZE: usize = HEADER_SIZE + NAME_WIDTH + BODY_WIDTH;

/// Converts messages to and from datagram payloads.
///
/// `Send + Sync + 'static` so one codec value can live in state shared by
/// the dispatch task and the maintenance task.
pub trait Codec: Send + Sync + 'static {
    /// Encodes a message. Never fails: oversized text is truncated.
    fn encode(&self, msg: &Message) -> Bytes;

    /// Decodes one datagram.
    ///
    /// # Errors
    /// Returns a [`ProtocolError`] if the datagram is the wrong size, the
    /// kind is unknown, or a text field is not UTF-8.
    fn decode(&self, data: &[u8]) -> Result<Message, ProtocolError>;
}

/// The 177-byte fixed record codec.
#[derive(Debug, Clone, Copy, Default)]
pub struct RecordCodec;

impl Codec for RecordCodec {
    fn encode(&self, msg: &Message) -> Bytes {
        let name = truncate_utf8(&msg.sender_name, MAX_NAME_LEN);
        let body = truncate_utf8(&msg.body, MAX_BODY_LEN);

        let mut buf = BytesMut::with_capacity(RECORD_SIZE);
        // `put_u32` writes big-endian, which is the network byte order the
        // protocol mandates.
        buf.put_u32(msg.kind.into());
        buf.put_u32(msg.origin.into_inner());
        buf.put_u32(msg.dest.into_inner());
        buf.put_u32(body.len() as u32);
        put_padded(&mut buf, name.as_bytes(), NAME_WIDTH);
        put_padded(&mut buf, body.as_bytes(), BODY_WIDTH);

        debug_assert_eq!(buf.len(), RECORD_SIZE);
        buf.freeze()
    }

    fn decode(&self, data: &[u8]) -> Result<Message, ProtocolError> {
        if data.len() != RECORD_SIZE {
            return Err(ProtocolError::WrongSize {
                expected: RECORD_SIZE,
                actual: data.len(),
            });
        }

        let mut buf = data;
        let raw_kind = buf.get_u32();
        let kind = MessageKind::try_from(raw_kind)
            .map_err(|_| ProtocolError::UnknownKind(raw_kind))?;
        let origin = ClientId(buf.get_u32());
        let dest = ClientId(buf.get_u32());
        // body_len is not trusted; the padding tells us where the body ends.
        let _body_len = buf.get_u32();

        let sender_name = read_text(&buf[..NAME_WIDTH], "sender_name")?;
        let body = read_text(&buf[NAME_WIDTH..NAME_WIDTH + BODY_WIDTH], "body")?;

        Ok(Message {
            kind,
            origin,
            dest,
            sender_name,
            body,
        })
    }
}

fn put_padded(buf: &mut BytesMut, text: &[u8], width: usize) {
    buf.put_slice(text);
    buf.put_bytes(0, width - text.len());
}

/// Reads a NUL-padded text field: everything up to the first NUL, with
/// control characters removed.
fn read_text(field: &[u8], name: &'static str) -> Result<String, ProtocolError> {
    let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    let text = std::str::from_utf8(&field[..end])
        .map_err(|_| ProtocolError::InvalidText { field: name })?;
    Ok(text.chars().filter(|c| !c.is_control()).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Message {
        Message::text(ClientId(1), ClientId(2), "alice", "hello bob")
    }

    #[test]
    fn test_record_size_is_177() {
        assert_eq!(RECORD_SIZE, 177);
        assert_eq!(RecordCodec.encode(&sample()).len(), 177);
    }

    #[test]
    fn test_round_trip_preserves_in_bounds_message() {
        let msg = sample();
        let decoded = RecordCodec.decode(&RecordCodec.encode(&msg)).unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn test_round_trip_every_kind() {
        let messages = [
            Message::hello(ClientId(3), "carol"),
            Message::hello_ack(ClientId(3), "carol"),
            Message::bye(ClientId(3), "carol"),
            Message::error(ClientId(3), crate::ERR_RECIPIENT_NOT_FOUND),
            Message::list_online_request(ClientId(3), "carol"),
            Message::list_online_reply(ClientId(3), &[ClientId(1), ClientId(3)]),
        ];
        for msg in messages {
            let decoded = RecordCodec.decode(&RecordCodec.encode(&msg)).unwrap();
            assert_eq!(decoded, msg, "kind {}", msg.kind);
        }
    }

    #[test]
    fn test_header_is_big_endian() {
        let bytes = RecordCodec.encode(&Message::text(
            ClientId(0x0102_0304),
            ClientId(7),
            "n",
            "abc",
        ));
        assert_eq!(&bytes[0..4], &[0, 0, 0, 2]);
        assert_eq!(&bytes[4..8], &[1, 2, 3, 4]);
        assert_eq!(&bytes[8..12], &[0, 0, 0, 7]);
        assert_eq!(&bytes[12..16], &[0, 0, 0, 3]);
        assert_eq!(bytes[16], b'n');
        assert_eq!(bytes[17], 0);
        assert_eq!(&bytes[36..39], b"abc");
    }

    #[test]
    fn test_encode_truncates_oversized_fields() {
        let long_name = "n".repeat(30);
        let long_body = "b".repeat(200);
        let msg = Message::text(ClientId(1), ClientId(0), long_name, long_body);

        let decoded = RecordCodec.decode(&RecordCodec.encode(&msg)).unwrap();

        assert_eq!(decoded.sender_name, "n".repeat(20));
        assert_eq!(decoded.body, "b".repeat(140));
    }

    #[test]
    fn test_encode_truncates_on_char_boundary() {
        // 70 two-byte chars = 140 bytes fit exactly; one more is dropped whole.
        let body = "é".repeat(71);
        let msg = Message::text(ClientId(1), ClientId(0), "x", body);

        let bytes = RecordCodec.encode(&msg);
        let decoded = RecordCodec.decode(&bytes).unwrap();

        assert_eq!(decoded.body, "é".repeat(70));
        assert_eq!(&bytes[12..16], &140u32.to_be_bytes());
    }

    #[test]
    fn test_decode_strips_control_characters() {
        let mut bytes = RecordCodec.encode(&sample()).to_vec();
        // Overwrite part of the name with a bell and a delete character.
        bytes[16] = 0x07;
        bytes[17] = 0x7f;
        let decoded = RecordCodec.decode(&bytes).unwrap();
        assert_eq!(decoded.sender_name, "ice");
    }

    #[test]
    fn test_decode_ignores_body_len_field() {
        let mut bytes = RecordCodec.encode(&sample()).to_vec();
        bytes[12..16].copy_from_slice(&9999u32.to_be_bytes());
        let decoded = RecordCodec.decode(&bytes).unwrap();
        assert_eq!(decoded.body, "hello bob");
    }

    #[test]
    fn test_decode_wrong_size_returns_error() {
        let bytes = RecordCodec.encode(&sample());
        assert_eq!(
            RecordCodec.decode(&bytes[..100]),
            Err(ProtocolError::WrongSize {
                expected: 177,
                actual: 100
            })
        );

        let mut long = bytes.to_vec();
        long.push(0);
        assert!(matches!(
            RecordCodec.decode(&long),
            Err(ProtocolError::WrongSize { actual: 178, .. })
        ));

        assert!(RecordCodec.decode(&[]).is_err());
    }

    #[test]
    fn test_decode_unknown_kind_returns_error() {
        let mut bytes = RecordCodec.encode(&sample()).to_vec();
        bytes[0..4].copy_from_slice(&9u32.to_be_bytes());
        assert_eq!(
            RecordCodec.decode(&bytes),
            Err(ProtocolError::UnknownKind(9))
        );
    }

    #[test]
    fn test_decode_invalid_utf8_returns_error() {
        let mut bytes = RecordCodec.encode(&sample()).to_vec();
        bytes[36] = 0xff;
        assert_eq!(
            RecordCodec.decode(&bytes),
            Err(ProtocolError::InvalidText { field: "body" })
        );
    }
}
