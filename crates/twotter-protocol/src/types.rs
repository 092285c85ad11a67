//! Core protocol types for Twotter's wire format.
//!
//! There is exactly one entity on the wire, [`Message`]. Its meaning is
//! selected by [`MessageKind`]; the same five fields are present on every
//! datagram regardless of kind.

use std::fmt;

use num_enum::{IntoPrimitive, TryFromPrimitive};

// ---------------------------------------------------------------------------
// Field limits
// ---------------------------------------------------------------------------

/// Maximum length of `sender_name`, in bytes.
pub const MAX_NAME_LEN: usize = 20;

/// Maximum length of `body`, in bytes. The body field on the wire is one
/// byte wider, so an encoded body is always NUL-terminated.
pub const MAX_BODY_LEN: usize = 140;

/// Display name used on messages the server originates.
pub const SERVER_NAME: &str = "server";

/// ERROR body sent when a HELLO arrives for an id that is already online.
pub const ERR_ID_ALREADY_CONNECTED: &str = "id already connected";

/// ERROR body sent when a TEXT names a `dest_id` that is not online.
pub const ERR_RECIPIENT_NOT_FOUND: &str = "recipient not found";

/// ERROR body sent when a HELLO claims the reserved id `0`.
pub const ERR_RESERVED_ID: &str = "id 0 is reserved";

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// A client identifier as carried in `origin_id` / `dest_id`.
///
/// Identity on the network is this number alone; the display name is
/// cosmetic. The value `0` is reserved: as a destination it means
/// "everyone", as an origin it marks a server-generated message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ClientId(pub u32);

impl ClientId {
    /// Destination meaning "every registered client".
    pub const BROADCAST: ClientId = ClientId(0);

    /// Origin used by messages the server itself produces.
    pub const SERVER: ClientId = ClientId(0);

    /// Returns the underlying `u32` value.
    pub fn into_inner(self) -> u32 {
        self.0
    }

    /// `true` for the reserved id `0`.
    pub fn is_broadcast(self) -> bool {
        self.0 == 0
    }
}

impl From<u32> for ClientId {
    fn from(raw: u32) -> Self {
        Self(raw)
    }
}

/// Plain decimal, because the same rendering is used inside LIST_ONLINE
/// bodies that clients parse back.
impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// MessageKind
// ---------------------------------------------------------------------------

/// What a datagram means. The discriminants are the wire values.
///
/// `TryFromPrimitive` gives us `MessageKind::try_from(u32)` for decoding and
/// `IntoPrimitive` gives us `u32::from(kind)` for encoding.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive,
)]
#[repr(u32)]
pub enum MessageKind {
    /// Client → server: join with this id. Server → client: accepted.
    Hello = 0,
    /// Client → server: leaving.
    Bye = 1,
    /// Chat text, either broadcast (`dest_id == 0`) or direct.
    Text = 2,
    /// Something went wrong; `body` holds a human-readable description.
    Error = 3,
    /// Client → server: who is online? Server → client: comma-joined ids.
    ListOnline = 4,
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MessageKind::Hello => "HELLO",
            MessageKind::Bye => "BYE",
            MessageKind::Text => "TEXT",
            MessageKind::Error => "ERROR",
            MessageKind::ListOnline => "LIST_ONLINE",
        };
        f.write_str(name)
    }
}

// ---------------------------------------------------------------------------
// Message
// ---------------------------------------------------------------------------

/// One wire record.
///
/// Text fields may hold more than their wire limit in memory; the codec
/// truncates on encode. Construct through the helpers below where possible
/// so `origin`/`dest` follow the protocol conventions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub kind: MessageKind,
    pub origin: ClientId,
    pub dest: ClientId,
    pub sender_name: String,
    pub body: String,
}

impl Message {
    pub fn new(
        kind: MessageKind,
        origin: ClientId,
        dest: ClientId,
        sender_name: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            origin,
            dest,
            sender_name: sender_name.into(),
            body: body.into(),
        }
    }

    /// Client → server join request.
    pub fn hello(origin: ClientId, name: impl Into<String>) -> Self {
        Self::new(MessageKind::Hello, origin, ClientId::BROADCAST, name, "")
    }

    /// Server → client acceptance: a HELLO addressed back to the joiner,
    /// echoing the name it registered with.
    pub fn hello_ack(client: ClientId, name: impl Into<String>) -> Self {
        Self::new(MessageKind::Hello, ClientId::SERVER, client, name, "")
    }

    pub fn bye(origin: ClientId, name: impl Into<String>) -> Self {
        Self::new(MessageKind::Bye, origin, ClientId::BROADCAST, name, "")
    }

    pub fn text(
        origin: ClientId,
        dest: ClientId,
        name: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self::new(MessageKind::Text, origin, dest, name, body)
    }

    /// Server → client error notice.
    pub fn error(dest: ClientId, body: impl Into<String>) -> Self {
        Self::new(MessageKind::Error, ClientId::SERVER, dest, SERVER_NAME, body)
    }

    pub fn list_online_request(origin: ClientId, name: impl Into<String>) -> Self {
        Self::new(MessageKind::ListOnline, origin, ClientId::BROADCAST, name, "")
    }

    pub fn list_online_reply(dest: ClientId, ids: &[ClientId]) -> Self {
        Self::new(
            MessageKind::ListOnline,
            ClientId::SERVER,
            dest,
            SERVER_NAME,
            format_id_list(ids),
        )
    }

    /// `true` if this message is addressed to everyone.
    pub fn is_broadcast(&self) -> bool {
        self.dest.is_broadcast()
    }
}

// ---------------------------------------------------------------------------
// Text helpers
// ---------------------------------------------------------------------------

/// Cuts `s` to at most `max` bytes without splitting a UTF-8 sequence.
pub fn truncate_utf8(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// Joins ids with commas, stopping before the body limit would be exceeded.
///
/// An id that does not fit is left out entirely instead of being cut in
/// half, which would make the client parse a different id.
pub fn format_id_list(ids: &[ClientId]) -> String {
    let mut out = String::new();
    for id in ids {
        let item = id.to_string();
        let extra = if out.is_empty() { item.len() } else { item.len() + 1 };
        if out.len() + extra > MAX_BODY_LEN {
            break;
        }
        if !out.is_empty() {
            out.push(',');
        }
        out.push_str(&item);
    }
    out
}

/// Parses a comma-joined id list. Entries that are not numbers are skipped.
pub fn parse_id_list(body: &str) -> Vec<ClientId> {
    body.split(',')
        .filter_map(|part| part.trim().parse::<u32>().ok())
        .map(ClientId)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_wire_values() {
        assert_eq!(u32::from(MessageKind::Hello), 0);
        assert_eq!(u32::from(MessageKind::Bye), 1);
        assert_eq!(u32::from(MessageKind::Text), 2);
        assert_eq!(u32::from(MessageKind::Error), 3);
        assert_eq!(u32::from(MessageKind::ListOnline), 4);
    }

    #[test]
    fn test_kind_try_from_rejects_unknown() {
        assert_eq!(MessageKind::try_from(4u32).ok(), Some(MessageKind::ListOnline));
        assert!(MessageKind::try_from(5u32).is_err());
    }

    #[test]
    fn test_client_id_display_is_plain_decimal() {
        assert_eq!(ClientId(42).to_string(), "42");
    }

    #[test]
    fn test_hello_ack_is_addressed_to_joiner() {
        let ack = Message::hello_ack(ClientId(7), "alice");
        assert_eq!(ack.kind, MessageKind::Hello);
        assert_eq!(ack.dest, ClientId(7));
        assert_eq!(ack.origin, ClientId::SERVER);
        assert_eq!(ack.sender_name, "alice");
    }

    #[test]
    fn test_truncate_utf8_respects_char_boundary() {
        // "é" is two bytes; cutting at 3 would land inside the second one.
        assert_eq!(truncate_utf8("aéé", 4), "aé");
        assert_eq!(truncate_utf8("aéé", 3), "aé");
        assert_eq!(truncate_utf8("abc", 10), "abc");
    }

    #[test]
    fn test_format_id_list_joins_with_commas() {
        let ids = [ClientId(1), ClientId(20), ClientId(300)];
        assert_eq!(format_id_list(&ids), "1,20,300");
        assert_eq!(format_id_list(&[]), "");
    }

    #[test]
    fn test_format_id_list_drops_ids_that_do_not_fit() {
        // 10-digit ids take 11 bytes with the comma; only 12 fit in 140.
        let ids: Vec<ClientId> = (0..20).map(|i| ClientId(4_000_000_000 + i)).collect();
        let body = format_id_list(&ids);
        assert!(body.len() <= MAX_BODY_LEN);
        let parsed = parse_id_list(&body);
        assert_eq!(parsed.len(), 12);
        assert_eq!(parsed[..], ids[..12]);
    }

    #[test]
    fn test_parse_id_list_skips_garbage() {
        assert_eq!(
            parse_id_list("1, 2,x,,3"),
            vec![ClientId(1), ClientId(2), ClientId(3)]
        );
        assert!(parse_id_list("").is_empty());
    }
}
