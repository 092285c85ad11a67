//! Operator-facing server events.
//!
//! The server reports everything an operator might want to see (joins,
//! leaves, routing decisions, dropped datagrams) as [`ServerEvent`]s pushed
//! into an [`EventSink`]. Sinks are write-only and must not block: they are
//! called from the dispatch loop.

use std::net::SocketAddr;

use serde::{Serialize, Serializer};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use twotter_protocol::ClientId;

/// Why a client left the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LeaveReason {
    /// The client sent BYE.
    Bye,
    /// The maintenance sweep found it idle for longer than the TTL.
    Expired,
}

/// Something the server did or observed.
///
/// Serializes as an internally tagged JSON object, e.g.
/// `{"event":"client_joined","client_id":1,"name":"alice","addr":"127.0.0.1:5000"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ServerEvent {
    ClientJoined {
        #[serde(serialize_with = "serialize_client_id")]
        client_id: ClientId,
        name: String,
        addr: SocketAddr,
    },
    /// A HELLO for an id that is already online. Answered with ERROR; the
    /// existing registration is refreshed.
    DuplicateHello {
        #[serde(serialize_with = "serialize_client_id")]
        client_id: ClientId,
        addr: SocketAddr,
    },
    /// A HELLO claiming id `0`.
    ReservedId { addr: SocketAddr },
    ClientLeft {
        #[serde(serialize_with = "serialize_client_id")]
        client_id: ClientId,
        reason: LeaveReason,
    },
    MessageRouted {
        #[serde(serialize_with = "serialize_client_id")]
        origin: ClientId,
        #[serde(serialize_with = "serialize_client_id")]
        dest: ClientId,
        recipients: usize,
    },
    RecipientNotFound {
        #[serde(serialize_with = "serialize_client_id")]
        origin: ClientId,
        #[serde(serialize_with = "serialize_client_id")]
        dest: ClientId,
    },
    /// A TEXT from an id that is not registered. Dropped.
    UnknownSender {
        #[serde(serialize_with = "serialize_client_id")]
        origin: ClientId,
        addr: SocketAddr,
    },
    MalformedDatagram { addr: SocketAddr, error: String },
    /// A client sent an ERROR. Kept for diagnostics only.
    ErrorReported {
        #[serde(serialize_with = "serialize_client_id")]
        origin: ClientId,
        body: String,
    },
    /// Periodic status broadcast, with the maintenance scheduler's
    /// counters. `slowest_pass_ms` covers passes completed before this one.
    Status {
        online: usize,
        uptime_secs: u64,
        passes: u64,
        late_passes: u64,
        skipped_passes: u64,
        slowest_pass_ms: u64,
    },
}

fn serialize_client_id<S: Serializer>(id: &ClientId, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u32(id.into_inner())
}

/// Receives server events.
pub trait EventSink: Send + Sync + 'static {
    fn emit(&self, event: ServerEvent);
}

// ---------------------------------------------------------------------------
// TracingSink
// ---------------------------------------------------------------------------

/// Logs every event through `tracing`. The server's default sink.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: ServerEvent) {
        match event {
            ServerEvent::ClientJoined {
                client_id,
                name,
                addr,
            } => tracing::info!(%client_id, %name, %addr, "client joined"),
            ServerEvent::DuplicateHello { client_id, addr } => {
                tracing::info!(%client_id, %addr, "duplicate HELLO rejected")
            }
            ServerEvent::ReservedId { addr } => {
                tracing::warn!(%addr, "HELLO with reserved id 0 rejected")
            }
            ServerEvent::ClientLeft { client_id, reason } => {
                tracing::info!(%client_id, ?reason, "client left")
            }
            ServerEvent::MessageRouted {
                origin,
                dest,
                recipients,
            } => tracing::debug!(%origin, %dest, recipients, "message routed"),
            ServerEvent::RecipientNotFound { origin, dest } => {
                tracing::info!(%origin, %dest, "recipient not found")
            }
            ServerEvent::UnknownSender { origin, addr } => {
                tracing::warn!(%origin, %addr, "TEXT from unregistered id dropped")
            }
            ServerEvent::MalformedDatagram { addr, error } => {
                tracing::warn!(%addr, %error, "malformed datagram dropped")
            }
            ServerEvent::ErrorReported { origin, body } => {
                tracing::warn!(%origin, %body, "client reported an error")
            }
            ServerEvent::Status {
                online,
                uptime_secs,
                passes,
                late_passes,
                skipped_passes,
                slowest_pass_ms,
            } => tracing::info!(
                online,
                uptime_secs,
                passes,
                late_passes,
                skipped_passes,
                slowest_pass_ms,
                "status"
            ),
        }
    }
}

// ---------------------------------------------------------------------------
// ChannelSink
// ---------------------------------------------------------------------------

/// Forwards events into an unbounded channel, for tests and embedding.
///
/// Events emitted after the receiver is dropped are discarded.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<ServerEvent>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ServerEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl EventSink for ChannelSink {
    fn emit(&self, event: ServerEvent) {
        let _ = self.tx.send(event);
    }
}

// ---------------------------------------------------------------------------
// JsonLinesSink
// ---------------------------------------------------------------------------

/// Writes each event as one line of JSON.
///
/// `emit` only serializes and queues the line; a background task does the
/// writing. If the output goes away (a closed pipe, a full disk) the task
/// logs once and stops, and later events are discarded.
#[derive(Debug, Clone)]
pub struct JsonLinesSink {
    tx: mpsc::UnboundedSender<String>,
}

impl JsonLinesSink {
    /// Writes to stdout. Must be called inside a Tokio runtime.
    pub fn stdout() -> Self {
        Self::with_writer(tokio::io::stdout())
    }

    /// Writes to any async writer. Must be called inside a Tokio runtime.
    pub fn with_writer<W>(writer: W) -> Self
    where
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(write_lines(writer, rx));
        Self { tx }
    }
}

impl EventSink for JsonLinesSink {
    fn emit(&self, event: ServerEvent) {
        match serde_json::to_string(&event) {
            Ok(line) => {
                let _ = self.tx.send(line);
            }
            Err(e) => tracing::warn!(error = %e, "failed to serialize event"),
        }
    }
}

async fn write_lines<W>(mut writer: W, mut lines: mpsc::UnboundedReceiver<String>)
where
    W: AsyncWrite + Unpin,
{
    while let Some(mut line) = lines.recv().await {
        line.push('\n');
        let written = match writer.write_all(line.as_bytes()).await {
            Ok(()) => writer.flush().await,
            Err(e) => Err(e),
        };
        if let Err(e) = written {
            tracing::error!(error = %e, "event output failed, discarding further events");
            return;
        }
    }
}
