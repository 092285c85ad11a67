//! The client side of a chat connection.
//!
//! A [`ChatSession`] walks one state machine:
//!
//! ```text
//! Connecting ──HELLO reply──→ Connected ──close()──→ Closed
//!     │
//!     └──ERROR / timeout / anything else──→ (connect fails, no session)
//! ```
//!
//! While connected, two background tasks run next to the caller:
//! - the **receive loop** classifies inbound datagrams into the received
//!   queue, the error-notice queue, and the cached online list;
//! - the optional **keepalive** sends LIST_ONLINE on a fixed interval.
//!
//! Both watch the session state and exit once it becomes `Closed`. Sends
//! from the caller need no lock: the transport is shared by reference and
//! every datagram is independent.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};
use twotter_protocol::{
    ClientId, Codec, ERR_RESERVED_ID, Message, MessageKind, RecordCodec, parse_id_list,
};
use twotter_tick::{TickScheduler, deadline_after};
use twotter_transport::{Transport, UdpTransport};

use crate::{ClientError, SessionConfig};

/// Where a session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// HELLO sent, waiting for the server's answer.
    Connecting,
    /// Handshake accepted; sends are allowed.
    Connected,
    /// Terminal. A new handshake needs a new session.
    Closed,
}

/// State shared between the session handle and its background tasks.
struct Shared<T> {
    transport: T,
    codec: RecordCodec,
    server_addr: SocketAddr,
    client_id: ClientId,
    name: String,
    state: watch::Sender<SessionState>,
}

impl<T: Transport> Shared<T> {
    async fn send(&self, msg: &Message) -> Result<(), ClientError> {
        let bytes = self.codec.encode(msg);
        self.transport.send_to(&bytes, self.server_addr).await?;
        Ok(())
    }
}

/// A connected chat client.
///
/// Created by [`connect`](ChatSession::connect). Dropping the session stops
/// its background tasks but sends nothing; call [`close`](Self::close) to
/// tell the server you are leaving.
pub struct ChatSession<T: Transport = UdpTransport> {
    shared: Arc<Shared<T>>,
    received: mpsc::UnboundedReceiver<Message>,
    errors: mpsc::UnboundedReceiver<Message>,
    online: watch::Receiver<Vec<ClientId>>,
    tasks: Vec<JoinHandle<()>>,
}

impl ChatSession<UdpTransport> {
    /// Binds an ephemeral UDP socket and performs the handshake.
    pub async fn connect(config: SessionConfig) -> Result<Self, ClientError> {
        let bind_addr: SocketAddr = if config.server_addr.is_ipv4() {
            (Ipv4Addr::UNSPECIFIED, 0).into()
        } else {
            (Ipv6Addr::UNSPECIFIED, 0).into()
        };
        let transport = UdpTransport::bind(bind_addr).await?;
        Self::connect_with(transport, config).await
    }
}

impl<T: Transport> ChatSession<T> {
    /// Performs the handshake over an already bound transport.
    ///
    /// On failure the transport is dropped with the half-built session.
    /// Id `0` is refused before anything is sent.
    pub async fn connect_with(transport: T, config: SessionConfig) -> Result<Self, ClientError> {
        if config.client_id == ClientId::BROADCAST {
            return Err(ClientError::ReservedIdentifier);
        }
        let (state, _) = watch::channel(SessionState::Connecting);
        let shared = Arc::new(Shared {
            transport,
            codec: RecordCodec,
            server_addr: config.server_addr,
            client_id: config.client_id,
            name: config.name,
            state,
        });

        tracing::debug!(
            client_id = %shared.client_id,
            server = %shared.server_addr,
            "connecting"
        );

        if let Err(e) = handshake(&shared, config.handshake_timeout).await {
            shared.state.send_replace(SessionState::Closed);
            tracing::warn!(client_id = %shared.client_id, error = %e, "handshake failed");
            return Err(e);
        }
        shared.state.send_replace(SessionState::Connected);
        tracing::info!(
            client_id = %shared.client_id,
            name = %shared.name,
            "connected"
        );

        let (received_tx, received) = mpsc::unbounded_channel();
        let (errors_tx, errors) = mpsc::unbounded_channel();
        let (online_tx, online) = watch::channel(Vec::new());

        let mut tasks = vec![tokio::spawn(receive_loop(
            Arc::clone(&shared),
            received_tx,
            errors_tx,
            online_tx,
        ))];
        if let Some(interval) = config.keepalive_interval {
            tasks.push(tokio::spawn(keepalive_loop(Arc::clone(&shared), interval)));
        }

        Ok(Self {
            shared,
            received,
            errors,
            online,
            tasks,
        })
    }

    // -----------------------------------------------------------------
    // Sending
    // -----------------------------------------------------------------

    /// Sends a TEXT to `dest` (`ClientId::BROADCAST` for everyone).
    ///
    /// Fire-and-forget: nothing confirms delivery. An unknown `dest`
    /// comes back later as an ERROR notice.
    pub async fn send_text(&self, body: impl Into<String>, dest: ClientId) -> Result<(), ClientError> {
        self.ensure_connected()?;
        let msg = Message::text(self.shared.client_id, dest, self.shared.name.as_str(), body);
        self.shared.send(&msg).await
    }

    /// Like [`send_text`](Self::send_text), but a direct message to
    /// someone else is also sent to ourselves so it shows up in our own
    /// received queue.
    pub async fn send_direct(&self, body: impl Into<String>, dest: ClientId) -> Result<(), ClientError> {
        let body = body.into();
        self.send_text(body.clone(), dest).await?;
        if !dest.is_broadcast() && dest != self.shared.client_id {
            self.send_text(body, self.shared.client_id).await?;
        }
        Ok(())
    }

    /// Tells the server we are leaving without closing the session.
    pub async fn send_bye(&self) -> Result<(), ClientError> {
        self.ensure_connected()?;
        self.shared
            .send(&Message::bye(self.shared.client_id, self.shared.name.as_str()))
            .await
    }

    /// Asks the server for the online list. The answer replaces
    /// [`online_ids`](Self::online_ids) when it arrives.
    pub async fn request_online_list(&self) -> Result<(), ClientError> {
        self.ensure_connected()?;
        self.shared
            .send(&Message::list_online_request(
                self.shared.client_id,
                self.shared.name.as_str(),
            ))
            .await
    }

    /// Sends BYE and stops the background tasks.
    ///
    /// Idempotent: only the call that moves the state to `Closed` sends
    /// the BYE, however many callers race here. The BYE is best-effort; a
    /// send failure is logged.
    pub async fn close(&self) {
        let closed_now = self.shared.state.send_if_modified(|state| {
            if *state == SessionState::Closed {
                false
            } else {
                *state = SessionState::Closed;
                true
            }
        });
        if !closed_now {
            return;
        }

        let bye = Message::bye(self.shared.client_id, self.shared.name.as_str());
        if let Err(e) = self.shared.send(&bye).await {
            tracing::warn!(client_id = %self.shared.client_id, error = %e, "failed to send BYE");
        }
        tracing::info!(client_id = %self.shared.client_id, "session closed");
    }

    fn ensure_connected(&self) -> Result<(), ClientError> {
        match *self.shared.state.borrow() {
            SessionState::Connected => Ok(()),
            _ => Err(ClientError::Closed),
        }
    }

    // -----------------------------------------------------------------
    // Receiving
    // -----------------------------------------------------------------

    /// Waits for the next received TEXT.
    ///
    /// Returns `None` once the session is closed and every queued message
    /// has been taken.
    pub async fn next_message(&mut self) -> Option<Message> {
        self.received.recv().await
    }

    /// Takes every TEXT received so far without waiting.
    pub fn drain_received(&mut self) -> Vec<Message> {
        drain(&mut self.received)
    }

    /// Takes every ERROR notice received while connected.
    pub fn drain_errors(&mut self) -> Vec<Message> {
        drain(&mut self.errors)
    }

    /// The most recent online list from the server, ascending. Empty
    /// until the first LIST_ONLINE reply.
    pub fn online_ids(&self) -> Vec<ClientId> {
        self.online.borrow().clone()
    }

    // -----------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------

    pub fn state(&self) -> SessionState {
        *self.shared.state.borrow()
    }

    pub fn client_id(&self) -> ClientId {
        self.shared.client_id
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }

    pub fn server_addr(&self) -> SocketAddr {
        self.shared.server_addr
    }

    pub fn local_addr(&self) -> Result<SocketAddr, ClientError> {
        Ok(self.shared.transport.local_addr()?)
    }
}

impl<T: Transport> Drop for ChatSession<T> {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

fn drain(rx: &mut mpsc::UnboundedReceiver<Message>) -> Vec<Message> {
    let mut out = Vec::new();
    while let Ok(msg) = rx.try_recv() {
        out.push(msg);
    }
    out
}

// ---------------------------------------------------------------------------
// Handshake
// ---------------------------------------------------------------------------

/// Sends HELLO and waits for the server's verdict.
///
/// Receive errors, datagrams from other peers, and undecodable datagrams
/// do not resolve the handshake; they are logged and the wait continues
/// until the deadline.
async fn handshake<T: Transport>(shared: &Shared<T>, timeout: Duration) -> Result<(), ClientError> {
    shared
        .send(&Message::hello(shared.client_id, shared.name.as_str()))
        .await?;
    let deadline = deadline_after(Instant::now(), timeout);

    loop {
        let (data, from) = match time::timeout_at(deadline, shared.transport.recv_from()).await {
            Err(_) => return Err(ClientError::HandshakeTimeout(timeout)),
            Ok(Err(e)) => {
                tracing::debug!(error = %e, "receive failed during handshake");
                continue;
            }
            Ok(Ok(datagram)) => datagram,
        };

        if !is_server_addr(shared.server_addr, from) {
            tracing::debug!(%from, "ignoring datagram from unknown peer");
            continue;
        }

        let msg = match shared.codec.decode(&data) {
            Ok(msg) => msg,
            Err(e) => {
                tracing::debug!(error = %e, "malformed datagram during handshake");
                continue;
            }
        };

        return match msg.kind {
            MessageKind::Hello if msg.dest == shared.client_id => Ok(()),
            MessageKind::Error if msg.body == ERR_RESERVED_ID => {
                Err(ClientError::ReservedIdentifier)
            }
            MessageKind::Error => Err(ClientError::DuplicateIdentifier(shared.client_id)),
            kind => Err(ClientError::UnexpectedMessage(kind)),
        };
    }
}

/// Whether a datagram from `from` can be the server dialled at `dialled`.
///
/// Replies carry the server socket's own address, which need not be the
/// literal one we sent to. The port must match. The host matches when it is
/// the same after unmapping IPv4-in-IPv6, when we dialled an unspecified
/// address (which reaches this host), or when both sides are loopback.
fn is_server_addr(dialled: SocketAddr, from: SocketAddr) -> bool {
    if dialled.port() != from.port() {
        return false;
    }
    let dialled: IpAddr = dialled.ip().to_canonical();
    let from: IpAddr = from.ip().to_canonical();
    dialled == from || dialled.is_unspecified() || (dialled.is_loopback() && from.is_loopback())
}

// ---------------------------------------------------------------------------
// Background tasks
// ---------------------------------------------------------------------------

async fn receive_loop<T: Transport>(
    shared: Arc<Shared<T>>,
    received: mpsc::UnboundedSender<Message>,
    errors: mpsc::UnboundedSender<Message>,
    online: watch::Sender<Vec<ClientId>>,
) {
    let client_id = shared.client_id;
    let mut state = shared.state.subscribe();

    loop {
        if *state.borrow_and_update() == SessionState::Closed {
            break;
        }

        let result = tokio::select! {
            _ = state.changed() => continue,
            result = shared.transport.recv_from() => result,
        };

        let (data, from) = match result {
            Ok(datagram) => datagram,
            Err(e) => {
                tracing::warn!(%client_id, error = %e, "receive failed");
                continue;
            }
        };
        if !is_server_addr(shared.server_addr, from) {
            tracing::debug!(%client_id, %from, "ignoring datagram from unknown peer");
            continue;
        }
        let msg = match shared.codec.decode(&data) {
            Ok(msg) => msg,
            Err(e) => {
                tracing::debug!(%client_id, error = %e, "dropping malformed datagram");
                continue;
            }
        };

        match msg.kind {
            MessageKind::Text => {
                tracing::trace!(%client_id, origin = %msg.origin, "text received");
                let _ = received.send(msg);
            }
            MessageKind::ListOnline => {
                online.send_replace(parse_id_list(&msg.body));
            }
            MessageKind::Hello => {
                tracing::debug!(%client_id, "server re-announced, echoing HELLO");
                let hello = Message::hello(client_id, shared.name.as_str());
                if let Err(e) = shared.send(&hello).await {
                    tracing::warn!(%client_id, error = %e, "failed to echo HELLO");
                }
            }
            MessageKind::Error => {
                tracing::warn!(%client_id, body = %msg.body, "server reported an error");
                let _ = errors.send(msg);
            }
            MessageKind::Bye => {
                tracing::debug!(%client_id, origin = %msg.origin, "ignoring BYE from server");
            }
        }
    }

    tracing::debug!(%client_id, "receive loop stopped");
}

async fn keepalive_loop<T: Transport>(shared: Arc<Shared<T>>, interval: Duration) {
    let mut ticker = TickScheduler::every(interval);
    let mut state = shared.state.subscribe();

    loop {
        if *state.borrow_and_update() == SessionState::Closed {
            break;
        }

        tokio::select! {
            _ = state.changed() => {}
            _ = ticker.wait_for_tick() => {
                let request = Message::list_online_request(shared.client_id, shared.name.as_str());
                if let Err(e) = shared.send(&request).await {
                    tracing::warn!(client_id = %shared.client_id, error = %e, "keepalive send failed");
                }
                ticker.record_tick_end();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(s: &str) -> SocketAddr {
        s.parse().unwrap()
    }

    #[test]
    fn test_server_addr_exact_match() {
        assert!(is_server_addr(addr("10.0.0.5:12345"), addr("10.0.0.5:12345")));
    }

    #[test]
    fn test_server_addr_port_must_match() {
        assert!(!is_server_addr(addr("127.0.0.1:12345"), addr("127.0.0.1:12346")));
        assert!(!is_server_addr(addr("0.0.0.0:12345"), addr("127.0.0.1:9")));
    }

    #[test]
    fn test_server_addr_unspecified_dial_accepts_local_reply() {
        assert!(is_server_addr(addr("0.0.0.0:12345"), addr("127.0.0.1:12345")));
        assert!(is_server_addr(addr("[::]:12345"), addr("[::1]:12345")));
    }

    #[test]
    fn test_server_addr_loopback_and_mapped_forms() {
        assert!(is_server_addr(addr("127.0.0.2:12345"), addr("127.0.0.1:12345")));
        assert!(is_server_addr(addr("[::ffff:10.0.0.5]:12345"), addr("10.0.0.5:12345")));
    }

    #[test]
    fn test_server_addr_other_host_rejected() {
        assert!(!is_server_addr(addr("10.0.0.5:12345"), addr("10.0.0.6:12345")));
        assert!(!is_server_addr(addr("127.0.0.1:12345"), addr("10.0.0.6:12345")));
    }
}
