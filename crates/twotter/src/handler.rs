//! Per-datagram dispatch: decode, then route by kind.
//!
//! Every inbound datagram passes through [`handle_datagram`] on the
//! server's receive loop. The flow is:
//!   1. Decode → drop and report if malformed
//!   2. Under the registry lock: decide, and capture target addresses
//!   3. After the lock: send replies or forwards, each best-effort
//!
//! Nothing here returns an error. A bad datagram or a failed send affects
//! only that datagram.

use std::net::SocketAddr;

use twotter_protocol::{
    ClientId, Codec, ERR_ID_ALREADY_CONNECTED, ERR_RECIPIENT_NOT_FOUND, ERR_RESERVED_ID,
    Message, MessageKind,
};
use twotter_transport::Transport;

use crate::events::{LeaveReason, ServerEvent};
use crate::server::ServerState;

/// Decodes one datagram and dispatches it.
pub(crate) async fn handle_datagram<T: Transport, C: Codec>(
    state: &ServerState<T, C>,
    data: &[u8],
    from: SocketAddr,
) {
    let msg = match state.codec.decode(data) {
        Ok(msg) => msg,
        Err(e) => {
            state.events.emit(ServerEvent::MalformedDatagram {
                addr: from,
                error: e.to_string(),
            });
            return;
        }
    };

    tracing::trace!(kind = %msg.kind, origin = %msg.origin, dest = %msg.dest, %from, "datagram");

    match msg.kind {
        MessageKind::Hello => handle_hello(state, msg, from).await,
        MessageKind::Bye => handle_bye(state, msg).await,
        MessageKind::Text => handle_text(state, msg, data, from).await,
        MessageKind::Error => handle_error_report(state, msg).await,
        MessageKind::ListOnline => handle_list_online(state, msg, from).await,
    }
}

/// Sends `msg` back to whoever sent the datagram being handled.
async fn reply<T: Transport, C: Codec>(state: &ServerState<T, C>, msg: &Message, to: SocketAddr) {
    let bytes = state.codec.encode(msg);
    state.send_best_effort(&bytes, to).await;
}

// ---------------------------------------------------------------------------
// HELLO
// ---------------------------------------------------------------------------

/// A new id is registered and acknowledged. A known id gets an ERROR and
/// its registration is refreshed, so a client re-sending HELLO keeps itself
/// alive instead of being torn down.
async fn handle_hello<T: Transport, C: Codec>(
    state: &ServerState<T, C>,
    msg: Message,
    from: SocketAddr,
) {
    let id = msg.origin;

    if id.is_broadcast() {
        state.events.emit(ServerEvent::ReservedId { addr: from });
        reply(state, &Message::error(id, ERR_RESERVED_ID), from).await;
        return;
    }

    let registered = {
        let mut registry = state.registry.lock().await;
        let registered = registry.register(id, from);
        if !registered {
            registry.touch(id);
        }
        registered
    };

    if registered {
        state.events.emit(ServerEvent::ClientJoined {
            client_id: id,
            name: msg.sender_name.clone(),
            addr: from,
        });
        reply(state, &Message::hello_ack(id, msg.sender_name), from).await;
    } else {
        state.events.emit(ServerEvent::DuplicateHello {
            client_id: id,
            addr: from,
        });
        reply(state, &Message::error(id, ERR_ID_ALREADY_CONNECTED), from).await;
    }
}

// ---------------------------------------------------------------------------
// BYE
// ---------------------------------------------------------------------------

async fn handle_bye<T: Transport, C: Codec>(state: &ServerState<T, C>, msg: Message) {
    let removed = state.registry.lock().await.unregister(msg.origin);

    if removed.is_some() {
        state.events.emit(ServerEvent::ClientLeft {
            client_id: msg.origin,
            reason: LeaveReason::Bye,
        });
    } else {
        tracing::debug!(origin = %msg.origin, "BYE from unregistered id ignored");
    }
}

// ---------------------------------------------------------------------------
// TEXT
// ---------------------------------------------------------------------------

/// Where a TEXT goes, decided under the registry lock.
enum Route {
    UnknownSender,
    Broadcast(Vec<SocketAddr>),
    Direct(SocketAddr),
    RecipientNotFound,
}

/// Forwards the datagram's original bytes: to everyone (sender included)
/// for `dest == 0`, otherwise to the one registered destination.
async fn handle_text<T: Transport, C: Codec>(
    state: &ServerState<T, C>,
    msg: Message,
    data: &[u8],
    from: SocketAddr,
) {
    let route = {
        let mut registry = state.registry.lock().await;
        if !registry.contains(msg.origin) {
            Route::UnknownSender
        } else {
            registry.touch(msg.origin);
            if msg.is_broadcast() {
                Route::Broadcast(registry.all_addresses())
            } else {
                match registry.lookup(msg.dest) {
                    Some(addr) => Route::Direct(addr),
                    None => Route::RecipientNotFound,
                }
            }
        }
    };

    match route {
        Route::UnknownSender => {
            state.events.emit(ServerEvent::UnknownSender {
                origin: msg.origin,
                addr: from,
            });
        }
        Route::Broadcast(targets) => {
            for addr in &targets {
                state.send_best_effort(data, *addr).await;
            }
            state.events.emit(ServerEvent::MessageRouted {
                origin: msg.origin,
                dest: msg.dest,
                recipients: targets.len(),
            });
        }
        Route::Direct(addr) => {
            state.send_best_effort(data, addr).await;
            state.events.emit(ServerEvent::MessageRouted {
                origin: msg.origin,
                dest: msg.dest,
                recipients: 1,
            });
        }
        Route::RecipientNotFound => {
            state.events.emit(ServerEvent::RecipientNotFound {
                origin: msg.origin,
                dest: msg.dest,
            });
            reply(state, &Message::error(msg.origin, ERR_RECIPIENT_NOT_FOUND), from).await;
        }
    }
}

// ---------------------------------------------------------------------------
// ERROR
// ---------------------------------------------------------------------------

/// Recorded, never forwarded.
async fn handle_error_report<T: Transport, C: Codec>(state: &ServerState<T, C>, msg: Message) {
    state.registry.lock().await.touch(msg.origin);
    state.events.emit(ServerEvent::ErrorReported {
        origin: msg.origin,
        body: msg.body,
    });
}

// ---------------------------------------------------------------------------
// LIST_ONLINE
// ---------------------------------------------------------------------------

async fn handle_list_online<T: Transport, C: Codec>(
    state: &ServerState<T, C>,
    msg: Message,
    from: SocketAddr,
) {
    let online: Vec<ClientId> = {
        let mut registry = state.registry.lock().await;
        registry.touch(msg.origin);
        registry.online_ids()
    };

    reply(state, &Message::list_online_reply(msg.origin, &online), from).await;
}
