//! `ChatServer` builder and server loop.
//!
//! This is the entry point for running a Twotter server. It ties the
//! layers together: transport → protocol → registry, with the tick
//! scheduler driving periodic maintenance.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use twotter_protocol::{Codec, RecordCodec};
use twotter_registry::{ClientRegistry, RegistryConfig};
use twotter_tick::{TickConfig, TickScheduler};
use twotter_transport::{Transport, UdpTransport};

use crate::events::{EventSink, TracingSink};
use crate::handler::handle_datagram;
use crate::maintenance::maintenance_loop;
use crate::TwotterError;

/// Port the server listens on unless told otherwise.
pub const DEFAULT_PORT: u16 = 12345;

/// Shared server state, reached from the dispatch loop and the maintenance
/// task.
///
/// The registry is the only mutable part and sits behind one mutex, so a
/// HELLO check-then-register and a sweep can never interleave.
pub(crate) struct ServerState<T: Transport, C: Codec> {
    pub(crate) transport: T,
    pub(crate) codec: C,
    pub(crate) registry: Mutex<ClientRegistry>,
    pub(crate) registry_config: RegistryConfig,
    pub(crate) events: Box<dyn EventSink>,
    pub(crate) started: Instant,
}

impl<T: Transport, C: Codec> ServerState<T, C> {
    /// Sends one datagram, logging instead of failing. Every server send is
    /// best-effort and independent of the others.
    pub(crate) async fn send_best_effort(&self, data: &[u8], addr: SocketAddr) {
        if let Err(e) = self.transport.send_to(data, addr).await {
            tracing::warn!(%addr, error = %e, "send failed");
        }
    }
}

/// Builder for configuring and starting a chat server.
///
/// # Example
///
/// ```rust,ignore
/// use twotter::prelude::*;
///
/// let server = ChatServer::builder()
///     .bind("0.0.0.0:12345")
///     .build()
///     .await?;
/// server.run().await
/// ```
pub struct ChatServerBuilder {
    bind_addr: String,
    registry_config: RegistryConfig,
    tick_config: Option<TickConfig>,
    events: Box<dyn EventSink>,
}

impl ChatServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            bind_addr: format!("127.0.0.1:{DEFAULT_PORT}"),
            registry_config: RegistryConfig::default(),
            tick_config: None,
            events: Box::new(TracingSink),
        }
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    /// Sets the registration TTL and the default maintenance interval.
    pub fn registry_config(mut self, config: RegistryConfig) -> Self {
        self.registry_config = config;
        self
    }

    /// Overrides how maintenance ticks are scheduled. Without this, the
    /// server ticks every `registry_config.sweep_interval`.
    /// `TickConfig::default()` disables maintenance.
    pub fn tick_config(mut self, config: TickConfig) -> Self {
        self.tick_config = Some(config);
        self
    }

    /// Sets where server events go. Default: [`TracingSink`].
    pub fn event_sink(mut self, sink: impl EventSink) -> Self {
        self.events = Box::new(sink);
        self
    }

    /// Binds a UDP socket and builds the server.
    pub async fn build(self) -> Result<ChatServer<UdpTransport, RecordCodec>, TwotterError> {
        let transport = UdpTransport::bind(self.bind_addr.as_str()).await?;
        Ok(self.build_with(transport, RecordCodec))
    }

    /// Builds the server over an already bound transport.
    pub fn build_with<T: Transport, C: Codec>(self, transport: T, codec: C) -> ChatServer<T, C> {
        let tick_config = self
            .tick_config
            .unwrap_or_else(|| TickConfig::every(self.registry_config.sweep_interval));

        let state = Arc::new(ServerState {
            transport,
            codec,
            registry: Mutex::new(ClientRegistry::new()),
            registry_config: self.registry_config,
            events: self.events,
            started: Instant::now(),
        });

        ChatServer { state, tick_config }
    }
}

impl Default for ChatServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Aborts the maintenance task when the server loop exits, including when
/// the `run` future itself is dropped.
struct MaintenanceGuard(JoinHandle<()>);

impl Drop for MaintenanceGuard {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// A bound chat server.
///
/// Call [`run()`](Self::run) to start serving.
pub struct ChatServer<T: Transport = UdpTransport, C: Codec = RecordCodec> {
    state: Arc<ServerState<T, C>>,
    tick_config: TickConfig,
}

impl ChatServer {
    /// Creates a new builder.
    pub fn builder() -> ChatServerBuilder {
        ChatServerBuilder::new()
    }
}

impl<T: Transport, C: Codec> ChatServer<T, C> {
    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, TwotterError> {
        Ok(self.state.transport.local_addr()?)
    }

    /// Serves until the process is terminated.
    pub async fn run(self) -> Result<(), TwotterError> {
        self.run_until(std::future::pending()).await
    }

    /// Serves until `shutdown` completes.
    ///
    /// One loop receives and dispatches datagrams in arrival order; a
    /// separately spawned task runs maintenance. Receive errors are logged
    /// and the loop continues.
    pub async fn run_until(self, shutdown: impl Future<Output = ()>) -> Result<(), TwotterError> {
        let local = self.local_addr()?;
        tracing::info!(%local, "Twotter server running");

        let _maintenance = MaintenanceGuard(tokio::spawn(maintenance_loop(
            Arc::clone(&self.state),
            TickScheduler::new(self.tick_config),
        )));

        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                result = self.state.transport.recv_from() => match result {
                    Ok((data, from)) => handle_datagram(&self.state, &data, from).await,
                    Err(e) => tracing::warn!(error = %e, "receive failed"),
                },
            }
        }

        tracing::info!(%local, "Twotter server stopped");
        Ok(())
    }
}
