//! # Twotter
//!
//! A small chat fabric over UDP: one server relays fixed-size text records
//! between clients identified by numeric ids.
//!
//! The server tracks who is online in a registry, forwards broadcast and
//! direct messages, answers online-list queries, and periodically
//! broadcasts a status line and expires idle clients. Clients join with a
//! HELLO handshake through [`ChatSession`](twotter_client::ChatSession).
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use twotter::prelude::*;
//!
//! # async fn example() -> Result<(), TwotterError> {
//! let server = ChatServer::builder()
//!     .bind("0.0.0.0:12345")
//!     .build()
//!     .await?;
//! server.run().await
//! # }
//! ```

mod error;
mod events;
mod handler;
mod maintenance;
mod server;

pub mod logging;

pub use error::TwotterError;
pub use events::{
    ChannelSink, EventSink, JsonLinesSink, LeaveReason, ServerEvent, TracingSink,
};
pub use server::{ChatServer, ChatServerBuilder, DEFAULT_PORT};

pub use twotter_client as client;
pub use twotter_protocol as protocol;
pub use twotter_registry as registry;
pub use twotter_tick as tick;
pub use twotter_transport as transport;

pub mod prelude {
    pub use crate::{
        ChannelSink, ChatServer, ChatServerBuilder, EventSink, JsonLinesSink, LeaveReason,
        ServerEvent, TracingSink, TwotterError,
    };
    pub use twotter_client::{ChatSession, ClientError, SessionConfig, SessionState};
    pub use twotter_protocol::{ClientId, Message, MessageKind};
    pub use twotter_registry::RegistryConfig;
    pub use twotter_tick::TickConfig;
}
