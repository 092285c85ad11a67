//! Client side of Twotter.
//!
//! [`ChatSession`] joins a chat server with a HELLO handshake, then lets a
//! front end send TEXT, BYE and LIST_ONLINE while a background task
//! collects everything the server sends back.
//!
//! ```rust,ignore
//! let config = SessionConfig::new(server_addr, ClientId(1), "alice");
//! let mut session = ChatSession::connect(config).await?;
//! session.send_text("hi", ClientId::BROADCAST).await?;
//! while let Some(msg) = session.next_message().await {
//!     println!("{}: {}", msg.sender_name, msg.body);
//! }
//! ```

mod config;
mod error;
mod session;

pub use config::{DEFAULT_HANDSHAKE_TIMEOUT, DEFAULT_KEEPALIVE_INTERVAL, SessionConfig};
pub use error::ClientError;
pub use session::{ChatSession, SessionState};
