//! Server-side client registry for Twotter.
//!
//! Tracks which client ids are online, where they are reachable, and when
//! they were last heard from:
//!
//! 1. **Registration** ([`ClientRegistry::register`]): a HELLO claims an id
//! 2. **Liveness** ([`ClientRegistry::touch`]): every datagram from a
//!    registered id refreshes its timestamp
//! 3. **Expiry** ([`ClientRegistry::sweep_expired`]): idle ids are purged
//!    after the TTL
//!
//! # How it fits in the stack
//!
//! ```text
//! Server (above)    ← guards the registry with one mutex, routes by it
//!     ↕
//! Registry (this crate)
//!     ↕
//! Protocol (below)  ← provides ClientId
//! ```

mod entry;
mod registry;

pub use entry::{Registration, RegistryConfig};
pub use registry::ClientRegistry;
