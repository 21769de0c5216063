//! The Slipstream hub: authenticated connection registry and fan-out.
//!
//! This crate is the concurrency core of the system. It owns:
//!
//! 1. **The connection table** — every live transport connection, its
//!    protocol [`Phase`], and (once authenticated) its bound claims.
//!    The binding lives here, in a side table keyed by connection id,
//!    never on the transport object itself.
//! 2. **Room membership** — which connections currently share a room.
//! 3. **Broadcast-with-exclusion** — delivering a frame to every other
//!    authenticated member of the sender's room.
//! 4. **The session protocol** — hello-first handshake, ownership-checked
//!    persistence of domain updates, forced closure on violations.
//!
//! # Locking discipline
//!
//! One `tokio::sync::Mutex` guards the connection table and the
//! membership map together. It is held only across map mutation and the
//! snapshot of broadcast recipients — never across a store call, never
//! across a send. Sends go through bounded per-connection queues owned
//! by writer tasks; a queue that is full or closed marks its connection
//! dead, and the dead connection is unregistered through the same path
//! a dropped socket would take.

mod config;
mod connection;
mod hub;

pub use config::HubConfig;
pub use connection::{OutboundFrame, OutboundReceiver, OutboundSender, Phase};
pub use hub::{Hub, Outcome};
