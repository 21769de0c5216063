//! # Slipstream
//!
//! An authenticated real-time flight-session hub.
//!
//! Clients hold a signed bearer credential binding them to a room and a
//! callsign, connect over WebSocket, say hello, and from then on every
//! aircraft/location/engines/lights/controls update they publish fans
//! out to every other member of the same room. State is persisted in a
//! prefix-scannable keyed store with ownership-checked mutation.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use slipstream::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), SlipstreamError> {
//!     let credentials =
//!         CredentialService::new(Keypair::generate(), "my-hub");
//!     let server = ServerBuilder::new()
//!         .bind("0.0.0.0:8080")
//!         .build(credentials, MemoryStore::new())
//!         .await?;
//!     server.run().await
//! }
//! ```

mod error;
mod handler;
mod server;

pub use error::SlipstreamError;
pub use server::{Server, ServerBuilder, ServerConfig};

/// The common imports for embedding a Slipstream hub.
pub mod prelude {
    pub use crate::{Server, ServerBuilder, ServerConfig, SlipstreamError};
    pub use slipstream_credential::{Claims, CredentialService, Keypair};
    pub use slipstream_hub::{Hub, HubConfig, Outcome};
    pub use slipstream_protocol::{CloseCode, RecordKind, SessionEvent};
    pub use slipstream_store::{
        KeyedStore, MemoryStore, OwnershipPolicy, StateRepository,
    };
}
