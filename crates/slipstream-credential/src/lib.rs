//! Signed session credentials for Slipstream.
//!
//! A credential is a self-contained bearer token binding an identity
//! (username) to a room and to the entity (callsign) it controls:
//!
//! 1. **Claims** ([`Claims`]) — the immutable claim set
//!    {username, session id, room, callsign}.
//! 2. **Keys** ([`Keypair`]) — an ed25519 keypair; the private half signs,
//!    the public half verifies.
//! 3. **Service** ([`CredentialService`]) — sign/verify with issuer
//!    pinning and the `"BEARER "` wire framing.
//!
//! The service is an explicitly constructed value injected wherever
//! verification happens. There is no process-global keypair; whoever
//! builds the hub decides which keys it trusts.

mod claims;
mod error;
mod keys;
mod service;

pub use claims::Claims;
pub use error::CredentialError;
pub use keys::Keypair;
pub use service::{BEARER_PREFIX, CredentialService};
