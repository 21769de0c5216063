//! Wire protocol for Slipstream.
//!
//! This crate defines the "language" that clients and the hub speak:
//!
//! - **Types** ([`RecordKind`], [`SessionEvent`], [`CloseCode`]) — the
//!   structures that travel on the wire.
//! - **Decode boundary** ([`decode_inbound`], [`Inbound`]) — how a raw
//!   frame is parsed once and classified over the closed set of known
//!   message kinds.
//! - **Errors** ([`ProtocolError`]) — what can go wrong while decoding.
//!
//! # Architecture
//!
//! The protocol layer sits between transport (raw bytes) and the hub
//! (identity and membership). It doesn't know about connections or
//! rooms — it only knows how to classify and serialize messages.
//!
//! ```text
//! Transport (bytes) → Protocol (Inbound) → Hub (identity, membership)
//! ```
//!
//! Every frame is a JSON object tagged by a `type` field. A frame with
//! no `type` field is malformed ([`ProtocolError::MissingType`]); a
//! frame whose tag is simply not in the known set decodes to
//! [`Inbound::Unknown`] and is the hub's to ignore. The two cases are
//! deliberately distinct: only the former is a protocol violation.

mod decode;
mod error;
mod types;

pub use decode::{Inbound, decode_inbound};
pub use error::ProtocolError;
pub use types::{CloseCode, RecordKind, SessionEvent};
