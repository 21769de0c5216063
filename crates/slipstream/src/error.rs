//! Unified error type for the Slipstream meta-crate.

use slipstream_credential::CredentialError;
use slipstream_protocol::ProtocolError;
use slipstream_store::StoreError;
use slipstream_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// When embedding through the `slipstream` meta-crate, you deal with
/// this single error type instead of importing errors from each
/// sub-crate. The `#[from]` attributes let `?` convert sub-crate errors
/// automatically.
#[derive(Debug, thiserror::Error)]
pub enum SlipstreamError {
    /// A transport-level error (bind, accept, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode, invalid message).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A credential-level error (signing, verification).
    #[error(transparent)]
    Credential(#[from] CredentialError),

    /// A store-level error (rejection or backend failure).
    #[error(transparent)]
    Store(#[from] StoreError),
}
