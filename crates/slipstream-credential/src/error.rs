//! Error types for the credential layer.

/// Errors that can occur while signing or verifying credentials.
///
/// Verification failures are logged with their variant, but the wire
/// only ever sees a generic authorization refusal; the variants exist
/// for operators, not for peers.
#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    /// One or more claims are empty or absent.
    #[error("claim set is incomplete")]
    IncompleteClaims,

    /// The token is structurally broken: missing bearer prefix, bad
    /// framing, or an undecodable payload.
    #[error("malformed bearer token")]
    Malformed,

    /// The signature does not verify under the held public key.
    #[error("signature verification failed")]
    BadSignature,

    /// The token was issued by someone else.
    #[error("unexpected token issuer")]
    WrongIssuer,

    /// Serializing the claim payload failed.
    #[error("claims encoding failed: {0}")]
    Encode(#[source] serde_json::Error),

    /// This service holds only a public key and cannot sign.
    #[error("signing key not available")]
    SigningUnavailable,
}
