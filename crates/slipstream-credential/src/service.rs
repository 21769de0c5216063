//! The credential service: signs claim sets into bearer tokens and
//! verifies presented tokens back into claims.
//!
//! Token wire format:
//!
//! ```text
//! "BEARER " + hex(payload) + "." + hex(signature)
//! ```
//!
//! where `payload` is the JSON of the issuer plus the claims, and
//! `signature` is the ed25519 signature over the payload bytes. The
//! `"BEARER "` prefix match is case-insensitive and checked before any
//! decoding or cryptographic work, so obviously-bogus tokens are
//! rejected cheaply.

use ed25519_dalek::{Signature, Signer, Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};

use crate::{Claims, CredentialError, Keypair};

/// Structural marker every token must start with.
pub const BEARER_PREFIX: &str = "BEARER ";

/// What actually gets signed: the issuer plus the claim set.
#[derive(Serialize, Deserialize)]
struct TokenPayload {
    iss: String,
    #[serde(flatten)]
    claims: Claims,
}

/// Signs and verifies session credentials under one keypair and issuer.
///
/// Constructed explicitly at startup and injected into the hub; holders
/// of only the public key can build a verification-only service with
/// [`CredentialService::verifier`].
pub struct CredentialService {
    signing: Option<ed25519_dalek::SigningKey>,
    verifying: VerifyingKey,
    issuer: String,
}

impl CredentialService {
    /// Creates a service that can both sign and verify.
    pub fn new(keypair: Keypair, issuer: impl Into<String>) -> Self {
        Self {
            verifying: keypair.verifying_key(),
            signing: Some(keypair.signing_key().clone()),
            issuer: issuer.into(),
        }
    }

    /// Creates a verification-only service from a public key.
    pub fn verifier(
        verifying: VerifyingKey,
        issuer: impl Into<String>,
    ) -> Self {
        Self {
            signing: None,
            verifying,
            issuer: issuer.into(),
        }
    }

    /// Signs a claim set into a bearer token.
    ///
    /// # Errors
    ///
    /// - [`CredentialError::IncompleteClaims`] — any claim is empty.
    /// - [`CredentialError::SigningUnavailable`] — verification-only
    ///   service.
    pub fn sign(&self, claims: &Claims) -> Result<String, CredentialError> {
        if !claims.is_valid() {
            return Err(CredentialError::IncompleteClaims);
        }
        let signing = self
            .signing
            .as_ref()
            .ok_or(CredentialError::SigningUnavailable)?;

        let payload = serde_json::to_vec(&TokenPayload {
            iss: self.issuer.clone(),
            claims: claims.clone(),
        })
        .map_err(CredentialError::Encode)?;

        let signature = signing.sign(&payload);
        Ok(format!(
            "{BEARER_PREFIX}{}.{}",
            hex::encode(&payload),
            hex::encode(signature.to_bytes())
        ))
    }

    /// Verifies a presented token and returns its claims.
    ///
    /// Rejection order: structural prefix, framing, signature, issuer,
    /// claim completeness. Callers closing a connection over any of
    /// these must not leak which step failed to the peer.
    pub fn verify(&self, token: &str) -> Result<Claims, CredentialError> {
        // Cheap structural rejection before any crypto.
        let body = token
            .get(..BEARER_PREFIX.len())
            .filter(|p| p.eq_ignore_ascii_case(BEARER_PREFIX))
            .map(|_| &token[BEARER_PREFIX.len()..])
            .ok_or(CredentialError::Malformed)?;

        let (payload_hex, sig_hex) =
            body.split_once('.').ok_or(CredentialError::Malformed)?;
        let payload =
            hex::decode(payload_hex).map_err(|_| CredentialError::Malformed)?;
        let sig_bytes =
            hex::decode(sig_hex).map_err(|_| CredentialError::Malformed)?;
        let signature = Signature::from_slice(&sig_bytes)
            .map_err(|_| CredentialError::Malformed)?;

        self.verifying
            .verify(&payload, &signature)
            .map_err(|_| CredentialError::BadSignature)?;

        let payload: TokenPayload = serde_json::from_slice(&payload)
            .map_err(|_| CredentialError::Malformed)?;

        if payload.iss != self.issuer {
            return Err(CredentialError::WrongIssuer);
        }
        if !payload.claims.is_valid() {
            return Err(CredentialError::IncompleteClaims);
        }

        Ok(payload.claims)
    }

    /// The issuer string this service signs and accepts.
    pub fn issuer(&self) -> &str {
        &self.issuer
    }
}

// =========================================================================
// Tests
// =========================================================================
