//! Ed25519 keypair wrapper.

use ed25519_dalek::{Signer, SigningKey, VerifyingKey};

/// An ed25519 keypair used to sign and verify credentials.
///
/// Signing is deterministic (nonce derived from the message), so the
/// same claims under the same key always produce the same token.
pub struct Keypair {
    signing_key: SigningKey,
}

impl Keypair {
    /// Generates a random keypair.
    pub fn generate() -> Self {
        let signing_key = SigningKey::generate(&mut rand::thread_rng());
        Self { signing_key }
    }

    /// Creates a keypair from a 32-byte secret seed.
    pub fn from_seed(seed: [u8; 32]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(&seed),
        }
    }

    /// Returns the public half.
    pub fn verifying_key(&self) -> VerifyingKey {
        self.signing_key.verifying_key()
    }

    /// Signs a message, returning the raw 64-byte signature.
    pub fn sign(&self, message: &[u8]) -> [u8; 64] {
        self.signing_key.sign(message).to_bytes()
    }

    pub(crate) fn signing_key(&self) -> &SigningKey {
        &self.signing_key
    }
}
