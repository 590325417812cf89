//! Ed25519 signatures.
//!
//! Predicates, authenticators and root certificates carry keys and
//! signatures as raw byte arrays, so this module signs into `[u8; 64]` and
//! verifies from `[u8; 32]` public keys instead of exposing dalek types.

use ed25519_dalek::{Signer, Verifier};
use serde::{Deserialize, Serialize};

use crate::{CryptoError, Result};

/// Signature algorithm declared by predicates and authenticators.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SignatureAlgorithm {
    #[default]
    Ed25519,
}

impl SignatureAlgorithm {
    /// Stable one-byte tag used inside hashed encodings.
    pub const fn tag(self) -> u8 {
        match self {
            SignatureAlgorithm::Ed25519 => 0,
        }
    }
}

/// Private signing key. The dalek key zeroizes itself on drop.
#[derive(Clone)]
pub struct SigningKey(ed25519_dalek::SigningKey);

impl SigningKey {
    /// Fresh key from the OS RNG.
    pub fn generate() -> Self {
        Self(ed25519_dalek::SigningKey::generate(&mut rand::rngs::OsRng))
    }

    /// Deterministic key from a 32-byte seed, usually a BLAKE3-derived key.
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        Self(ed25519_dalek::SigningKey::from_bytes(seed))
    }

    pub fn public_key_bytes(&self) -> [u8; 32] {
        self.0.verifying_key().to_bytes()
    }

    pub fn sign(&self, message: &[u8]) -> [u8; 64] {
        self.0.sign(message).to_bytes()
    }
}

impl std::fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SigningKey({})", hex::encode(self.public_key_bytes()))
    }
}

/// Check `signature` over `message` under `public_key`.
///
/// # Errors
///
/// - [`CryptoError::InvalidInput`] if `public_key` is not a valid point
/// - [`CryptoError::SignatureVerification`] if the signature does not verify
pub fn verify(public_key: &[u8; 32], message: &[u8], signature: &[u8; 64]) -> Result<()> {
    let key = ed25519_dalek::VerifyingKey::from_bytes(public_key)
        .map_err(|e| CryptoError::InvalidInput(format!("public key: {e}")))?;
    key.verify(message, &ed25519_dalek::Signature::from_bytes(signature))
        .map_err(|_| CryptoError::SignatureVerification)
}
