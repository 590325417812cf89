//! # otx-crypto
//!
//! Cryptographic primitives for the offchain token transfer protocol.
//!
//! The suite is fixed: hashes are SHA-256 or BLAKE3 and always carry their
//! algorithm tag, signatures are Ed25519.
//!
//! ## Modules
//!
//! - [`hash`] — Algorithm-tagged [`DataHash`] imprints and streaming hashing
//! - [`blake3`] — Context-separated key derivation and Merkle node hashing
//! - [`ed25519`] — Ed25519 over raw key and signature bytes
//! - [`secret`] — Zeroizing holder for user secret material

pub mod blake3;
pub mod ed25519;
pub mod hash;
pub mod secret;

pub use hash::{compute_recipient_data_hash, DataHash, DataHasher, HashAlgorithm};
pub use secret::Secret;

/// Failures of hashing and signature primitives.
#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    /// Ed25519 signature verification failed.
    #[error("signature verification failed")]
    SignatureVerification,

    /// A hash imprint carried an algorithm tag this build does not know.
    #[error("unknown hash algorithm tag {0:#06x}")]
    UnknownHashAlgorithm(u16),

    /// A hash imprint had the wrong length.
    #[error("invalid hash imprint length: expected {expected}, got {actual}")]
    InvalidImprintLength { expected: usize, actual: usize },

    /// Invalid input data.
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

pub type Result<T> = std::result::Result<T, CryptoError>;
