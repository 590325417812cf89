//! # otx-token
//!
//! Token state-transition model and verification engine.
//!
//! A token is a genesis (mint) transaction, an ordered list of transfer
//! transactions and the current [`TokenState`]. Every transition is
//! committed to the single-spend registry under a deterministic
//! [`RequestId`], and the registry's inclusion proof travels with the token.
//! A recipient accepts a token only after [`verify::verify`] has checked all
//! seven stages for genesis and every transfer.
//!
//! ## Modules
//!
//! - [`id`] — Token id and token type
//! - [`cbor`] — Canonical CBOR encoding used for every hashed structure
//! - [`predicate`] — Unmasked / masked ownership predicates
//! - [`address`] — `DIRECT://` addresses committing to a predicate reference
//! - [`state`] — Token state (predicate bytes + payload)
//! - [`transaction`] — Mint / transfer transaction data and records
//! - [`request_id`] — Registry keys
//! - [`authenticator`] — Signatures authorizing a transition
//! - [`inclusion_proof`] — Registry proofs and root certificates
//! - [`trust_base`] — Root-of-trust configuration
//! - [`commitment`] — Commitment builder for mint and transfer
//! - [`token`] — The token aggregate
//! - [`verify`] — The verification engine
//! - [`file`] — The persisted transfer artifact

pub mod address;
pub mod authenticator;
pub mod cbor;
pub mod commitment;
pub mod file;
pub mod id;
pub mod inclusion_proof;
pub mod predicate;
pub mod request_id;
pub mod state;
#[cfg(test)]
mod testing;
pub mod token;
pub mod transaction;
pub mod trust_base;
pub mod verify;

pub use address::Address;
pub use authenticator::Authenticator;
pub use commitment::{
    create_mint_commitment, create_transfer_commitment, mint_commitment_from_data, Commitment,
};
pub use file::{OfflineTransfer, TokenFile, TransferStatus};
pub use id::{random_salt, TokenId, TokenType};
pub use inclusion_proof::{InclusionProof, InclusionProofStatus, RootCertificate, ValidatorSignature};
pub use predicate::{Predicate, PredicateBody, PredicateKind};
pub use request_id::RequestId;
pub use state::TokenState;
pub use token::{Token, TOKEN_VERSION};
pub use transaction::{
    mint_source_state, minter_signing_key, CoinBalance, MintTransaction, MintTransactionData,
    TokenCoinData, TransactionData, TransferTransaction, TransferTransactionData,
};
pub use trust_base::TrustBase;
pub use verify::{verify, verify_transaction, VerificationError, VerificationStage};

use otx_crypto::DataHash;

/// Error types for token model operations.
#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    /// CBOR serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// CBOR deserialization error, or bytes that are not in canonical form.
    #[error("deserialization error: {0}")]
    Deserialization(String),

    /// Underlying cryptographic failure.
    #[error(transparent)]
    Crypto(#[from] otx_crypto::CryptoError),

    /// The supplied key material does not open the predicate.
    #[error("key mismatch: predicate expects public key {expected}, got {actual}")]
    KeyMismatch {
        /// Hex public key the predicate declares.
        expected: String,
        /// Hex public key derived from the supplied material.
        actual: String,
    },

    /// A transaction does not spend the token's current state.
    #[error("chain linkage error: transaction spends {actual}, current state is {expected}")]
    ChainLinkage {
        /// Hash of the token's current state.
        expected: DataHash,
        /// Source state hash declared by the transaction.
        actual: DataHash,
    },

    /// Malformed `DIRECT://` address.
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    /// Coin data violates its invariants.
    #[error("invalid coin data: {0}")]
    InvalidCoinData(String),

    /// Trust base configuration is unusable.
    #[error("invalid trust base: {0}")]
    InvalidTrustBase(String),

    /// Structurally invalid transfer artifact.
    #[error("invalid token file: {0}")]
    InvalidArtifact(String),

    /// JSON encoding or decoding of an artifact failed.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error reading or writing an artifact.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience result type for token model operations.
pub type Result<T> = std::result::Result<T, TokenError>;
