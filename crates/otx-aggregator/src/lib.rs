//! # otx-aggregator
//!
//! Client side of the single-spend registry.
//!
//! The registry is an append-only sparse Merkle tree keyed by [`RequestId`].
//! The first submission for a request id registers it; every later one, with
//! any payload, is answered with [`SubmitCommitmentStatus::RequestIdExists`].
//! That rule is the whole double-spend defense, so callers must never treat
//! `RequestIdExists` as success without comparing transaction hashes.
//!
//! ## Modules
//!
//! - [`rpc`] — JSON-RPC 2.0 envelope and method payloads
//! - [`jsonrpc`] — HTTP client for a remote aggregator
//! - [`memory`] — In-process registry with the same contract
//! - [`poll`] — Bounded exponential backoff for proof retrieval

pub mod jsonrpc;
pub mod memory;
pub mod poll;
pub mod rpc;

pub use jsonrpc::JsonRpcAggregatorClient;
pub use memory::{InMemoryAggregator, RoundMode};
pub use poll::{poll_inclusion_proof, PollError, PollPolicy};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use otx_crypto::DataHash;
use otx_token::{Authenticator, InclusionProof, RequestId};

/// Registry answer to a submission.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubmitCommitmentStatus {
    /// The request id was registered by this submission.
    Success,
    /// The request id was already registered, possibly with another payload.
    RequestIdExists,
    /// The authenticator signature does not cover the transaction hash.
    AuthenticatorVerificationFailed,
    /// The request id is not the one the authenticator derives.
    RequestIdMismatch,
}

/// Error types for aggregator access.
#[derive(Debug, thiserror::Error)]
pub enum AggregatorError {
    /// No registration exists (yet) for the request id.
    #[error("request {0} not found")]
    NotFound(RequestId),

    /// Connection or transport failure.
    #[error("network error: {0}")]
    Network(String),

    /// The request did not complete in time.
    #[error("request timed out")]
    Timeout,

    /// The aggregator answered with something unparseable.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// JSON-RPC error object returned by the aggregator.
    #[error("aggregator error {code}: {message}")]
    Rpc {
        /// JSON-RPC error code.
        code: i32,
        /// Error message.
        message: String,
    },
}

impl AggregatorError {
    /// Transport failures that may succeed on retry.
    pub fn is_transient(&self) -> bool {
        matches!(self, AggregatorError::Network(_) | AggregatorError::Timeout)
    }
}

/// Convenience result type for aggregator operations.
pub type Result<T> = std::result::Result<T, AggregatorError>;

/// Contract consumed from the single-spend registry.
#[async_trait]
pub trait AggregatorClient: Send + Sync {
    /// Register `transaction_hash` under `request_id`.
    async fn submit_commitment(
        &self,
        request_id: &RequestId,
        transaction_hash: &DataHash,
        authenticator: &Authenticator,
    ) -> Result<SubmitCommitmentStatus>;

    /// Fetch the inclusion proof for a registered request id.
    ///
    /// Fails with [`AggregatorError::NotFound`] while no certified
    /// registration exists.
    async fn get_inclusion_proof(&self, request_id: &RequestId) -> Result<InclusionProof>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_wire_names() {
        let json = serde_json::to_string(&SubmitCommitmentStatus::RequestIdExists).expect("json");
        assert_eq!(json, "\"REQUEST_ID_EXISTS\"");
        let back: SubmitCommitmentStatus =
            serde_json::from_str("\"AUTHENTICATOR_VERIFICATION_FAILED\"").expect("parse");
        assert_eq!(back, SubmitCommitmentStatus::AuthenticatorVerificationFailed);
    }

    #[test]
    fn test_transient_errors() {
        assert!(AggregatorError::Timeout.is_transient());
        assert!(AggregatorError::Network("refused".into()).is_transient());
        assert!(!AggregatorError::InvalidResponse("x".into()).is_transient());
    }
}
