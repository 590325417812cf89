//! # otx-transfer
//!
//! Transfer orchestration on top of the token model and the aggregator.
//!
//! Two transfer patterns are supported:
//!
//! - **Immediate**: the sender registers the commitment, waits for the
//!   inclusion proof and hands the recipient a confirmed package.
//! - **Offline**: the sender only builds and signs the commitment; the
//!   recipient registers it when completing the transfer.
//!
//! Every registration goes through [`submit_and_confirm`], which refuses to
//! report success for a request id registered with a different transaction.
//!
//! ## Modules
//!
//! - [`submit`] — Submission, conflict detection and registration queries
//! - [`mint`] — Minting new tokens
//! - [`send`] — Immediate and offline sending
//! - [`receive`] — Completing a transfer on the recipient side
//! - [`status`] — Spend status of a token's current state

pub mod mint;
pub mod receive;
pub mod send;
pub mod status;
pub mod submit;

pub use mint::{mint_token, MintParams};
pub use receive::{receive, ReceiveParams};
pub use send::{send_immediate, send_offline, SendParams};
pub use status::{spend_status, SpendStatus};
pub use submit::{query_registration, submit_and_confirm, Registration};

use otx_aggregator::{AggregatorError, SubmitCommitmentStatus};
use otx_crypto::DataHash;
use otx_token::{RequestId, TokenError, VerificationError};

/// Error types for transfer operations.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    /// The request id is registered with another transaction: the source
    /// state was already spent elsewhere.
    #[error(
        "double spend or conflict: request {request_id} is registered with transaction \
         {registered}, not {attempted}"
    )]
    DoubleSpendOrConflict {
        request_id: RequestId,
        registered: DataHash,
        attempted: DataHash,
    },

    /// Recipient data does not match the transaction's data commitment.
    #[error("state data mismatch: {0}")]
    StateDataMismatch(String),

    /// Polling gave up; the commitment may or may not be registered.
    /// Re-query with [`query_registration`] before building a new one.
    #[error("request {request_id} is indeterminate after {attempts} attempts")]
    Indeterminate { request_id: RequestId, attempts: u32 },

    /// The aggregator could not be reached.
    #[error("network unavailable: {0}")]
    NetworkUnavailable(String),

    /// The aggregator refused the submission.
    #[error("submission of {request_id} rejected: {status:?}")]
    Rejected {
        request_id: RequestId,
        status: SubmitCommitmentStatus,
    },

    /// The transaction does not spend the token's current state.
    #[error("chain linkage: transaction spends {actual}, current state is {expected}")]
    ChainLinkage { expected: DataHash, actual: DataHash },

    /// The secret does not open the predicate.
    #[error("key mismatch: predicate expects {expected}, got {actual}")]
    KeyMismatch { expected: String, actual: String },

    /// The secret does not own the address the transfer pays.
    #[error("not the recipient: {0}")]
    NotRecipient(String),

    /// The transfer file has no offline transfer section.
    #[error("token file has no pending transfer")]
    NoPendingTransfer,

    #[error(transparent)]
    Verification(#[from] VerificationError),

    #[error(transparent)]
    Aggregator(AggregatorError),

    #[error(transparent)]
    Token(TokenError),
}

impl From<TokenError> for TransferError {
    fn from(e: TokenError) -> Self {
        match e {
            TokenError::ChainLinkage { expected, actual } => {
                TransferError::ChainLinkage { expected, actual }
            }
            TokenError::KeyMismatch { expected, actual } => {
                TransferError::KeyMismatch { expected, actual }
            }
            other => TransferError::Token(other),
        }
    }
}

impl From<AggregatorError> for TransferError {
    fn from(e: AggregatorError) -> Self {
        if e.is_transient() {
            TransferError::NetworkUnavailable(e.to_string())
        } else {
            TransferError::Aggregator(e)
        }
    }
}

/// Convenience result type for transfer operations.
pub type Result<T> = std::result::Result<T, TransferError>;
