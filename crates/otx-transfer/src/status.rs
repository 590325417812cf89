//! Spend status of a token's current state.

use tracing::debug;

use otx_aggregator::{AggregatorClient, AggregatorError};
use otx_token::{InclusionProof, Token};

use crate::Result;

/// Whether the current state has been spent on the registry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SpendStatus {
    Unspent,
    /// Registered; the proof names the spending transaction.
    Spent(Box<InclusionProof>),
}

impl SpendStatus {
    pub fn is_spent(&self) -> bool {
        matches!(self, SpendStatus::Spent(_))
    }
}

/// Ask the aggregator whether `token`'s current state has been spent.
///
/// The request id is derived from the current predicate's public key, so no
/// secret is needed.
///
/// # Errors
///
/// - [`crate::TransferError::NetworkUnavailable`] if the aggregator cannot be
///   reached; read-only callers may fall back to local verification
pub async fn spend_status(client: &dyn AggregatorClient, token: &Token) -> Result<SpendStatus> {
    let predicate = token.state.decode_predicate()?;
    let request_id = token.current_request_id(predicate.public_key())?;
    let status = match client.get_inclusion_proof(&request_id).await {
        Ok(proof) => SpendStatus::Spent(Box::new(proof)),
        Err(AggregatorError::NotFound(_)) => SpendStatus::Unspent,
        Err(e) => return Err(e.into()),
    };
    debug!(token_id = %token.id(), request_id = %request_id, spent = status.is_spent(), "spend status");
    Ok(status)
}
