//! Commitment submission.
//!
//! `REQUEST_ID_EXISTS` is ambiguous: it is what an idempotent resubmission of
//! our own commitment gets, and also what a losing double spend gets. The
//! two are told apart only by comparing the registered transaction hash
//! with ours.

use tracing::{debug, info, warn};

use otx_aggregator::{
    poll_inclusion_proof, AggregatorClient, AggregatorError, PollError, PollPolicy,
    SubmitCommitmentStatus,
};
use otx_crypto::DataHash;
use otx_token::{Commitment, InclusionProof, RequestId, TransactionData, VerificationError};

use crate::{Result, TransferError};

/// Registration state of a request id, relative to one transaction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Registration {
    NotRegistered,
    /// Registered with the expected transaction.
    Registered(Box<InclusionProof>),
    /// Registered with a different transaction.
    Conflict(Box<InclusionProof>),
}

/// Register `commitment` and return its inclusion proof.
///
/// Transient submission failures are retried per `policy`; resubmitting the
/// same commitment is safe. A registration found under the request id is
/// accepted only if it carries this commitment's transaction hash.
///
/// # Errors
///
/// - [`TransferError::DoubleSpendOrConflict`] if another transaction holds the request id
/// - [`TransferError::Rejected`] if the aggregator refuses the commitment
/// - [`TransferError::Indeterminate`] if the proof did not arrive in time
/// - [`TransferError::NetworkUnavailable`] if the aggregator cannot be reached
pub async fn submit_and_confirm<D: TransactionData + Sync>(
    client: &dyn AggregatorClient,
    commitment: &Commitment<D>,
    policy: &PollPolicy,
) -> Result<InclusionProof> {
    let request_id = commitment.request_id;
    let transaction_hash = commitment.transaction_hash()?;

    let status = submit_with_retry(client, commitment, &transaction_hash, policy).await?;
    match status {
        SubmitCommitmentStatus::Success => {
            info!(request_id = %request_id, "commitment registered");
        }
        SubmitCommitmentStatus::RequestIdExists => {
            warn!(request_id = %request_id, "request id already registered, checking transaction");
        }
        status @ (SubmitCommitmentStatus::AuthenticatorVerificationFailed
        | SubmitCommitmentStatus::RequestIdMismatch) => {
            return Err(TransferError::Rejected { request_id, status });
        }
    }

    let proof = poll_inclusion_proof(client, &request_id, policy)
        .await
        .map_err(|e| match e {
            PollError::Indeterminate {
                request_id,
                attempts,
            } => TransferError::Indeterminate {
                request_id,
                attempts,
            },
            PollError::Aggregator(e) => e.into(),
        })?;
    ensure_own_registration(&request_id, &transaction_hash, &proof)?;
    debug!(request_id = %request_id, "inclusion proof matches commitment");
    Ok(proof)
}

async fn submit_with_retry<D: TransactionData + Sync>(
    client: &dyn AggregatorClient,
    commitment: &Commitment<D>,
    transaction_hash: &DataHash,
    policy: &PollPolicy,
) -> Result<SubmitCommitmentStatus> {
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;
    loop {
        attempt += 1;
        match client
            .submit_commitment(&commitment.request_id, transaction_hash, &commitment.authenticator)
            .await
        {
            Ok(status) => return Ok(status),
            Err(e) if e.is_transient() && attempt < max_attempts => {
                warn!(
                    request_id = %commitment.request_id,
                    attempt,
                    error = %e,
                    "submission failed, retrying"
                );
                tokio::time::sleep(policy.delay_after(attempt)).await;
            }
            Err(e) => return Err(e.into()),
        }
    }
}

pub(crate) fn ensure_own_registration(
    request_id: &RequestId,
    transaction_hash: &DataHash,
    proof: &InclusionProof,
) -> Result<()> {
    match &proof.transaction_hash {
        Some(registered) if registered == transaction_hash => Ok(()),
        Some(registered) => {
            warn!(
                request_id = %request_id,
                registered = %registered,
                attempted = %transaction_hash,
                "request id registered with another transaction"
            );
            Err(TransferError::DoubleSpendOrConflict {
                request_id: *request_id,
                registered: *registered,
                attempted: *transaction_hash,
            })
        }
        None => Err(VerificationError::MalformedProof(format!(
            "proof for {request_id} has no transaction hash"
        ))
        .into()),
    }
}

/// Look up whether `request_id` is registered with `transaction_hash`.
///
/// Used after an indeterminate transfer to decide between waiting, giving
/// up and building a new commitment.
pub async fn query_registration(
    client: &dyn AggregatorClient,
    request_id: &RequestId,
    transaction_hash: &DataHash,
) -> Result<Registration> {
    match client.get_inclusion_proof(request_id).await {
        Ok(proof) if proof.transaction_hash.as_ref() == Some(transaction_hash) => {
            Ok(Registration::Registered(Box::new(proof)))
        }
        Ok(proof) => Ok(Registration::Conflict(Box::new(proof))),
        Err(AggregatorError::NotFound(_)) => Ok(Registration::NotRegistered),
        Err(e) => Err(e.into()),
    }
}
