//! Sending a token.
//!
//! Both flows produce a [`TokenFile`] carrying the token and an
//! `offlineTransfer` section for the recipient. An immediate send registers
//! the commitment first and bundles the proof (`CONFIRMED`); an offline send
//! leaves registration to the recipient (`PENDING`).

use tracing::info;

use otx_aggregator::{AggregatorClient, PollPolicy};
use otx_crypto::{compute_recipient_data_hash, Secret};
use otx_token::{
    create_transfer_commitment, random_salt, Address, Commitment, OfflineTransfer, Token,
    TokenFile, TransferStatus, TransferTransactionData,
};

use crate::submit::submit_and_confirm;
use crate::Result;

/// Parameters for [`send_immediate`] and [`send_offline`].
#[derive(Clone, Debug)]
pub struct SendParams {
    pub recipient: Address,
    /// Data for the recipient's state. Committed to by hash.
    pub data: Option<Vec<u8>>,
    /// Embed `data` in the transfer file. When false the recipient must
    /// supply it on receive.
    pub include_data: bool,
    /// Committed transaction message.
    pub message: Option<Vec<u8>>,
    /// Plaintext note for the recipient, not committed to.
    pub note: Option<String>,
    /// Random when absent.
    pub salt: Option<[u8; 32]>,
}

impl SendParams {
    pub fn new(recipient: Address) -> Self {
        Self {
            recipient,
            data: None,
            include_data: true,
            message: None,
            note: None,
            salt: None,
        }
    }
}

fn build_commitment(
    token: &Token,
    owner: &Secret,
    params: &SendParams,
) -> Result<Commitment<TransferTransactionData>> {
    let key = token.state.decode_predicate()?.signing_key(owner)?;
    let commitment = create_transfer_commitment(
        token,
        params.recipient,
        params.salt.unwrap_or_else(random_salt),
        compute_recipient_data_hash(params.data.as_deref()),
        params.message.clone(),
        &key,
    )?;
    Ok(commitment)
}

fn package(
    token: &Token,
    commitment: Commitment<TransferTransactionData>,
    params: SendParams,
    status: TransferStatus,
    inclusion_proof: Option<otx_token::InclusionProof>,
) -> TokenFile {
    let recipient_data = if params.include_data { params.data } else { None };
    TokenFile::with_offline_transfer(
        token.clone(),
        OfflineTransfer {
            commitment,
            recipient_address: params.recipient,
            status,
            message: params.note,
            inclusion_proof,
            recipient_data,
        },
    )
}

/// Sign a transfer of `token` without contacting the aggregator.
///
/// The source state stays unspent until the recipient registers the
/// commitment, so the sender must not build another transfer from it in
/// the meantime.
///
/// # Errors
///
/// - [`crate::TransferError::KeyMismatch`] if `owner` does not own the current state
pub fn send_offline(token: &Token, owner: &Secret, params: SendParams) -> Result<TokenFile> {
    let commitment = build_commitment(token, owner, &params)?;
    info!(
        token_id = %token.id(),
        request_id = %commitment.request_id,
        recipient = %params.recipient,
        "offline transfer created"
    );
    Ok(package(token, commitment, params, TransferStatus::Pending, None))
}

/// Register a transfer of `token` and bundle its inclusion proof.
///
/// # Errors
///
/// - [`crate::TransferError::KeyMismatch`] if `owner` does not own the current state
/// - [`crate::TransferError::DoubleSpendOrConflict`] if the current state was already spent
/// - any other [`submit_and_confirm`] error
pub async fn send_immediate(
    client: &dyn AggregatorClient,
    token: &Token,
    owner: &Secret,
    params: SendParams,
    policy: &PollPolicy,
) -> Result<TokenFile> {
    let commitment = build_commitment(token, owner, &params)?;
    let proof = submit_and_confirm(client, &commitment, policy).await?;
    info!(
        token_id = %token.id(),
        request_id = %commitment.request_id,
        recipient = %params.recipient,
        "transfer registered"
    );
    Ok(package(
        token,
        commitment,
        params,
        TransferStatus::Confirmed,
        Some(proof),
    ))
}
