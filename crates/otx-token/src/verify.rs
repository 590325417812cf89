//! Token verification engine.
//!
//! [`verify`] runs seven stages in a fixed order over genesis and every
//! transfer and stops at the first failure:
//!
//! 1. **Structure**: every inclusion proof carries an authenticator and a
//!    transaction hash.
//! 2. **Decode**: every state predicate decodes strictly; coin data is well
//!    formed.
//! 3. **Signatures**: each authenticator is signed by the expected key
//!    (the universal minter key for genesis, the source predicate's key for a
//!    transfer) over the proof's transaction hash and the hash of the state
//!    being spent. State hashes are always SHA-256, so one state has one
//!    request id.
//! 4. **Inclusion**: each proof's Merkle path leads from the authenticator's
//!    leaf to a root certified by the trust base.
//! 5. **Linkage**: each transfer spends the state produced by the previous
//!    step, targets the same token, and every transaction's data hashes to the
//!    transaction hash that was registered.
//! 6. **Recipients**: each produced state's predicate is the one its
//!    transaction paid.
//! 7. **Data commitment**: each produced state's data matches the declared
//!    recipient data hash, and is absent when none was declared.
//!
//! Verification is synchronous and pure: it needs only the token, the
//! proofs already inside it and the trust base.

use std::fmt;

use serde::Serialize;
use tracing::debug;

use otx_crypto::{DataHash, HashAlgorithm};

use crate::address::Address;
use crate::id::{TokenId, TokenType};
use crate::inclusion_proof::{InclusionProof, InclusionProofStatus};
use crate::predicate::Predicate;
use crate::state::TokenState;
use crate::token::Token;
use crate::transaction::{minter_signing_key, TransactionData, TransferTransactionData};
use crate::trust_base::TrustBase;
use crate::TokenError;

/// The stage at which verification failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VerificationStage {
    /// An inclusion proof lacks its authenticator or transaction hash.
    MalformedProof,
    /// A predicate or the coin data does not decode.
    DecodeError,
    /// An authenticator is not the owner's signature over the transition.
    SignatureInvalid,
    /// A Merkle path does not reach a root the trust base certifies.
    ProofNotInTree,
    /// A transfer does not spend the previous state, or its data does not
    /// hash to the registered transaction hash.
    ChainBroken,
    /// A state's predicate is not the one its transaction paid.
    RecipientMismatch,
    /// A state's data does not match the committed recipient data hash.
    StateDataTampered,
}

impl VerificationStage {
    /// All stages in execution order.
    pub const ALL: [VerificationStage; 7] = [
        VerificationStage::MalformedProof,
        VerificationStage::DecodeError,
        VerificationStage::SignatureInvalid,
        VerificationStage::ProofNotInTree,
        VerificationStage::ChainBroken,
        VerificationStage::RecipientMismatch,
        VerificationStage::StateDataTampered,
    ];

    /// Stable code for scripts.
    pub fn code(self) -> &'static str {
        match self {
            VerificationStage::MalformedProof => "MALFORMED_PROOF",
            VerificationStage::DecodeError => "DECODE_ERROR",
            VerificationStage::SignatureInvalid => "SIGNATURE_INVALID",
            VerificationStage::ProofNotInTree => "PROOF_NOT_IN_TREE",
            VerificationStage::ChainBroken => "CHAIN_BROKEN",
            VerificationStage::RecipientMismatch => "RECIPIENT_MISMATCH",
            VerificationStage::StateDataTampered => "STATE_DATA_TAMPERED",
        }
    }
}

impl fmt::Display for VerificationStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// First failing verification stage and why.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum VerificationError {
    #[error("MALFORMED_PROOF: {0}")]
    MalformedProof(String),
    #[error("DECODE_ERROR: {0}")]
    DecodeError(String),
    #[error("SIGNATURE_INVALID: {0}")]
    SignatureInvalid(String),
    #[error("PROOF_NOT_IN_TREE: {0}")]
    ProofNotInTree(String),
    #[error("CHAIN_BROKEN: {0}")]
    ChainBroken(String),
    #[error("RECIPIENT_MISMATCH: {0}")]
    RecipientMismatch(String),
    #[error("STATE_DATA_TAMPERED: {0}")]
    StateDataTampered(String),
}

impl VerificationError {
    pub fn kind(&self) -> VerificationStage {
        match self {
            VerificationError::MalformedProof(_) => VerificationStage::MalformedProof,
            VerificationError::DecodeError(_) => VerificationStage::DecodeError,
            VerificationError::SignatureInvalid(_) => VerificationStage::SignatureInvalid,
            VerificationError::ProofNotInTree(_) => VerificationStage::ProofNotInTree,
            VerificationError::ChainBroken(_) => VerificationStage::ChainBroken,
            VerificationError::RecipientMismatch(_) => VerificationStage::RecipientMismatch,
            VerificationError::StateDataTampered(_) => VerificationStage::StateDataTampered,
        }
    }

    pub fn reason(&self) -> &str {
        match self {
            VerificationError::MalformedProof(r)
            | VerificationError::DecodeError(r)
            | VerificationError::SignatureInvalid(r)
            | VerificationError::ProofNotInTree(r)
            | VerificationError::ChainBroken(r)
            | VerificationError::RecipientMismatch(r)
            | VerificationError::StateDataTampered(r) => r,
        }
    }
}

/// Borrowed view of one step (genesis or a transfer) of a token's history.
struct Step<'a> {
    label: String,
    proof: &'a InclusionProof,
    token_id: TokenId,
    token_type: TokenType,
    recipient: &'a Address,
    salt: &'a [u8; 32],
    recipient_data_hash: Option<&'a DataHash>,
    /// `None` for genesis.
    transfer: Option<(&'a TransferTransactionData, &'a TokenState)>,
    produced: &'a TokenState,
    hash_data: Box<dyn Fn(HashAlgorithm) -> crate::Result<DataHash> + 'a>,
}

fn steps(token: &Token) -> Vec<Step<'_>> {
    let produced = token.produced_states();
    let genesis = &token.genesis.data;
    let mut steps = Vec::with_capacity(produced.len());
    steps.push(Step {
        label: "genesis".into(),
        proof: &token.genesis.inclusion_proof,
        token_id: genesis.token_id,
        token_type: genesis.token_type,
        recipient: &genesis.recipient,
        salt: &genesis.salt,
        recipient_data_hash: genesis.recipient_data_hash.as_ref(),
        transfer: None,
        produced: produced[0],
        hash_data: Box::new(move |alg| genesis.hash(alg)),
    });
    for (i, tx) in token.transactions.iter().enumerate() {
        let data = &tx.data;
        steps.push(Step {
            label: format!("transfer {}", i + 1),
            proof: &tx.inclusion_proof,
            token_id: data.token_id,
            token_type: data.token_type,
            recipient: &data.recipient,
            salt: &data.salt,
            recipient_data_hash: data.recipient_data_hash.as_ref(),
            transfer: Some((data, &tx.source_state)),
            produced: produced[i + 1],
            hash_data: Box::new(move |alg| data.hash(alg)),
        });
    }
    steps
}

/// Verify a token's complete history against `trust_base`.
///
/// # Errors
///
/// Returns the first failing stage as a [`VerificationError`].
pub fn verify(token: &Token, trust_base: &TrustBase) -> Result<(), VerificationError> {
    let steps = steps(token);
    debug!(token_id = %token.id(), steps = steps.len(), "verifying token");

    check_structure(&steps)?;
    let predicates = check_decode(token, &steps)?;
    check_signatures(&steps, &predicates)?;
    check_inclusion(&steps, trust_base)?;
    check_linkage(&steps)?;
    check_recipients(&steps, &predicates)?;
    check_data_commitments(&steps)?;

    debug!(token_id = %token.id(), "token verified");
    Ok(())
}

/// Verify `token` extended by a pending transfer to `new_state`.
///
/// Returns the extended token on success.
pub fn verify_transaction(
    token: &Token,
    data: TransferTransactionData,
    proof: InclusionProof,
    new_state: TokenState,
    trust_base: &TrustBase,
) -> Result<Token, VerificationError> {
    let next = token
        .apply_transaction(data, proof, new_state)
        .map_err(|e| {
            if matches!(e, TokenError::ChainLinkage { .. }) {
                VerificationError::ChainBroken(e.to_string())
            } else {
                VerificationError::DecodeError(e.to_string())
            }
        })?;
    verify(&next, trust_base)?;
    Ok(next)
}

fn check_structure(steps: &[Step<'_>]) -> Result<(), VerificationError> {
    for step in steps {
        if step.proof.authenticator.is_none() {
            return Err(VerificationError::MalformedProof(format!(
                "{}: inclusion proof has no authenticator",
                step.label
            )));
        }
        if step.proof.transaction_hash.is_none() {
            return Err(VerificationError::MalformedProof(format!(
                "{}: inclusion proof has no transaction hash",
                step.label
            )));
        }
    }
    debug!(stage = %VerificationStage::MalformedProof, "stage passed");
    Ok(())
}

fn check_decode(token: &Token, steps: &[Step<'_>]) -> Result<Vec<Predicate>, VerificationError> {
    if let Some(coins) = &token.genesis.data.coin_data {
        coins
            .validate()
            .map_err(|e| VerificationError::DecodeError(format!("genesis: {e}")))?;
    }
    let predicates = steps
        .iter()
        .map(|step| {
            step.produced.decode_predicate().map_err(|e| {
                VerificationError::DecodeError(format!(
                    "state produced by {}: predicate: {e}",
                    step.label
                ))
            })
        })
        .collect::<Result<Vec<_>, _>>()?;
    debug!(stage = %VerificationStage::DecodeError, "stage passed");
    Ok(predicates)
}

/// `predicates[i]` is the predicate of the state produced by step `i`, so
/// step `i > 0` spends the state locked by `predicates[i - 1]`.
fn check_signatures(steps: &[Step<'_>], predicates: &[Predicate]) -> Result<(), VerificationError> {
    for (i, step) in steps.iter().enumerate() {
        let (Some(authenticator), Some(transaction_hash)) =
            (&step.proof.authenticator, &step.proof.transaction_hash)
        else {
            continue;
        };
        let fail = |reason: &str| {
            VerificationError::SignatureInvalid(format!("{}: {reason}", step.label))
        };

        let (expected_key, spent_state) = match step.transfer {
            None => (
                minter_signing_key(&step.token_id).public_key_bytes(),
                crate::transaction::mint_source_state(&step.token_id),
            ),
            Some((_, source_state)) => {
                let spent = source_state.hash().map_err(|e| fail(&e.to_string()))?;
                (*predicates[i - 1].public_key(), spent)
            }
        };
        if authenticator.public_key != expected_key {
            return Err(fail("authenticator is not signed by the owner of the spent state"));
        }
        if authenticator.state_hash != spent_state {
            return Err(fail("authenticator does not cover the spent state"));
        }
        if !authenticator.verify(transaction_hash) {
            return Err(fail("authenticator signature does not verify"));
        }
    }
    debug!(stage = %VerificationStage::SignatureInvalid, "stage passed");
    Ok(())
}

fn check_inclusion(steps: &[Step<'_>], trust_base: &TrustBase) -> Result<(), VerificationError> {
    for step in steps {
        let Some(authenticator) = &step.proof.authenticator else {
            continue;
        };
        let request_id = authenticator.request_id();
        match step.proof.verify(&request_id, trust_base) {
            InclusionProofStatus::Ok => {}
            status => {
                return Err(VerificationError::ProofNotInTree(format!(
                    "{}: request {request_id}: {status:?}",
                    step.label
                )))
            }
        }
    }
    debug!(stage = %VerificationStage::ProofNotInTree, "stage passed");
    Ok(())
}

fn check_linkage(steps: &[Step<'_>]) -> Result<(), VerificationError> {
    let Some(genesis) = steps.first() else {
        return Ok(());
    };
    for step in steps {
        let fail = |reason: String| VerificationError::ChainBroken(format!("{}: {reason}", step.label));

        if let Some((data, source_state)) = step.transfer {
            let actual = source_state.hash().map_err(|e| fail(e.to_string()))?;
            if actual != data.source_state_hash {
                return Err(fail(format!(
                    "declares source state {} but spends {actual}",
                    data.source_state_hash
                )));
            }
            let signed = step.proof.authenticator.as_ref().map(|a| &a.state_hash);
            if signed != Some(&data.source_state_hash) {
                return Err(fail("authenticator signs a different source state".into()));
            }
            if step.token_id != genesis.token_id || step.token_type != genesis.token_type {
                return Err(fail("transfers a different token".into()));
            }
        }

        let Some(registered) = &step.proof.transaction_hash else {
            continue;
        };
        let recomputed = (step.hash_data)(registered.algorithm()).map_err(|e| fail(e.to_string()))?;
        if &recomputed != registered {
            return Err(fail(format!(
                "transaction data hashes to {recomputed}, registered {registered}"
            )));
        }
    }
    debug!(stage = %VerificationStage::ChainBroken, "stage passed");
    Ok(())
}

fn check_recipients(steps: &[Step<'_>], predicates: &[Predicate]) -> Result<(), VerificationError> {
    for (step, predicate) in steps.iter().zip(predicates) {
        let fail = |reason: &str| {
            VerificationError::RecipientMismatch(format!(
                "state produced by {}: {reason}",
                step.label
            ))
        };
        if !predicate.matches_address(step.recipient) {
            return Err(fail("predicate does not match the recipient address"));
        }
        let body = predicate.body();
        if body.token_id != step.token_id || body.token_type != step.token_type {
            return Err(fail("predicate is bound to a different token"));
        }
        if !predicate.nonce_matches_salt(step.salt) {
            return Err(fail("predicate nonce is not bound to the transaction salt"));
        }
    }
    debug!(stage = %VerificationStage::RecipientMismatch, "stage passed");
    Ok(())
}

fn check_data_commitments(steps: &[Step<'_>]) -> Result<(), VerificationError> {
    for step in steps {
        let data = step.produced.data.as_deref();
        let fail = |reason: String| {
            VerificationError::StateDataTampered(format!(
                "state produced by {}: {reason}",
                step.label
            ))
        };
        match (step.recipient_data_hash, data) {
            (Some(expected), Some(data)) => {
                let actual = DataHash::compute(expected.algorithm(), data);
                if &actual != expected {
                    return Err(fail(format!(
                        "data hashes to {actual}, transaction committed to {expected}"
                    )));
                }
            }
            (Some(expected), None) => {
                return Err(fail(format!(
                    "data is missing, transaction committed to {expected}"
                )));
            }
            (None, Some(_)) => {
                return Err(fail("data present but transaction committed to none".into()));
            }
            (None, None) => {}
        }
    }
    debug!(stage = %VerificationStage::StateDataTampered, "stage passed");
    Ok(())
}
