//! In-process registry with the aggregator contract.
//!
//! Submissions are checked, then inserted under one lock: the first writer
//! of a request id wins and every later writer is told the id exists.
//! Registered leaves enter the sparse Merkle tree when a round closes, and
//! the root validators certify the new root. Until then the proof is not
//! available.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, info};

use otx_crypto::ed25519::SigningKey;
use otx_crypto::DataHash;
use otx_smt::SparseMerkleTree;
use otx_token::{Authenticator, InclusionProof, RequestId, RootCertificate, TrustBase};

use crate::rpc::{
    GetInclusionProofParams, RpcError, RpcResponse, SubmitCommitmentParams,
    SubmitCommitmentResult, METHOD_GET_INCLUSION_PROOF, METHOD_SUBMIT_COMMITMENT,
};
use crate::{AggregatorClient, AggregatorError, Result, SubmitCommitmentStatus};

/// Default network id of in-memory registries.
pub const DEFAULT_NETWORK_ID: u16 = 3;

/// When registered commitments become provable.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RoundMode {
    /// Every successful submission closes a round.
    Auto,
    /// Rounds close only on [`InMemoryAggregator::close_round`].
    Manual,
}

struct Record {
    transaction_hash: DataHash,
    authenticator: Authenticator,
}

#[derive(Default)]
struct Registry {
    records: HashMap<RequestId, Record>,
    pending: Vec<RequestId>,
    tree: SparseMerkleTree,
    round: u64,
    certificate: Option<RootCertificate>,
}

/// Single-process registry.
pub struct InMemoryAggregator {
    network_id: u16,
    validators: Vec<SigningKey>,
    mode: RoundMode,
    registry: Mutex<Registry>,
}

impl Default for InMemoryAggregator {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryAggregator {
    /// One validator, rounds close on every submission.
    pub fn new() -> Self {
        Self::with_validators(1, RoundMode::Auto)
    }

    /// `validators` root validators (at least one).
    pub fn with_validators(validators: usize, mode: RoundMode) -> Self {
        Self {
            network_id: DEFAULT_NETWORK_ID,
            validators: (0..validators.max(1)).map(|_| SigningKey::generate()).collect(),
            mode,
            registry: Mutex::new(Registry::default()),
        }
    }

    /// Trust base accepting this registry's certificates.
    ///
    /// The quorum is a two-thirds majority of the validators.
    pub fn trust_base(&self) -> TrustBase {
        TrustBase {
            network_id: self.network_id,
            epoch: 0,
            root_validators: self
                .validators
                .iter()
                .map(SigningKey::public_key_bytes)
                .collect(),
            quorum_threshold: self.validators.len() * 2 / 3 + 1,
        }
    }

    /// Move pending registrations into the tree and certify the new root.
    ///
    /// Returns the number of leaves added.
    pub async fn close_round(&self) -> usize {
        let mut registry = self.registry.lock().await;
        self.close_round_locked(&mut registry)
    }

    fn close_round_locked(&self, registry: &mut Registry) -> usize {
        let pending = std::mem::take(&mut registry.pending);
        let mut added = 0;
        for request_id in pending {
            let Some(record) = registry.records.get(&request_id) else {
                continue;
            };
            let Ok(leaf) = record.authenticator.leaf_value(&record.transaction_hash) else {
                continue;
            };
            if registry
                .tree
                .insert(*request_id.key(), leaf.imprint().to_vec())
                .is_ok()
            {
                added += 1;
            }
        }
        registry.round += 1;
        let certificate = RootCertificate::sign(
            self.network_id,
            registry.round,
            registry.tree.root(),
            &self.validators,
        );
        info!(round = registry.round, leaves = registry.tree.len(), added, "round closed");
        registry.certificate = Some(certificate);
        added
    }

    /// Number of registered request ids, certified or not.
    pub async fn len(&self) -> usize {
        self.registry.lock().await.records.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Serve one JSON-RPC request body and return the response body.
    pub async fn handle_request(&self, body: &str) -> String {
        let value: serde_json::Value = match serde_json::from_str(body) {
            Ok(value) => value,
            Err(_) => return error_response(serde_json::Value::Null, RpcError::parse_error()),
        };
        let id = value.get("id").cloned().unwrap_or(serde_json::Value::Null);
        let method = value
            .get("method")
            .and_then(|m| m.as_str())
            .unwrap_or_default()
            .to_string();

        match method.as_str() {
            METHOD_SUBMIT_COMMITMENT => {
                let params: SubmitCommitmentParams = match parse_params(value) {
                    Ok(p) => p,
                    Err(e) => return error_response(id, e),
                };
                match self
                    .submit_commitment(&params.request_id, &params.transaction_hash, &params.authenticator)
                    .await
                {
                    Ok(status) => success_response(id, SubmitCommitmentResult { status }),
                    Err(e) => error_response(id, to_rpc_error(&e)),
                }
            }
            METHOD_GET_INCLUSION_PROOF => {
                let params: GetInclusionProofParams = match parse_params(value) {
                    Ok(p) => p,
                    Err(e) => return error_response(id, e),
                };
                match self.get_inclusion_proof(&params.request_id).await {
                    Ok(proof) => success_response(id, proof),
                    Err(e) => error_response(id, to_rpc_error(&e)),
                }
            }
            other => error_response(id, RpcError::method_not_found(other)),
        }
    }
}

fn parse_params<P: serde::de::DeserializeOwned>(
    value: serde_json::Value,
) -> std::result::Result<P, RpcError> {
    let params = value.get("params").cloned().unwrap_or_default();
    serde_json::from_value(params).map_err(|e| RpcError::invalid_params(&e.to_string()))
}

fn to_rpc_error(e: &AggregatorError) -> RpcError {
    match e {
        AggregatorError::NotFound(request_id) => RpcError::not_found(request_id),
        other => RpcError {
            code: -32603,
            message: other.to_string(),
            data: None,
        },
    }
}

fn success_response<R: serde::Serialize>(id: serde_json::Value, result: R) -> String {
    let response = RpcResponse {
        jsonrpc: "2.0".to_string(),
        id,
        result: Some(result),
        error: None,
    };
    serde_json::to_string(&response).unwrap_or_default()
}

fn error_response(id: serde_json::Value, error: RpcError) -> String {
    let response: RpcResponse<()> = RpcResponse {
        jsonrpc: "2.0".to_string(),
        id,
        result: None,
        error: Some(error),
    };
    serde_json::to_string(&response).unwrap_or_default()
}

#[async_trait]
impl AggregatorClient for InMemoryAggregator {
    async fn submit_commitment(
        &self,
        request_id: &RequestId,
        transaction_hash: &DataHash,
        authenticator: &Authenticator,
    ) -> Result<SubmitCommitmentStatus> {
        if &authenticator.request_id() != request_id {
            return Ok(SubmitCommitmentStatus::RequestIdMismatch);
        }
        if !authenticator.verify(transaction_hash) {
            return Ok(SubmitCommitmentStatus::AuthenticatorVerificationFailed);
        }

        let mut registry = self.registry.lock().await;
        if registry.records.contains_key(request_id) {
            debug!(request_id = %request_id, "request id already registered");
            return Ok(SubmitCommitmentStatus::RequestIdExists);
        }
        registry.records.insert(
            *request_id,
            Record {
                transaction_hash: *transaction_hash,
                authenticator: authenticator.clone(),
            },
        );
        registry.pending.push(*request_id);
        debug!(request_id = %request_id, "request id registered");
        if self.mode == RoundMode::Auto {
            self.close_round_locked(&mut registry);
        }
        Ok(SubmitCommitmentStatus::Success)
    }

    async fn get_inclusion_proof(&self, request_id: &RequestId) -> Result<InclusionProof> {
        let registry = self.registry.lock().await;
        let (Some(record), Some(certificate)) =
            (registry.records.get(request_id), &registry.certificate)
        else {
            return Err(AggregatorError::NotFound(*request_id));
        };
        if !registry.tree.contains(request_id.key()) {
            return Err(AggregatorError::NotFound(*request_id));
        }
        let merkle_path = registry
            .tree
            .inclusion_path(request_id.key())
            .map_err(|e| AggregatorError::InvalidResponse(e.to_string()))?;
        Ok(InclusionProof {
            merkle_path,
            certificate: certificate.clone(),
            authenticator: Some(record.authenticator.clone()),
            transaction_hash: Some(record.transaction_hash),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use otx_crypto::HashAlgorithm;
    use otx_token::InclusionProofStatus;
    use std::sync::Arc;

    fn signed(key: &SigningKey, tx: &[u8]) -> (RequestId, DataHash, Authenticator) {
        let tx = DataHash::compute(HashAlgorithm::Sha256, tx);
        let state = DataHash::compute(HashAlgorithm::Sha256, b"state");
        let auth = Authenticator::create(key, &tx, &state);
        (auth.request_id(), tx, auth)
    }

    #[tokio::test]
    async fn test_first_writer_wins() {
        let aggregator = InMemoryAggregator::new();
        let key = SigningKey::generate();
        let (id, tx_a, auth_a) = signed(&key, b"to bob");
        let (id_b, tx_b, auth_b) = signed(&key, b"to carol");
        assert_eq!(id, id_b);

        assert_eq!(
            aggregator.submit_commitment(&id, &tx_a, &auth_a).await.expect("submit"),
            SubmitCommitmentStatus::Success
        );
        assert_eq!(
            aggregator.submit_commitment(&id, &tx_b, &auth_b).await.expect("submit"),
            SubmitCommitmentStatus::RequestIdExists
        );
        let proof = aggregator.get_inclusion_proof(&id).await.expect("proof");
        assert_eq!(proof.transaction_hash, Some(tx_a));
        assert_eq!(aggregator.len().await, 1);
    }

    #[tokio::test]
    async fn test_rejects_bad_submissions() {
        let aggregator = InMemoryAggregator::new();
        let key = SigningKey::generate();
        let (id, tx, auth) = signed(&key, b"tx");
        let (other_id, _, _) = signed(&SigningKey::generate(), b"tx");

        assert_eq!(
            aggregator.submit_commitment(&other_id, &tx, &auth).await.expect("submit"),
            SubmitCommitmentStatus::RequestIdMismatch
        );
        let wrong_tx = DataHash::compute(HashAlgorithm::Sha256, b"other");
        assert_eq!(
            aggregator.submit_commitment(&id, &wrong_tx, &auth).await.expect("submit"),
            SubmitCommitmentStatus::AuthenticatorVerificationFailed
        );
        assert!(aggregator.is_empty().await);
    }

    #[tokio::test]
    async fn test_manual_rounds_delay_proofs() {
        let aggregator = InMemoryAggregator::with_validators(3, RoundMode::Manual);
        let (id, tx, auth) = signed(&SigningKey::generate(), b"tx");
        aggregator.submit_commitment(&id, &tx, &auth).await.expect("submit");
        assert!(matches!(
            aggregator.get_inclusion_proof(&id).await,
            Err(AggregatorError::NotFound(_))
        ));

        assert_eq!(aggregator.close_round().await, 1);
        let proof = aggregator.get_inclusion_proof(&id).await.expect("proof");
        assert_eq!(
            proof.verify(&id, &aggregator.trust_base()),
            InclusionProofStatus::Ok
        );
        assert_eq!(aggregator.trust_base().quorum_threshold, 3);
    }

    #[tokio::test]
    async fn test_old_proofs_stay_valid() {
        let aggregator = InMemoryAggregator::new();
        let (id, tx, auth) = signed(&SigningKey::generate(), b"first");
        aggregator.submit_commitment(&id, &tx, &auth).await.expect("submit");
        let early = aggregator.get_inclusion_proof(&id).await.expect("proof");

        for i in 0..5u8 {
            let (id, tx, auth) = signed(&SigningKey::generate(), &[i]);
            aggregator.submit_commitment(&id, &tx, &auth).await.expect("submit");
        }
        let late = aggregator.get_inclusion_proof(&id).await.expect("proof");
        assert_ne!(early.merkle_path.root, late.merkle_path.root);
        let trust_base = aggregator.trust_base();
        assert_eq!(early.verify(&id, &trust_base), InclusionProofStatus::Ok);
        assert_eq!(late.verify(&id, &trust_base), InclusionProofStatus::Ok);
    }

    #[tokio::test]
    async fn test_concurrent_submissions_single_winner() {
        let aggregator = Arc::new(InMemoryAggregator::new());
        let key = SigningKey::generate();
        let mut handles = Vec::new();
        for i in 0..16u8 {
            let aggregator = aggregator.clone();
            let (id, tx, auth) = signed(&key, &[i]);
            handles.push(tokio::spawn(async move {
                aggregator.submit_commitment(&id, &tx, &auth).await.expect("submit")
            }));
        }
        let mut successes = 0;
        for handle in handles {
            if handle.await.expect("join") == SubmitCommitmentStatus::Success {
                successes += 1;
            }
        }
        assert_eq!(successes, 1);
    }

    #[tokio::test]
    async fn test_rpc_dispatch_errors() {
        let aggregator = InMemoryAggregator::new();
        let reply: serde_json::Value =
            serde_json::from_str(&aggregator.handle_request("not json").await).expect("json");
        assert_eq!(reply["error"]["code"], -32700);

        let reply: serde_json::Value = serde_json::from_str(
            &aggregator
                .handle_request(r#"{"jsonrpc":"2.0","id":4,"method":"burn","params":{}}"#)
                .await,
        )
        .expect("json");
        assert_eq!(reply["id"], 4);
        assert_eq!(reply["error"]["code"], -32601);

        let reply: serde_json::Value = serde_json::from_str(
            &aggregator
                .handle_request(r#"{"jsonrpc":"2.0","id":5,"method":"get_inclusion_proof","params":{}}"#)
                .await,
        )
        .expect("json");
        assert_eq!(reply["error"]["code"], -32602);
    }
}
