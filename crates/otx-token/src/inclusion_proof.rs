//! Registry inclusion proofs.
//!
//! An inclusion proof shows that a request id was registered with a given
//! authenticator and transaction hash. It pairs a sparse Merkle path from
//! the registry leaf to a root with a certificate in which the root
//! validators sign that root. The trust base decides which validators count.

use serde::{Deserialize, Serialize};
use serde_with::{hex::Hex, serde_as, Bytes, IfIsHumanReadable};

use otx_crypto::blake3::{self, contexts};
use otx_crypto::ed25519::{self, SigningKey};
use otx_crypto::DataHash;
use otx_smt::MerkleTreePath;

use crate::authenticator::Authenticator;
use crate::request_id::RequestId;
use crate::trust_base::TrustBase;

/// One validator's signature over a root.
#[serde_as]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidatorSignature {
    #[serde_as(as = "IfIsHumanReadable<Hex, Bytes>")]
    pub public_key: [u8; 32],
    #[serde_as(as = "IfIsHumanReadable<Hex, Bytes>")]
    pub signature: [u8; 64],
}

/// Root validators' attestation of a registry root for one round.
#[serde_as]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RootCertificate {
    pub network_id: u16,
    pub round: u64,
    #[serde_as(as = "IfIsHumanReadable<Hex, Bytes>")]
    pub root: [u8; 32],
    pub signatures: Vec<ValidatorSignature>,
}

impl RootCertificate {
    fn signing_message(network_id: u16, round: u64, root: &[u8; 32]) -> Vec<u8> {
        blake3::encode_multi_field(&[
            contexts::ROOT_CERTIFICATE.as_bytes(),
            &network_id.to_be_bytes(),
            &round.to_be_bytes(),
            root,
        ])
    }

    pub fn sign(network_id: u16, round: u64, root: [u8; 32], validators: &[SigningKey]) -> Self {
        let message = Self::signing_message(network_id, round, &root);
        let signatures = validators
            .iter()
            .map(|key| ValidatorSignature {
                public_key: key.public_key_bytes(),
                signature: key.sign(&message),
            })
            .collect();
        Self {
            network_id,
            round,
            root,
            signatures,
        }
    }

    /// Public keys whose signature over this certificate verifies.
    pub fn valid_signers(&self) -> impl Iterator<Item = [u8; 32]> + '_ {
        let message = Self::signing_message(self.network_id, self.round, &self.root);
        self.signatures.iter().filter_map(move |s| {
            ed25519::verify(&s.public_key, &message, &s.signature)
                .ok()
                .map(|()| s.public_key)
        })
    }
}

/// Proof that a request id is registered.
///
/// `authenticator` and `transaction_hash` are optional on the wire so that a
/// malformed proof can be rejected explicitly rather than failing to parse.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InclusionProof {
    pub merkle_path: MerkleTreePath,
    pub certificate: RootCertificate,
    #[serde(default)]
    pub authenticator: Option<Authenticator>,
    #[serde(default)]
    pub transaction_hash: Option<DataHash>,
}

/// Outcome of [`InclusionProof::verify`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InclusionProofStatus {
    Ok,
    /// Missing or invalid authenticator, request id mismatch, or an
    /// untrusted root.
    NotAuthenticated,
    /// The bitmap and siblings are inconsistent.
    PathInvalid,
    /// The path does not lead from this leaf to the certified root.
    PathNotIncluded,
}

impl InclusionProof {
    /// Check this proof for `request_id` against `trust_base`.
    pub fn verify(&self, request_id: &RequestId, trust_base: &TrustBase) -> InclusionProofStatus {
        let (Some(authenticator), Some(transaction_hash)) =
            (&self.authenticator, &self.transaction_hash)
        else {
            return InclusionProofStatus::NotAuthenticated;
        };
        if &authenticator.request_id() != request_id || !authenticator.verify(transaction_hash) {
            return InclusionProofStatus::NotAuthenticated;
        }
        if self.certificate.root != self.merkle_path.root || !trust_base.is_trusted(&self.certificate)
        {
            return InclusionProofStatus::NotAuthenticated;
        }
        let Ok(leaf_value) = authenticator.leaf_value(transaction_hash) else {
            return InclusionProofStatus::NotAuthenticated;
        };
        let result = self
            .merkle_path
            .verify(request_id.key(), &leaf_value.imprint());
        if !result.path_valid {
            InclusionProofStatus::PathInvalid
        } else if !result.included {
            InclusionProofStatus::PathNotIncluded
        } else {
            InclusionProofStatus::Ok
        }
    }
}
