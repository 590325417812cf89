//! Transition authorization signatures.

use serde::{Deserialize, Serialize};
use serde_with::{hex::Hex, serde_as, Bytes, IfIsHumanReadable};

use otx_crypto::blake3::{self, contexts};
use otx_crypto::ed25519::{self, SignatureAlgorithm, SigningKey};
use otx_crypto::{DataHash, DataHasher, HashAlgorithm};

use crate::request_id::RequestId;
use crate::{cbor, Result};

/// Signature by the source state's owner over `(transaction_hash, state_hash)`.
#[serde_as]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Authenticator {
    pub algorithm: SignatureAlgorithm,
    #[serde_as(as = "IfIsHumanReadable<Hex, Bytes>")]
    pub public_key: [u8; 32],
    #[serde_as(as = "IfIsHumanReadable<Hex, Bytes>")]
    pub signature: [u8; 64],
    pub state_hash: DataHash,
}

fn signing_message(transaction_hash: &DataHash, state_hash: &DataHash) -> Vec<u8> {
    blake3::encode_multi_field(&[
        contexts::AUTHENTICATOR.as_bytes(),
        &transaction_hash.imprint(),
        &state_hash.imprint(),
    ])
}

impl Authenticator {
    pub fn create(key: &SigningKey, transaction_hash: &DataHash, state_hash: &DataHash) -> Self {
        let signature = key.sign(&signing_message(transaction_hash, state_hash));
        Self {
            algorithm: SignatureAlgorithm::Ed25519,
            public_key: key.public_key_bytes(),
            signature,
            state_hash: *state_hash,
        }
    }

    /// Check the signature against `transaction_hash`.
    pub fn verify(&self, transaction_hash: &DataHash) -> bool {
        let message = signing_message(transaction_hash, &self.state_hash);
        match self.algorithm {
            SignatureAlgorithm::Ed25519 => {
                ed25519::verify(&self.public_key, &message, &self.signature).is_ok()
            }
        }
    }

    pub fn request_id(&self) -> RequestId {
        RequestId::create(&self.public_key, &self.state_hash)
    }

    /// Value stored in the registry leaf for this authenticator and transaction.
    pub fn leaf_value(&self, transaction_hash: &DataHash) -> Result<DataHash> {
        let encoded = cbor::to_vec_named(self, "Authenticator")?;
        let mut hasher = DataHasher::new(HashAlgorithm::Sha256);
        hasher.update(&encoded).update(&transaction_hash.imprint());
        Ok(hasher.finalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hashes() -> (DataHash, DataHash) {
        (
            DataHash::compute(HashAlgorithm::Sha256, b"tx"),
            DataHash::compute(HashAlgorithm::Sha256, b"state"),
        )
    }

    #[test]
    fn test_verifies_only_its_transaction() {
        let (tx, state) = hashes();
        let key = SigningKey::generate();
        let auth = Authenticator::create(&key, &tx, &state);
        assert!(auth.verify(&tx));
        assert!(!auth.verify(&DataHash::compute(HashAlgorithm::Sha256, b"other tx")));
    }

    #[test]
    fn test_tampered_state_hash_fails() {
        let (tx, state) = hashes();
        let mut auth = Authenticator::create(&SigningKey::generate(), &tx, &state);
        auth.state_hash = DataHash::compute(HashAlgorithm::Sha256, b"another state");
        assert!(!auth.verify(&tx));
    }

    #[test]
    fn test_request_id_matches_signer_and_state() {
        let (tx, state) = hashes();
        let key = SigningKey::generate();
        let auth = Authenticator::create(&key, &tx, &state);
        assert_eq!(
            auth.request_id(),
            RequestId::create(&key.public_key_bytes(), &state)
        );
    }

    #[test]
    fn test_leaf_value_binds_transaction() {
        let (tx, state) = hashes();
        let auth = Authenticator::create(&SigningKey::generate(), &tx, &state);
        let other = DataHash::compute(HashAlgorithm::Sha256, b"tx2");
        assert_ne!(
            auth.leaf_value(&tx).expect("leaf"),
            auth.leaf_value(&other).expect("leaf")
        );
    }
}
