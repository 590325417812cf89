//! Registry keys.

use std::fmt;

use serde::{Deserialize, Serialize};

use otx_crypto::{DataHash, DataHasher, HashAlgorithm};

/// Key of a spend attempt in the registry: `SHA-256(public_key ‖ state_hash)`.
///
/// The same signer spending the same state always produces the same id, so
/// two different transfers of one state collide on it.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(DataHash);

impl RequestId {
    pub fn create(public_key: &[u8; 32], state_hash: &DataHash) -> Self {
        let mut hasher = DataHasher::new(HashAlgorithm::Sha256);
        hasher.update(public_key).update(&state_hash.imprint());
        Self(hasher.finalize())
    }

    pub fn from_hash(hash: DataHash) -> Self {
        Self(hash)
    }

    pub fn hash(&self) -> &DataHash {
        &self.0
    }

    /// Sparse Merkle tree key.
    pub fn key(&self) -> &[u8; 32] {
        self.0.digest()
    }

    pub fn to_hex(&self) -> String {
        self.0.to_hex()
    }

    pub fn from_hex(s: &str) -> otx_crypto::Result<Self> {
        DataHash::from_hex(s).map(Self)
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RequestId({})", self.to_hex())
    }
}
