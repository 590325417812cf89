//! Token state.

use serde::{Deserialize, Serialize};
use serde_with::{hex::Hex, serde_as, Bytes, IfIsHumanReadable};

use otx_crypto::{DataHash, HashAlgorithm};

use crate::predicate::Predicate;
use crate::{cbor, Result};

/// Algorithm of every state hash. Source state hashes under any other
/// algorithm are rejected.
pub const STATE_HASH_ALGORITHM: HashAlgorithm = HashAlgorithm::Sha256;

/// Current holder and payload of a token.
///
/// The predicate is kept as its encoded bytes so that the state hash covers
/// exactly what was transmitted. Decode it with [`TokenState::decode_predicate`].
#[serde_as]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenState {
    #[serde_as(as = "IfIsHumanReadable<Hex, Bytes>")]
    pub predicate: Vec<u8>,
    #[serde_as(as = "Option<IfIsHumanReadable<Hex, Bytes>>")]
    pub data: Option<Vec<u8>>,
}

impl TokenState {
    pub fn new(predicate: &Predicate, data: Option<Vec<u8>>) -> Result<Self> {
        Ok(Self {
            predicate: predicate.encode()?,
            data,
        })
    }

    pub fn decode_predicate(&self) -> Result<Predicate> {
        Predicate::decode(&self.predicate)
    }

    /// Hash of the CBOR encoding of this state, always under
    /// [`STATE_HASH_ALGORITHM`].
    ///
    /// A state has exactly one hash, so the same owner spending the same
    /// state always derives the same request id.
    pub fn hash(&self) -> Result<DataHash> {
        let bytes = cbor::to_vec_named(self, "TokenState")?;
        Ok(DataHash::compute(STATE_HASH_ALGORITHM, &bytes))
    }
}
