//! Algorithm-tagged content hashes.
//!
//! Every hash that leaves this crate is a [`DataHash`]: a 32-byte digest
//! together with the algorithm that produced it. The serialized form is the
//! *imprint* `BE16(algorithm tag) || digest`, so proofs and artifacts stay
//! self-describing.

use std::fmt;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::Digest;

use crate::{CryptoError, Result};

/// Length of a digest in bytes.
pub const DIGEST_LEN: usize = 32;

/// Length of an imprint (`tag || digest`) in bytes.
pub const IMPRINT_LEN: usize = 2 + DIGEST_LEN;

/// Supported hash algorithms and their stable wire tags.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HashAlgorithm {
    #[default]
    Sha256,
    Blake3,
}

impl HashAlgorithm {
    /// The wire tag of this algorithm.
    pub const fn tag(self) -> u16 {
        match self {
            HashAlgorithm::Sha256 => 0x0000,
            HashAlgorithm::Blake3 => 0x0001,
        }
    }

    /// Resolve a wire tag.
    pub fn from_tag(tag: u16) -> Result<Self> {
        match tag {
            0x0000 => Ok(HashAlgorithm::Sha256),
            0x0001 => Ok(HashAlgorithm::Blake3),
            other => Err(CryptoError::UnknownHashAlgorithm(other)),
        }
    }
}

/// A digest tagged with the algorithm that produced it.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DataHash {
    algorithm: HashAlgorithm,
    digest: [u8; DIGEST_LEN],
}

impl DataHash {
    /// Wrap an existing digest.
    pub const fn new(algorithm: HashAlgorithm, digest: [u8; DIGEST_LEN]) -> Self {
        Self { algorithm, digest }
    }

    /// Hash `data` in one shot.
    pub fn compute(algorithm: HashAlgorithm, data: &[u8]) -> Self {
        let mut hasher = DataHasher::new(algorithm);
        hasher.update(data);
        hasher.finalize()
    }

    pub fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }

    pub fn digest(&self) -> &[u8; DIGEST_LEN] {
        &self.digest
    }

    /// `BE16(tag) || digest`.
    pub fn imprint(&self) -> [u8; IMPRINT_LEN] {
        let mut out = [0u8; IMPRINT_LEN];
        out[..2].copy_from_slice(&self.algorithm.tag().to_be_bytes());
        out[2..].copy_from_slice(&self.digest);
        out
    }

    /// Parse an imprint.
    ///
    /// # Errors
    ///
    /// - [`CryptoError::InvalidImprintLength`] if `bytes` is not 34 bytes long
    /// - [`CryptoError::UnknownHashAlgorithm`] if the tag is not registered
    pub fn from_imprint(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != IMPRINT_LEN {
            return Err(CryptoError::InvalidImprintLength {
                expected: IMPRINT_LEN,
                actual: bytes.len(),
            });
        }
        let algorithm = HashAlgorithm::from_tag(u16::from_be_bytes([bytes[0], bytes[1]]))?;
        let mut digest = [0u8; DIGEST_LEN];
        digest.copy_from_slice(&bytes[2..]);
        Ok(Self { algorithm, digest })
    }

    /// Lowercase hex of the imprint.
    pub fn to_hex(&self) -> String {
        hex::encode(self.imprint())
    }

    /// Parse the lowercase or uppercase hex of an imprint.
    pub fn from_hex(s: &str) -> Result<Self> {
        let bytes = hex::decode(s).map_err(|e| CryptoError::InvalidInput(e.to_string()))?;
        Self::from_imprint(&bytes)
    }
}

impl fmt::Debug for DataHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DataHash({})", self.to_hex())
    }
}

impl fmt::Display for DataHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl Serialize for DataHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        if serializer.is_human_readable() {
            serializer.serialize_str(&self.to_hex())
        } else {
            serializer.serialize_bytes(&self.imprint())
        }
    }
}

struct DataHashVisitor;

impl<'de> Visitor<'de> for DataHashVisitor {
    type Value = DataHash;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a 34-byte hash imprint")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> std::result::Result<DataHash, E> {
        DataHash::from_hex(v).map_err(E::custom)
    }

    fn visit_bytes<E: de::Error>(self, v: &[u8]) -> std::result::Result<DataHash, E> {
        DataHash::from_imprint(v).map_err(E::custom)
    }

    fn visit_byte_buf<E: de::Error>(self, v: Vec<u8>) -> std::result::Result<DataHash, E> {
        self.visit_bytes(&v)
    }
}

impl<'de> Deserialize<'de> for DataHash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        if deserializer.is_human_readable() {
            deserializer.deserialize_str(DataHashVisitor)
        } else {
            deserializer.deserialize_bytes(DataHashVisitor)
        }
    }
}

/// Streaming hasher producing a [`DataHash`].
pub struct DataHasher {
    inner: HasherInner,
}

enum HasherInner {
    Sha256(sha2::Sha256),
    Blake3(Box<::blake3::Hasher>),
}

impl DataHasher {
    pub fn new(algorithm: HashAlgorithm) -> Self {
        let inner = match algorithm {
            HashAlgorithm::Sha256 => HasherInner::Sha256(sha2::Sha256::new()),
            HashAlgorithm::Blake3 => HasherInner::Blake3(Box::new(::blake3::Hasher::new())),
        };
        Self { inner }
    }

    pub fn update(&mut self, data: &[u8]) -> &mut Self {
        match &mut self.inner {
            HasherInner::Sha256(h) => h.update(data),
            HasherInner::Blake3(h) => {
                h.update(data);
            }
        }
        self
    }

    pub fn finalize(self) -> DataHash {
        match self.inner {
            HasherInner::Sha256(h) => DataHash::new(HashAlgorithm::Sha256, h.finalize().into()),
            HasherInner::Blake3(h) => DataHash::new(HashAlgorithm::Blake3, *h.finalize().as_bytes()),
        }
    }
}

/// Commitment to the payload a recipient will hold.
///
/// `None` data means "no commitment" and yields `None`; any present payload,
/// including an empty one, is hashed with SHA-256.
pub fn compute_recipient_data_hash(state_data: Option<&[u8]>) -> Option<DataHash> {
    state_data.map(|data| DataHash::compute(HashAlgorithm::Sha256, data))
}
