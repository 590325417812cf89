//! `DIRECT://` addresses.
//!
//! An address commits to a predicate reference: `DIRECT://` followed by the
//! hex imprint of the reference and a 4-byte hex checksum.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use otx_crypto::blake3::{self, contexts};
use otx_crypto::DataHash;

use crate::TokenError;

/// Address scheme prefix.
pub const SCHEME: &str = "DIRECT://";

const CHECKSUM_LEN: usize = 4;

/// A payable address.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Address {
    reference: DataHash,
}

impl Address {
    pub fn new(reference: DataHash) -> Self {
        Self { reference }
    }

    /// The predicate reference this address commits to.
    pub fn reference(&self) -> &DataHash {
        &self.reference
    }

    fn checksum(reference: &DataHash) -> [u8; CHECKSUM_LEN] {
        let digest = blake3::derive_key(contexts::ADDRESS_CHECKSUM, &reference.imprint());
        let mut out = [0u8; CHECKSUM_LEN];
        out.copy_from_slice(&digest[..CHECKSUM_LEN]);
        out
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{SCHEME}{}{}",
            hex::encode(self.reference.imprint()),
            hex::encode(Self::checksum(&self.reference))
        )
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({self})")
    }
}

impl FromStr for Address {
    type Err = TokenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let body = s
            .strip_prefix(SCHEME)
            .ok_or_else(|| TokenError::InvalidAddress(format!("missing {SCHEME} prefix")))?;
        let bytes = hex::decode(body)
            .map_err(|e| TokenError::InvalidAddress(format!("invalid hex: {e}")))?;
        if bytes.len() <= CHECKSUM_LEN {
            return Err(TokenError::InvalidAddress(format!(
                "address body too short: {} bytes",
                bytes.len()
            )));
        }
        let (imprint, checksum) = bytes.split_at(bytes.len() - CHECKSUM_LEN);
        let reference = DataHash::from_imprint(imprint)
            .map_err(|e| TokenError::InvalidAddress(e.to_string()))?;
        if checksum != Self::checksum(&reference) {
            return Err(TokenError::InvalidAddress("checksum mismatch".into()));
        }
        Ok(Self { reference })
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use otx_crypto::HashAlgorithm;

    fn sample() -> Address {
        Address::new(DataHash::compute(HashAlgorithm::Sha256, b"reference"))
    }

    #[test]
    fn test_display_parse() {
        let address = sample();
        let text = address.to_string();
        assert!(text.starts_with(SCHEME));
        assert_eq!(text.parse::<Address>().expect("parse"), address);
    }

    #[test]
    fn test_checksum_detects_typo() {
        let mut text = sample().to_string();
        let last = text.pop().expect("non-empty");
        text.push(if last == '0' { '1' } else { '0' });
        assert!(matches!(
            text.parse::<Address>(),
            Err(TokenError::InvalidAddress(_))
        ));
    }

    #[test]
    fn test_rejects_bad_prefix_and_hex() {
        assert!("PROXY://00".parse::<Address>().is_err());
        assert!("DIRECT://zz".parse::<Address>().is_err());
        assert!("DIRECT://0000".parse::<Address>().is_err());
    }

    #[test]
    fn test_json_is_string() {
        let address = sample();
        let json = serde_json::to_string(&address).expect("serialize");
        assert_eq!(json, format!("\"{address}\""));
        let back: Address = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, address);
    }
}
