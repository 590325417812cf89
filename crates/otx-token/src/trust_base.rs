//! Root-of-trust configuration.

use std::collections::BTreeSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_with::{hex::Hex, serde_as};

use crate::inclusion_proof::RootCertificate;
use crate::{Result, TokenError};

/// Validator set whose signatures make a registry root trusted.
///
/// Loaded once at startup and passed by reference into verification.
#[serde_as]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrustBase {
    pub network_id: u16,
    pub epoch: u64,
    #[serde_as(as = "Vec<Hex>")]
    pub root_validators: Vec<[u8; 32]>,
    pub quorum_threshold: usize,
}

impl TrustBase {
    pub fn new(
        network_id: u16,
        epoch: u64,
        root_validators: Vec<[u8; 32]>,
        quorum_threshold: usize,
    ) -> Result<Self> {
        let trust_base = Self {
            network_id,
            epoch,
            root_validators,
            quorum_threshold,
        };
        trust_base.validate()?;
        Ok(trust_base)
    }

    pub fn validate(&self) -> Result<()> {
        if self.quorum_threshold == 0 {
            return Err(TokenError::InvalidTrustBase(
                "quorum threshold must be at least 1".into(),
            ));
        }
        let distinct: BTreeSet<_> = self.root_validators.iter().collect();
        if distinct.len() != self.root_validators.len() {
            return Err(TokenError::InvalidTrustBase(
                "duplicate root validator".into(),
            ));
        }
        if self.quorum_threshold > distinct.len() {
            return Err(TokenError::InvalidTrustBase(format!(
                "quorum threshold {} exceeds {} validators",
                self.quorum_threshold,
                distinct.len()
            )));
        }
        Ok(())
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let trust_base: Self = serde_json::from_str(json)?;
        trust_base.validate()?;
        Ok(trust_base)
    }

    pub fn load(path: &Path) -> Result<Self> {
        Self::from_json(&std::fs::read_to_string(path)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// A certificate is trusted when it is for this network and at least
    /// `quorum_threshold` distinct listed validators signed it.
    pub fn is_trusted(&self, certificate: &RootCertificate) -> bool {
        if certificate.network_id != self.network_id {
            return false;
        }
        let signers: BTreeSet<[u8; 32]> = certificate
            .valid_signers()
            .filter(|key| self.root_validators.contains(key))
            .collect();
        signers.len() >= self.quorum_threshold
    }
}
