//! The transfer file.
//!
//! A token travels as a JSON document holding its whole history. A sender
//! may attach an `offlineTransfer` section describing a transfer of the
//! current state that the recipient still has to complete; once the
//! recipient applies it, the section is dropped.

use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_with::{hex::Hex, serde_as};

use crate::address::Address;
use crate::commitment::Commitment;
use crate::inclusion_proof::InclusionProof;
use crate::token::{Token, TOKEN_VERSION};
use crate::transaction::TransferTransactionData;
use crate::{Result, TokenError};

/// Progress of an offline transfer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransferStatus {
    /// Created by the sender, not yet applied by the recipient.
    Pending,
    /// Registered; the recipient can apply it without further network calls.
    Confirmed,
}

/// A transfer of the token's current state, waiting for the recipient.
#[serde_as]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfflineTransfer {
    pub commitment: Commitment<TransferTransactionData>,
    pub recipient_address: Address,
    pub status: TransferStatus,
    /// Plaintext note for the recipient. Not committed to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inclusion_proof: Option<InclusionProof>,
    /// Data for the recipient's state, when the sender chose to include it.
    #[serde_as(as = "Option<Hex>")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recipient_data: Option<Vec<u8>>,
}

/// JSON transfer artifact.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenFile {
    #[serde(flatten)]
    pub token: Token,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offline_transfer: Option<OfflineTransfer>,
}

impl TokenFile {
    pub fn new(token: Token) -> Self {
        Self {
            token,
            offline_transfer: None,
        }
    }

    pub fn with_offline_transfer(token: Token, transfer: OfflineTransfer) -> Self {
        Self {
            token,
            offline_transfer: Some(transfer),
        }
    }

    /// Check the fields a usable artifact must carry.
    ///
    /// This does not verify the token; see [`crate::verify::verify`].
    pub fn validate_structure(&self) -> Result<()> {
        let token = &self.token;
        if token.version != TOKEN_VERSION {
            return Err(TokenError::InvalidArtifact(format!(
                "unsupported version {:?}",
                token.version
            )));
        }
        if token.state.predicate.is_empty() {
            return Err(TokenError::InvalidArtifact("state.predicate is empty".into()));
        }
        if token.state.data.is_none() && token.latest_recipient_data_hash().is_some() {
            return Err(TokenError::InvalidArtifact(
                "state.data is required by the latest recipient data hash".into(),
            ));
        }
        Ok(())
    }

    /// Check that the offline transfer section, if any, spends this token's
    /// current state.
    ///
    /// Run after [`crate::verify::verify`]; a tampered state also fails here.
    pub fn validate_offline_transfer(&self) -> Result<()> {
        let token = &self.token;
        if let Some(transfer) = &self.offline_transfer {
            let data = &transfer.commitment.transaction_data;
            if data.recipient != transfer.recipient_address {
                return Err(TokenError::InvalidArtifact(
                    "offlineTransfer.recipientAddress does not match the commitment".into(),
                ));
            }
            if data.token_id != token.id() {
                return Err(TokenError::InvalidArtifact(
                    "offlineTransfer is for a different token".into(),
                ));
            }
            if data.source_state_hash != token.state_hash()? {
                return Err(TokenError::InvalidArtifact(
                    "offlineTransfer does not spend the current state".into(),
                ));
            }
        }
        Ok(())
    }

    /// Parse and structurally validate an artifact.
    pub fn from_json(json: &str) -> Result<Self> {
        let file: Self = serde_json::from_str(json)?;
        file.validate_structure()?;
        Ok(file)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        Self::from_json(&std::fs::read_to_string(path)?)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commitment::create_transfer_commitment;
    use crate::testing::{minted_token, LocalRegistry};
    use otx_crypto::Secret;

    fn file_with_transfer() -> TokenFile {
        let mut registry = LocalRegistry::new();
        let alice = Secret::from("alice");
        let token = minted_token(&mut registry, &alice, None);
        let key = token
            .state
            .decode_predicate()
            .expect("predicate")
            .signing_key(&alice)
            .expect("key");
        let to = *token.latest_recipient();
        let commitment =
            create_transfer_commitment(&token, to, [1u8; 32], None, None, &key).expect("commit");
        TokenFile::with_offline_transfer(
            token,
            OfflineTransfer {
                commitment,
                recipient_address: to,
                status: TransferStatus::Pending,
                message: Some("for you".into()),
                inclusion_proof: None,
                recipient_data: None,
            },
        )
    }

    #[test]
    fn test_save_load() {
        let file = file_with_transfer();
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("token.json");
        file.save(&path).expect("save");
        assert_eq!(TokenFile::load(&path).expect("load"), file);
    }

    #[test]
    fn test_json_layout() {
        let json: serde_json::Value =
            serde_json::from_str(&file_with_transfer().to_json().expect("json")).expect("value");
        assert_eq!(json["version"], TOKEN_VERSION);
        assert!(json["genesis"]["data"].is_object());
        assert!(json["genesis"]["inclusionProof"].is_object());
        assert!(json["state"]["predicate"].is_string());
        assert_eq!(json["offlineTransfer"]["status"], "PENDING");
    }

    #[test]
    fn test_missing_required_field_fails() {
        let mut json: serde_json::Value =
            serde_json::from_str(&file_with_transfer().to_json().expect("json")).expect("value");
        json["genesis"]
            .as_object_mut()
            .expect("object")
            .remove("inclusionProof");
        assert!(matches!(
            TokenFile::from_json(&json.to_string()),
            Err(TokenError::Json(_))
        ));
    }

    #[test]
    fn test_structure_checks() {
        let mut file = file_with_transfer();
        file.token.version = "0.1".into();
        assert!(matches!(
            file.validate_structure(),
            Err(TokenError::InvalidArtifact(_))
        ));

        let mut file = file_with_transfer();
        file.token.state.predicate.clear();
        assert!(file.validate_structure().is_err());

        let mut file = file_with_transfer();
        file.token.state.data = Some(b"changed".to_vec());
        file.validate_structure().expect("fields are all present");
        assert!(
            file.validate_offline_transfer().is_err(),
            "pending transfer no longer spends the current state"
        );
    }

    #[test]
    fn test_committed_data_is_required() {
        let mut registry = LocalRegistry::new();
        let mut token = minted_token(&mut registry, &Secret::from("alice"), Some(b"d".to_vec()));
        TokenFile::new(token.clone())
            .validate_structure()
            .expect("valid");
        token.state.data = None;
        assert!(TokenFile::new(token).validate_structure().is_err());
    }
}
