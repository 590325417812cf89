//! Mint and transfer transactions.
//!
//! Transaction data is the intent of a transition. Its content hash, over
//! the CBOR encoding of every field in declaration order prefixed by a kind
//! tag, is what the owner signs and what the registry records. Any field
//! change produces a different hash and invalidates the authenticator and
//! the inclusion proof that reference it.

use serde::{Deserialize, Serialize};
use serde_with::{hex::Hex, serde_as, Bytes, IfIsHumanReadable};

use otx_crypto::blake3::{self, contexts};
use otx_crypto::ed25519::SigningKey;
use otx_crypto::{DataHash, DataHasher, HashAlgorithm};

use crate::address::Address;
use crate::id::{TokenId, TokenType};
use crate::inclusion_proof::InclusionProof;
use crate::state::TokenState;
use crate::{cbor, Result, TokenError};

/// Common view over mint and transfer data.
pub trait TransactionData: Serialize {
    /// Kind tag mixed into the content hash.
    const KIND: u8;

    fn token_id(&self) -> TokenId;
    fn token_type(&self) -> TokenType;
    fn recipient(&self) -> &Address;
    fn salt(&self) -> &[u8; 32];
    fn recipient_data_hash(&self) -> Option<&DataHash>;

    /// Hash of the state this transaction spends.
    fn source_state_hash(&self) -> DataHash;

    /// Content hash of the transaction.
    fn hash(&self, algorithm: HashAlgorithm) -> Result<DataHash> {
        let bytes = cbor::to_vec_named(&(Self::KIND, self), "TransactionData")?;
        Ok(DataHash::compute(algorithm, &bytes))
    }
}

/// One fungible balance carried by a token.
#[serde_as]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoinBalance {
    #[serde_as(as = "IfIsHumanReadable<Hex, Bytes>")]
    pub coin_id: Vec<u8>,
    pub amount: u128,
}

/// Fungible balances, in the order the minter listed them.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TokenCoinData(pub Vec<CoinBalance>);

impl TokenCoinData {
    pub fn new(balances: impl IntoIterator<Item = (Vec<u8>, u128)>) -> Result<Self> {
        let data = Self(
            balances
                .into_iter()
                .map(|(coin_id, amount)| CoinBalance { coin_id, amount })
                .collect(),
        );
        data.validate()?;
        Ok(data)
    }

    /// Coin ids must be non-empty and distinct.
    pub fn validate(&self) -> Result<()> {
        let mut seen = std::collections::BTreeSet::new();
        for balance in &self.0 {
            if balance.coin_id.is_empty() {
                return Err(TokenError::InvalidCoinData("empty coin id".into()));
            }
            if !seen.insert(balance.coin_id.as_slice()) {
                return Err(TokenError::InvalidCoinData(format!(
                    "duplicate coin id {}",
                    hex::encode(&balance.coin_id)
                )));
            }
        }
        Ok(())
    }

    pub fn balance(&self, coin_id: &[u8]) -> Option<u128> {
        self.0
            .iter()
            .find(|b| b.coin_id == coin_id)
            .map(|b| b.amount)
    }
}

/// Genesis transaction data.
#[serde_as]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MintTransactionData {
    pub token_id: TokenId,
    pub token_type: TokenType,
    /// Immutable genesis metadata, protected by the mint signature.
    #[serde_as(as = "IfIsHumanReadable<Hex, Bytes>")]
    pub token_data: Vec<u8>,
    pub coin_data: Option<TokenCoinData>,
    pub recipient: Address,
    #[serde_as(as = "IfIsHumanReadable<Hex, Bytes>")]
    pub salt: [u8; 32],
    pub recipient_data_hash: Option<DataHash>,
    #[serde_as(as = "Option<IfIsHumanReadable<Hex, Bytes>>")]
    pub reason: Option<Vec<u8>>,
}

impl TransactionData for MintTransactionData {
    const KIND: u8 = 0;

    fn token_id(&self) -> TokenId {
        self.token_id
    }

    fn token_type(&self) -> TokenType {
        self.token_type
    }

    fn recipient(&self) -> &Address {
        &self.recipient
    }

    fn salt(&self) -> &[u8; 32] {
        &self.salt
    }

    fn recipient_data_hash(&self) -> Option<&DataHash> {
        self.recipient_data_hash.as_ref()
    }

    fn source_state_hash(&self) -> DataHash {
        mint_source_state(&self.token_id)
    }
}

/// Transfer transaction data.
#[serde_as]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferTransactionData {
    pub token_id: TokenId,
    pub token_type: TokenType,
    pub source_state_hash: DataHash,
    pub recipient: Address,
    #[serde_as(as = "IfIsHumanReadable<Hex, Bytes>")]
    pub salt: [u8; 32],
    pub recipient_data_hash: Option<DataHash>,
    #[serde_as(as = "Option<IfIsHumanReadable<Hex, Bytes>>")]
    pub message: Option<Vec<u8>>,
}

impl TransactionData for TransferTransactionData {
    const KIND: u8 = 1;

    fn token_id(&self) -> TokenId {
        self.token_id
    }

    fn token_type(&self) -> TokenType {
        self.token_type
    }

    fn recipient(&self) -> &Address {
        &self.recipient
    }

    fn salt(&self) -> &[u8; 32] {
        &self.salt
    }

    fn recipient_data_hash(&self) -> Option<&DataHash> {
        self.recipient_data_hash.as_ref()
    }

    fn source_state_hash(&self) -> DataHash {
        self.source_state_hash
    }
}

/// Registered genesis.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MintTransaction {
    pub data: MintTransactionData,
    pub inclusion_proof: InclusionProof,
}

/// Registered transfer, with the state it spent.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferTransaction {
    pub data: TransferTransactionData,
    pub source_state: TokenState,
    pub inclusion_proof: InclusionProof,
}

/// Pseudo source state of a token's mint.
pub fn mint_source_state(token_id: &TokenId) -> DataHash {
    let mut hasher = DataHasher::new(HashAlgorithm::Sha256);
    hasher
        .update(contexts::MINT_SOURCE_STATE.as_bytes())
        .update(token_id.as_bytes());
    hasher.finalize()
}

/// The universal minter key for `token_id`.
///
/// Anyone can derive it. Since the mint request id depends only on this key
/// and the token id, at most one mint per token id can ever register.
pub fn minter_signing_key(token_id: &TokenId) -> SigningKey {
    SigningKey::from_seed(&blake3::derive_key(
        contexts::MINTER_KEY,
        token_id.as_bytes(),
    ))
}
