//! Commitment builder.
//!
//! Building a commitment is pure: it assembles the transaction data, hashes
//! it, derives the request id and signs. Submission is the caller's job.

use serde::{Deserialize, Serialize};
use tracing::debug;

use otx_crypto::ed25519::SigningKey;
use otx_crypto::{DataHash, HashAlgorithm};

use crate::address::Address;
use crate::authenticator::Authenticator;
use crate::id::{TokenId, TokenType};
use crate::request_id::RequestId;
use crate::token::Token;
use crate::transaction::{
    minter_signing_key, MintTransactionData, TokenCoinData, TransactionData,
    TransferTransactionData,
};
use crate::Result;

/// A signed transition ready for submission.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Commitment<D> {
    pub request_id: RequestId,
    pub transaction_data: D,
    pub authenticator: Authenticator,
}

impl<D: TransactionData> Commitment<D> {
    /// Sign `transaction_data` with `key` and derive its request id.
    pub fn create(transaction_data: D, key: &SigningKey) -> Result<Self> {
        let transaction_hash = transaction_data.hash(HashAlgorithm::Sha256)?;
        let source_state_hash = transaction_data.source_state_hash();
        let authenticator = Authenticator::create(key, &transaction_hash, &source_state_hash);
        let request_id = authenticator.request_id();
        debug!(
            request_id = %request_id,
            transaction_hash = %transaction_hash,
            kind = D::KIND,
            "commitment created"
        );
        Ok(Self {
            request_id,
            transaction_data,
            authenticator,
        })
    }

    /// Content hash of the committed transaction.
    pub fn transaction_hash(&self) -> Result<DataHash> {
        self.transaction_data.hash(HashAlgorithm::Sha256)
    }
}

/// Commit to transferring the current state of `token` to `recipient`.
///
/// `signing_key` must open the token's current predicate. When
/// `recipient_data_hash` is given it must be the hash of the data the
/// recipient's state will carry.
///
/// # Errors
///
/// - [`crate::TokenError::KeyMismatch`] if `signing_key` is not the current owner's key
/// - decoding errors if the current predicate is corrupt
pub fn create_transfer_commitment(
    token: &Token,
    recipient: Address,
    salt: [u8; 32],
    recipient_data_hash: Option<DataHash>,
    message: Option<Vec<u8>>,
    signing_key: &SigningKey,
) -> Result<Commitment<TransferTransactionData>> {
    token.state.decode_predicate()?.check_key(signing_key)?;
    let data = TransferTransactionData {
        token_id: token.id(),
        token_type: token.token_type(),
        source_state_hash: token.state_hash()?,
        recipient,
        salt,
        recipient_data_hash,
        message,
    };
    Commitment::create(data, signing_key)
}

/// Commit to minting a new token, signed by the universal minter key.
#[allow(clippy::too_many_arguments)]
pub fn create_mint_commitment(
    token_id: TokenId,
    token_type: TokenType,
    token_data: Vec<u8>,
    coin_data: Option<TokenCoinData>,
    recipient: Address,
    salt: [u8; 32],
    recipient_data_hash: Option<DataHash>,
    reason: Option<Vec<u8>>,
) -> Result<Commitment<MintTransactionData>> {
    mint_commitment_from_data(MintTransactionData {
        token_id,
        token_type,
        token_data,
        coin_data,
        recipient,
        salt,
        recipient_data_hash,
        reason,
    })
}

/// [`create_mint_commitment`] for already assembled mint data.
pub fn mint_commitment_from_data(
    data: MintTransactionData,
) -> Result<Commitment<MintTransactionData>> {
    if let Some(coins) = &data.coin_data {
        coins.validate()?;
    }
    let key = minter_signing_key(&data.token_id);
    Commitment::create(data, &key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::predicate::{Predicate, PredicateKind};
    use crate::TokenError;
    use otx_crypto::Secret;

    fn recipient(name: &str) -> Address {
        Predicate::address_for(
            &Secret::from(name),
            PredicateKind::Unmasked,
            TokenType([2u8; 32]),
            &[0u8; 32],
        )
    }

    fn mint() -> Commitment<MintTransactionData> {
        create_mint_commitment(
            TokenId([1u8; 32]),
            TokenType([2u8; 32]),
            b"genesis".to_vec(),
            None,
            recipient("alice"),
            [3u8; 32],
            None,
            None,
        )
        .expect("mint")
    }

    #[test]
    fn test_mint_request_id_depends_only_on_token_id() {
        let a = mint();
        let mut data = a.transaction_data.clone();
        data.recipient = recipient("bob");
        let b = mint_commitment_from_data(data).expect("mint");
        assert_eq!(a.request_id, b.request_id);
        assert_ne!(
            a.transaction_hash().expect("hash"),
            b.transaction_hash().expect("hash")
        );
    }

    #[test]
    fn test_commitment_authenticator_verifies() {
        let c = mint();
        assert!(c.authenticator.verify(&c.transaction_hash().expect("hash")));
        assert_eq!(c.authenticator.request_id(), c.request_id);
    }

    #[test]
    fn test_mint_rejects_bad_coin_data() {
        let coins = TokenCoinData(vec![
            crate::transaction::CoinBalance {
                coin_id: b"A".to_vec(),
                amount: 1,
            },
            crate::transaction::CoinBalance {
                coin_id: b"A".to_vec(),
                amount: 2,
            },
        ]);
        let result = create_mint_commitment(
            TokenId([1u8; 32]),
            TokenType([2u8; 32]),
            Vec::new(),
            Some(coins),
            recipient("alice"),
            [3u8; 32],
            None,
            None,
        );
        assert!(matches!(result, Err(TokenError::InvalidCoinData(_))));
    }
}
