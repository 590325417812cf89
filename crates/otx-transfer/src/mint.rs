//! Minting.

use tracing::info;

use otx_aggregator::{AggregatorClient, PollPolicy};
use otx_crypto::{compute_recipient_data_hash, Secret};
use otx_token::{
    create_mint_commitment, random_salt, verify, Predicate, PredicateKind, Token, TokenCoinData,
    TokenId, TokenState, TokenType, TrustBase,
};

use crate::submit::submit_and_confirm;
use crate::Result;

/// Parameters for [`mint_token`].
#[derive(Clone, Debug)]
pub struct MintParams {
    /// Random when absent.
    pub token_id: Option<TokenId>,
    pub token_type: TokenType,
    /// Immutable token metadata, fixed at genesis.
    pub token_data: Vec<u8>,
    pub coin_data: Option<TokenCoinData>,
    /// Data for the first state; committed to through the recipient data hash.
    pub data: Option<Vec<u8>>,
    pub predicate: PredicateKind,
    /// Random when absent.
    pub salt: Option<[u8; 32]>,
    pub reason: Option<Vec<u8>>,
}

impl MintParams {
    pub fn new(token_type: TokenType, predicate: PredicateKind) -> Self {
        Self {
            token_id: None,
            token_type,
            token_data: Vec::new(),
            coin_data: None,
            data: None,
            predicate,
            salt: None,
            reason: None,
        }
    }
}

/// Mint a token owned by `owner` and register its genesis.
///
/// The returned token has passed full verification against `trust_base`.
///
/// # Errors
///
/// - [`crate::TransferError::DoubleSpendOrConflict`] if the token id was already minted
/// - any [`submit_and_confirm`] or verification error
pub async fn mint_token(
    client: &dyn AggregatorClient,
    owner: &Secret,
    params: MintParams,
    policy: &PollPolicy,
    trust_base: &TrustBase,
) -> Result<Token> {
    let token_id = params.token_id.unwrap_or_else(TokenId::random);
    let salt = params.salt.unwrap_or_else(random_salt);
    let predicate = Predicate::derive(owner, params.predicate, token_id, params.token_type, &salt);

    let commitment = create_mint_commitment(
        token_id,
        params.token_type,
        params.token_data,
        params.coin_data,
        predicate.address(),
        salt,
        compute_recipient_data_hash(params.data.as_deref()),
        params.reason,
    )?;
    let proof = submit_and_confirm(client, &commitment, policy).await?;

    let state = TokenState::new(&predicate, params.data)?;
    let token = Token::from_mint(commitment, proof, state);
    verify(&token, trust_base)?;
    info!(token_id = %token_id, kind = ?params.predicate, "token minted");
    Ok(token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{fast_policy, mint_params, TOKEN_TYPE};
    use crate::TransferError;
    use otx_aggregator::InMemoryAggregator;

    #[tokio::test]
    async fn test_mint_verifies() {
        let aggregator = InMemoryAggregator::new();
        let alice = Secret::from("alice");
        let token = mint_token(
            &aggregator,
            &alice,
            mint_params(Some(b"hello".to_vec())),
            &fast_policy(),
            &aggregator.trust_base(),
        )
        .await
        .expect("mint");
        assert!(token.transactions.is_empty());
        assert_eq!(token.token_type(), TOKEN_TYPE);
        assert_eq!(token.state.data.as_deref(), Some(&b"hello"[..]));
        token
            .state
            .decode_predicate()
            .expect("predicate")
            .signing_key(&alice)
            .expect("alice owns it");
    }

    #[tokio::test]
    async fn test_masked_mint_with_coins() {
        let aggregator = InMemoryAggregator::new();
        let params = MintParams {
            token_data: b"fungible".to_vec(),
            coin_data: Some(TokenCoinData::new([(b"USD".to_vec(), 100)]).expect("coins")),
            ..MintParams::new(TOKEN_TYPE, PredicateKind::Masked)
        };
        let token = mint_token(
            &aggregator,
            &Secret::from("alice"),
            params,
            &fast_policy(),
            &aggregator.trust_base(),
        )
        .await
        .expect("mint");
        let coins = token.genesis.data.coin_data.as_ref().expect("coins");
        assert_eq!(coins.balance(b"USD"), Some(100));
        assert_eq!(
            token.state.decode_predicate().expect("predicate").kind(),
            PredicateKind::Masked
        );
    }

    #[tokio::test]
    async fn test_second_mint_of_same_id_conflicts() {
        let aggregator = InMemoryAggregator::new();
        let token_id = TokenId([9u8; 32]);
        let params = |data: &[u8]| MintParams {
            token_id: Some(token_id),
            data: Some(data.to_vec()),
            ..MintParams::new(TOKEN_TYPE, PredicateKind::Unmasked)
        };
        mint_token(
            &aggregator,
            &Secret::from("alice"),
            params(b"first"),
            &fast_policy(),
            &aggregator.trust_base(),
        )
        .await
        .expect("first mint");
        let err = mint_token(
            &aggregator,
            &Secret::from("mallory"),
            params(b"second"),
            &fast_policy(),
            &aggregator.trust_base(),
        )
        .await
        .expect_err("second mint");
        assert!(matches!(err, TransferError::DoubleSpendOrConflict { .. }));
    }
}
