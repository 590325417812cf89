//! The token aggregate.

use serde::{Deserialize, Serialize};
use tracing::debug;

use otx_crypto::DataHash;

use crate::address::Address;
use crate::commitment::Commitment;
use crate::id::{TokenId, TokenType};
use crate::inclusion_proof::InclusionProof;
use crate::request_id::RequestId;
use crate::state::TokenState;
use crate::transaction::{
    MintTransaction, MintTransactionData, TransactionData, TransferTransaction,
    TransferTransactionData,
};
use crate::{Result, TokenError};

/// Format version written into every token.
pub const TOKEN_VERSION: &str = "1.0";

/// Full verifiable history of one token.
///
/// History is append-only: [`Token::apply_transaction`] returns a new token
/// with one more transfer and the new state.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Token {
    pub version: String,
    pub genesis: MintTransaction,
    #[serde(default)]
    pub transactions: Vec<TransferTransaction>,
    pub state: TokenState,
}

impl Token {
    /// A freshly minted token.
    pub fn from_mint(
        commitment: Commitment<MintTransactionData>,
        inclusion_proof: InclusionProof,
        state: TokenState,
    ) -> Self {
        Self {
            version: TOKEN_VERSION.to_string(),
            genesis: MintTransaction {
                data: commitment.transaction_data,
                inclusion_proof,
            },
            transactions: Vec::new(),
            state,
        }
    }

    pub fn id(&self) -> TokenId {
        self.genesis.data.token_id
    }

    pub fn token_type(&self) -> TokenType {
        self.genesis.data.token_type
    }

    /// Hash of the current state.
    pub fn state_hash(&self) -> Result<DataHash> {
        self.state.hash()
    }

    /// Request id under which the current state's spend would register.
    pub fn current_request_id(&self, public_key: &[u8; 32]) -> Result<RequestId> {
        Ok(RequestId::create(public_key, &self.state_hash()?))
    }

    /// Append a registered transfer of the current state.
    ///
    /// # Errors
    ///
    /// - [`TokenError::ChainLinkage`] if `data` does not spend the current state
    pub fn apply_transaction(
        &self,
        data: TransferTransactionData,
        inclusion_proof: InclusionProof,
        new_state: TokenState,
    ) -> Result<Token> {
        let current = self.state.hash()?;
        if current != data.source_state_hash {
            return Err(TokenError::ChainLinkage {
                expected: current,
                actual: data.source_state_hash,
            });
        }
        debug!(
            token_id = %self.id(),
            transfers = self.transactions.len() + 1,
            "transaction applied"
        );
        let mut next = self.clone();
        next.transactions.push(TransferTransaction {
            data,
            source_state: std::mem::replace(&mut next.state, new_state),
            inclusion_proof,
        });
        Ok(next)
    }

    /// Address the current state was sent to.
    pub fn latest_recipient(&self) -> &Address {
        match self.transactions.last() {
            Some(tx) => tx.data.recipient(),
            None => self.genesis.data.recipient(),
        }
    }

    /// Data commitment declared by the transaction that produced the current state.
    pub fn latest_recipient_data_hash(&self) -> Option<&DataHash> {
        match self.transactions.last() {
            Some(tx) => tx.data.recipient_data_hash(),
            None => self.genesis.data.recipient_data_hash(),
        }
    }

    /// State produced by each step: index 0 by genesis, `i + 1` by transfer `i`.
    pub fn produced_states(&self) -> Vec<&TokenState> {
        self.transactions
            .iter()
            .map(|tx| &tx.source_state)
            .chain(std::iter::once(&self.state))
            .collect()
    }
}
