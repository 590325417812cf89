//! Test fixtures: a local registry that certifies every insertion.

use otx_crypto::ed25519::SigningKey;
use otx_crypto::{compute_recipient_data_hash, Secret};
use otx_smt::SparseMerkleTree;

use crate::commitment::{create_mint_commitment, Commitment};
use crate::id::{random_salt, TokenId, TokenType};
use crate::inclusion_proof::{InclusionProof, RootCertificate};
use crate::predicate::{Predicate, PredicateKind};
use crate::state::TokenState;
use crate::token::Token;
use crate::transaction::TransactionData;
use crate::trust_base::TrustBase;

pub(crate) const TEST_TOKEN_TYPE: TokenType = TokenType([2u8; 32]);

pub(crate) struct LocalRegistry {
    tree: SparseMerkleTree,
    validator: SigningKey,
    round: u64,
    pub trust_base: TrustBase,
}

impl LocalRegistry {
    pub fn new() -> Self {
        let validator = SigningKey::generate();
        let trust_base =
            TrustBase::new(1, 0, vec![validator.public_key_bytes()], 1).expect("trust base");
        Self {
            tree: SparseMerkleTree::new(),
            validator,
            round: 0,
            trust_base,
        }
    }

    pub fn register<D: TransactionData>(&mut self, commitment: &Commitment<D>) -> InclusionProof {
        let transaction_hash = commitment.transaction_hash().expect("hash");
        let leaf = commitment
            .authenticator
            .leaf_value(&transaction_hash)
            .expect("leaf");
        let key = *commitment.request_id.key();
        self.tree
            .insert(key, leaf.imprint().to_vec())
            .expect("fresh request id");
        self.round += 1;
        let certificate = RootCertificate::sign(
            self.trust_base.network_id,
            self.round,
            self.tree.root(),
            std::slice::from_ref(&self.validator),
        );
        InclusionProof {
            merkle_path: self.tree.inclusion_path(&key).expect("path"),
            certificate,
            authenticator: Some(commitment.authenticator.clone()),
            transaction_hash: Some(transaction_hash),
        }
    }
}

/// Mint a token to an unmasked predicate of `owner`.
pub(crate) fn minted_token(
    registry: &mut LocalRegistry,
    owner: &Secret,
    data: Option<Vec<u8>>,
) -> Token {
    let token_id = TokenId::random();
    let salt = random_salt();
    let predicate = Predicate::derive(owner, PredicateKind::Unmasked, token_id, TEST_TOKEN_TYPE, &salt);
    let commitment = create_mint_commitment(
        token_id,
        TEST_TOKEN_TYPE,
        b"genesis metadata".to_vec(),
        None,
        predicate.address(),
        salt,
        compute_recipient_data_hash(data.as_deref()),
        None,
    )
    .expect("mint commitment");
    let proof = registry.register(&commitment);
    let state = TokenState::new(&predicate, data).expect("state");
    Token::from_mint(commitment, proof, state)
}
