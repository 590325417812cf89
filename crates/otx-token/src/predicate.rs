//! Ownership predicates.
//!
//! A predicate is the lock on a token state: a public key (and a nonce)
//! that only a signature from the matching private key can satisfy. Two
//! variants exist:
//!
//! - **Unmasked**: the key is derived from the owner's secret alone, so
//!   the owner has one reusable address per token type. The nonce is the
//!   hash of the salt of the transaction that created the state and keeps
//!   state hashes unique when the address is reused.
//! - **Masked**: the nonce is derived from the secret and a salt, and the
//!   key from the secret and the nonce, giving a one-time key and address.
//!   The owner regenerates the identical predicate from the secret and the
//!   salt; the nonce is never sent ahead of time.
//!
//! States embed predicates as canonical CBOR bytes. [`Predicate::decode`]
//! is strict so corrupted bytes fail before any signature is checked.

use serde::{Deserialize, Serialize};
use serde_with::{hex::Hex, serde_as, Bytes, IfIsHumanReadable};

use otx_crypto::blake3::{self, contexts};
use otx_crypto::ed25519::{SignatureAlgorithm, SigningKey};
use otx_crypto::{DataHash, DataHasher, HashAlgorithm, Secret};

use crate::address::Address;
use crate::id::{TokenId, TokenType};
use crate::{cbor, Result, TokenError};

/// Predicate variant selector.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PredicateKind {
    Unmasked,
    Masked,
}

impl PredicateKind {
    fn tag(self) -> u8 {
        match self {
            PredicateKind::Unmasked => 0,
            PredicateKind::Masked => 1,
        }
    }
}

/// Fields shared by both predicate variants.
#[serde_as]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PredicateBody {
    pub token_id: TokenId,
    pub token_type: TokenType,
    #[serde_as(as = "IfIsHumanReadable<Hex, Bytes>")]
    pub public_key: [u8; 32],
    pub signature_algorithm: SignatureAlgorithm,
    pub hash_algorithm: HashAlgorithm,
    #[serde_as(as = "IfIsHumanReadable<Hex, Bytes>")]
    pub nonce: [u8; 32],
}

/// The lock on a token state.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", deny_unknown_fields)]
pub enum Predicate {
    Unmasked(PredicateBody),
    Masked(PredicateBody),
}

impl Predicate {
    /// Derive a predicate from a secret.
    ///
    /// Deterministic in `(secret, kind, token_id, token_type, salt)`. For an
    /// unmasked predicate `salt` is the salt of the transaction creating the
    /// state; for a masked one it is the salt the owner chose when handing
    /// out the address.
    pub fn derive(
        secret: &Secret,
        kind: PredicateKind,
        token_id: TokenId,
        token_type: TokenType,
        salt: &[u8; 32],
    ) -> Self {
        let hash_algorithm = HashAlgorithm::Sha256;
        match kind {
            PredicateKind::Unmasked => {
                let key = unmasked_signing_key(secret);
                Predicate::Unmasked(PredicateBody {
                    token_id,
                    token_type,
                    public_key: key.public_key_bytes(),
                    signature_algorithm: SignatureAlgorithm::Ed25519,
                    hash_algorithm,
                    nonce: unmasked_nonce(hash_algorithm, salt),
                })
            }
            PredicateKind::Masked => {
                let nonce = masked_nonce(secret, salt);
                let key = masked_signing_key(secret, &nonce);
                Predicate::Masked(PredicateBody {
                    token_id,
                    token_type,
                    public_key: key.public_key_bytes(),
                    signature_algorithm: SignatureAlgorithm::Ed25519,
                    hash_algorithm,
                    nonce,
                })
            }
        }
    }

    /// Address an owner hands out before the token id is known.
    ///
    /// The token id is not part of the address reference, so a placeholder
    /// id is used.
    pub fn address_for(
        secret: &Secret,
        kind: PredicateKind,
        token_type: TokenType,
        salt: &[u8; 32],
    ) -> Address {
        Self::derive(secret, kind, TokenId([0u8; 32]), token_type, salt).address()
    }

    pub fn kind(&self) -> PredicateKind {
        match self {
            Predicate::Unmasked(_) => PredicateKind::Unmasked,
            Predicate::Masked(_) => PredicateKind::Masked,
        }
    }

    pub fn body(&self) -> &PredicateBody {
        match self {
            Predicate::Unmasked(body) | Predicate::Masked(body) => body,
        }
    }

    pub fn public_key(&self) -> &[u8; 32] {
        &self.body().public_key
    }

    /// Hash of the address-bearing part of the predicate.
    ///
    /// Unmasked references omit the token id and nonce; masked references
    /// include the nonce.
    pub fn reference(&self) -> DataHash {
        let body = self.body();
        let kind = [self.kind().tag()];
        let signature_tag = [body.signature_algorithm.tag()];
        let hash_tag = body.hash_algorithm.tag().to_be_bytes();
        let mut fields: Vec<&[u8]> = vec![
            contexts::PREDICATE_REFERENCE.as_bytes(),
            &kind,
            body.token_type.as_bytes(),
            &signature_tag,
            &hash_tag,
            &body.public_key,
        ];
        if let Predicate::Masked(body) = self {
            fields.push(&body.nonce);
        }
        let mut hasher = DataHasher::new(body.hash_algorithm);
        hasher.update(&blake3::encode_multi_field(&fields));
        hasher.finalize()
    }

    pub fn address(&self) -> Address {
        Address::new(self.reference())
    }

    pub fn matches_address(&self, address: &Address) -> bool {
        &self.address() == address
    }

    /// Re-derive the signing key opening this predicate.
    ///
    /// # Errors
    ///
    /// - [`TokenError::KeyMismatch`] if `secret` does not reproduce the
    ///   predicate's public key
    pub fn signing_key(&self, secret: &Secret) -> Result<SigningKey> {
        let key = match self {
            Predicate::Unmasked(_) => unmasked_signing_key(secret),
            Predicate::Masked(body) => masked_signing_key(secret, &body.nonce),
        };
        self.check_key(&key)?;
        Ok(key)
    }

    /// Ensure `key` is the key this predicate declares.
    pub fn check_key(&self, key: &SigningKey) -> Result<()> {
        let actual = key.public_key_bytes();
        if &actual != self.public_key() {
            return Err(TokenError::KeyMismatch {
                expected: hex::encode(self.public_key()),
                actual: hex::encode(actual),
            });
        }
        Ok(())
    }

    /// Whether the nonce is the one a state created with `salt` must carry.
    ///
    /// Masked nonces are private and are bound through the address instead,
    /// so they always pass.
    pub fn nonce_matches_salt(&self, salt: &[u8; 32]) -> bool {
        match self {
            Predicate::Unmasked(body) => body.nonce == unmasked_nonce(body.hash_algorithm, salt),
            Predicate::Masked(_) => true,
        }
    }

    /// Canonical CBOR encoding.
    pub fn encode(&self) -> Result<Vec<u8>> {
        cbor::to_vec_named(self, "Predicate")
    }

    /// Strict decoding of predicate bytes.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        cbor::from_slice_canonical(bytes, "Predicate")
    }
}

fn unmasked_signing_key(secret: &Secret) -> SigningKey {
    SigningKey::from_seed(&blake3::derive_key(
        contexts::PREDICATE_SIGNING_KEY,
        secret.as_bytes(),
    ))
}

fn masked_signing_key(secret: &Secret, nonce: &[u8; 32]) -> SigningKey {
    let material = blake3::encode_multi_field(&[secret.as_bytes(), nonce]);
    SigningKey::from_seed(&blake3::derive_key(
        contexts::PREDICATE_SIGNING_KEY,
        &material,
    ))
}

fn masked_nonce(secret: &Secret, salt: &[u8; 32]) -> [u8; 32] {
    let material = blake3::encode_multi_field(&[secret.as_bytes(), salt]);
    blake3::derive_key(contexts::MASKED_NONCE, &material)
}

fn unmasked_nonce(algorithm: HashAlgorithm, salt: &[u8; 32]) -> [u8; 32] {
    *DataHash::compute(algorithm, salt).digest()
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOKEN_ID: TokenId = TokenId([1u8; 32]);
    const TOKEN_TYPE: TokenType = TokenType([2u8; 32]);

    fn secret() -> Secret {
        Secret::from("alice secret")
    }

    #[test]
    fn test_derive_is_deterministic() {
        for kind in [PredicateKind::Unmasked, PredicateKind::Masked] {
            let a = Predicate::derive(&secret(), kind, TOKEN_ID, TOKEN_TYPE, &[3u8; 32]);
            let b = Predicate::derive(&secret(), kind, TOKEN_ID, TOKEN_TYPE, &[3u8; 32]);
            assert_eq!(a, b);
            assert_eq!(a.kind(), kind);
        }
    }

    #[test]
    fn test_unmasked_address_is_reusable() {
        let a = Predicate::derive(&secret(), PredicateKind::Unmasked, TOKEN_ID, TOKEN_TYPE, &[3u8; 32]);
        let b = Predicate::derive(
            &secret(),
            PredicateKind::Unmasked,
            TokenId([9u8; 32]),
            TOKEN_TYPE,
            &[4u8; 32],
        );
        assert_eq!(a.public_key(), b.public_key());
        assert_ne!(a.body().nonce, b.body().nonce);
        assert_eq!(a.address(), b.address());
        assert!(b.matches_address(&a.address()));
    }

    #[test]
    fn test_masked_address_is_one_time() {
        let a = Predicate::derive(&secret(), PredicateKind::Masked, TOKEN_ID, TOKEN_TYPE, &[3u8; 32]);
        let b = Predicate::derive(&secret(), PredicateKind::Masked, TOKEN_ID, TOKEN_TYPE, &[4u8; 32]);
        assert_ne!(a.public_key(), b.public_key());
        assert_ne!(a.address(), b.address());
        // The owner can hand out the address before the token id is known.
        let early = Predicate::address_for(&secret(), PredicateKind::Masked, TOKEN_TYPE, &[3u8; 32]);
        assert!(a.matches_address(&early));
    }

    #[test]
    fn test_kinds_have_distinct_addresses() {
        let unmasked = Predicate::derive(&secret(), PredicateKind::Unmasked, TOKEN_ID, TOKEN_TYPE, &[3u8; 32]);
        let masked = Predicate::derive(&secret(), PredicateKind::Masked, TOKEN_ID, TOKEN_TYPE, &[3u8; 32]);
        assert_ne!(unmasked.address(), masked.address());
    }

    #[test]
    fn test_signing_key_requires_matching_secret() {
        for kind in [PredicateKind::Unmasked, PredicateKind::Masked] {
            let predicate = Predicate::derive(&secret(), kind, TOKEN_ID, TOKEN_TYPE, &[3u8; 32]);
            let key = predicate.signing_key(&secret()).expect("own secret opens");
            assert_eq!(&key.public_key_bytes(), predicate.public_key());
            assert!(matches!(
                predicate.signing_key(&Secret::from("mallory")),
                Err(TokenError::KeyMismatch { .. })
            ));
        }
    }

    #[test]
    fn test_unmasked_nonce_binds_salt() {
        let predicate = Predicate::derive(&secret(), PredicateKind::Unmasked, TOKEN_ID, TOKEN_TYPE, &[3u8; 32]);
        assert!(predicate.nonce_matches_salt(&[3u8; 32]));
        assert!(!predicate.nonce_matches_salt(&[4u8; 32]));
    }

    #[test]
    fn test_encode_decode_strict() {
        let predicate = Predicate::derive(&secret(), PredicateKind::Masked, TOKEN_ID, TOKEN_TYPE, &[3u8; 32]);
        let bytes = predicate.encode().expect("encode");
        assert_eq!(Predicate::decode(&bytes).expect("decode"), predicate);

        let mut trailing = bytes.clone();
        trailing.push(0);
        assert!(Predicate::decode(&trailing).is_err());
        assert!(Predicate::decode(&bytes[..bytes.len() - 1]).is_err());
    }

    #[test]
    fn test_byte_flip_never_decodes_to_same_predicate() {
        let predicate = Predicate::derive(&secret(), PredicateKind::Unmasked, TOKEN_ID, TOKEN_TYPE, &[3u8; 32]);
        let bytes = predicate.encode().expect("encode");
        for i in 0..bytes.len() {
            let mut corrupted = bytes.clone();
            corrupted[i] ^= 0x01;
            if let Ok(decoded) = Predicate::decode(&corrupted) {
                assert_ne!(decoded, predicate, "flip at byte {i} went unnoticed");
            }
        }
    }
}
