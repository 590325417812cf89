//! BLAKE3 with per-purpose domain separation.
//!
//! Every derived value (signing keys, masked nonces, predicate references,
//! signed messages, Merkle nodes) is computed under its own context string
//! from [`contexts`], so a value produced for one purpose never verifies as
//! another.

/// Context strings. All of them start with `"OTX v1 "`.
pub mod contexts {
    pub const PREDICATE_SIGNING_KEY: &str = "OTX v1 predicate-signing-key";
    pub const MASKED_NONCE: &str = "OTX v1 masked-nonce";
    pub const PREDICATE_REFERENCE: &str = "OTX v1 predicate-reference";
    pub const ADDRESS_CHECKSUM: &str = "OTX v1 address-checksum";
    pub const AUTHENTICATOR: &str = "OTX v1 authenticator";
    pub const MINTER_KEY: &str = "OTX v1 minter-key";
    pub const MINT_SOURCE_STATE: &str = "OTX v1 mint-source-state";
    pub const MERKLE_INNER_NODE: &str = "OTX v1 merkle-inner-node";
    pub const ROOT_CERTIFICATE: &str = "OTX v1 root-certificate";

    pub const ALL_CONTEXTS: &[&str] = &[
        PREDICATE_SIGNING_KEY,
        MASKED_NONCE,
        PREDICATE_REFERENCE,
        ADDRESS_CHECKSUM,
        AUTHENTICATOR,
        MINTER_KEY,
        MINT_SOURCE_STATE,
        MERKLE_INNER_NODE,
        ROOT_CERTIFICATE,
    ];
}

/// Leaf hashes start with this byte; inner nodes use a derived key instead.
const LEAF_PREFIX: u8 = 0x00;

/// Plain BLAKE3 digest.
pub fn hash(data: &[u8]) -> [u8; 32] {
    *::blake3::hash(data).as_bytes()
}

/// BLAKE3 in key-derivation mode under `context`.
pub fn derive_key(context: &str, key_material: &[u8]) -> [u8; 32] {
    ::blake3::derive_key(context, key_material)
}

/// Hash of a sparse Merkle tree leaf holding `value` under `key`.
pub fn merkle_leaf(key: &[u8; 32], value: &[u8]) -> [u8; 32] {
    let mut hasher = ::blake3::Hasher::new();
    hasher.update(&[LEAF_PREFIX]).update(key).update(value);
    *hasher.finalize().as_bytes()
}

/// Hash of an inner node; the order of the children matters.
pub fn merkle_inner(left: &[u8; 32], right: &[u8; 32]) -> [u8; 32] {
    let key = derive_key(contexts::MERKLE_INNER_NODE, b"");
    let mut hasher = ::blake3::Hasher::new_keyed(&key);
    hasher.update(left).update(right);
    *hasher.finalize().as_bytes()
}

/// Unambiguous concatenation: each field is prefixed with its LE32 length.
pub fn encode_multi_field(fields: &[&[u8]]) -> Vec<u8> {
    let mut out = Vec::with_capacity(fields.iter().map(|f| 4 + f.len()).sum());
    for field in fields {
        out.extend_from_slice(&(field.len() as u32).to_le_bytes());
        out.extend_from_slice(field);
    }
    out
}
