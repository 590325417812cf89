//! # otx-smt
//!
//! Sparse Merkle tree over 256-bit keys.
//!
//! The single-spend registry stores every accepted commitment as a leaf keyed
//! by its RequestId. The tree is append-only: a key, once set, can never be
//! overwritten. Clients only ever see [`MerkleTreePath`]s and verify them
//! against a certified root.
//!
//! ## Hashing
//!
//! - leaf: `BLAKE3(0x00 || key || value)`
//! - inner: `BLAKE3::keyed_hash(K_inner, left || right)`
//! - an empty subtree hashes to 32 zero bytes at every height, and two empty
//!   children combine to an empty parent
//!
//! Path bits are read most-significant bit first.

pub mod path;
pub mod tree;

pub use path::{MerkleTreePath, PathVerification};
pub use tree::SparseMerkleTree;

/// Tree height: one level per key bit.
pub const DEPTH: usize = 256;

/// Hash of an empty subtree.
pub const EMPTY: [u8; 32] = [0u8; 32];

/// Error types for tree operations.
#[derive(Debug, thiserror::Error)]
pub enum SmtError {
    /// The key already holds a leaf; the tree is append-only.
    #[error("leaf already exists for key {0}")]
    LeafExists(String),

    /// No leaf is stored under the key.
    #[error("no leaf for key {0}")]
    LeafNotFound(String),
}

/// Convenience result type for tree operations.
pub type Result<T> = std::result::Result<T, SmtError>;

/// Bit `depth` of `key`, most-significant bit first.
pub(crate) fn bit(key: &[u8; 32], depth: usize) -> bool {
    (key[depth / 8] >> (7 - depth % 8)) & 1 == 1
}

/// Combine two children, keeping empty subtrees empty.
pub(crate) fn combine(left: &[u8; 32], right: &[u8; 32]) -> [u8; 32] {
    if left == &EMPTY && right == &EMPTY {
        EMPTY
    } else {
        otx_crypto::blake3::merkle_inner(left, right)
    }
}
