//! Client-side Merkle path verification.

use serde::{Deserialize, Serialize};
use serde_with::{hex::Hex, serde_as, Bytes, IfIsHumanReadable};

use crate::{bit, combine, DEPTH, EMPTY};

/// Inclusion path from a leaf to a root.
///
/// Only non-empty siblings are transmitted. Bit `d` of `bitmap` (MSB first)
/// is set when the sibling at depth `d` is non-empty; `siblings` lists those
/// siblings from the leaf upward.
#[serde_as]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MerkleTreePath {
    #[serde_as(as = "IfIsHumanReadable<Hex, Bytes>")]
    pub root: [u8; 32],
    #[serde_as(as = "IfIsHumanReadable<Hex, Bytes>")]
    pub bitmap: [u8; 32],
    #[serde_as(as = "Vec<IfIsHumanReadable<Hex, Bytes>>")]
    pub siblings: Vec<[u8; 32]>,
}

/// Outcome of checking a path for a specific leaf.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PathVerification {
    /// The bitmap and sibling list are consistent.
    pub path_valid: bool,
    /// The path hashes the given leaf to the declared root.
    pub included: bool,
}

impl PathVerification {
    pub fn is_ok(&self) -> bool {
        self.path_valid && self.included
    }
}

impl MerkleTreePath {
    /// Recompute the root for `leaf_hash` stored under `key`.
    ///
    /// Returns `None` if the bitmap and sibling list disagree.
    pub fn compute_root(&self, key: &[u8; 32], leaf_hash: &[u8; 32]) -> Option<[u8; 32]> {
        let mut siblings = self.siblings.iter();
        let mut current = *leaf_hash;
        for depth in (0..DEPTH).rev() {
            let sibling = if bit(&self.bitmap, depth) {
                *siblings.next()?
            } else {
                EMPTY
            };
            current = if bit(key, depth) {
                combine(&sibling, &current)
            } else {
                combine(&current, &sibling)
            };
        }
        if siblings.next().is_some() {
            return None;
        }
        Some(current)
    }

    /// Verify that `value` is stored under `key`.
    pub fn verify(&self, key: &[u8; 32], value: &[u8]) -> PathVerification {
        let leaf = otx_crypto::blake3::merkle_leaf(key, value);
        match self.compute_root(key, &leaf) {
            Some(root) => PathVerification {
                path_valid: true,
                included: root == self.root,
            },
            None => PathVerification {
                path_valid: false,
                included: false,
            },
        }
    }

    /// Verify that no leaf is stored under `key`.
    pub fn verify_exclusion(&self, key: &[u8; 32]) -> bool {
        self.compute_root(key, &EMPTY) == Some(self.root)
    }
}
