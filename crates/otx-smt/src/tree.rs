//! Append-only sparse Merkle tree held in memory.

use std::collections::BTreeMap;

use crate::path::MerkleTreePath;
use crate::{bit, combine, Result, SmtError, DEPTH, EMPTY};

/// A sparse Merkle tree of depth 256.
///
/// Leaves are kept sorted by key; node hashes are recomputed from the sorted
/// leaf set, so memory stays proportional to the number of leaves.
#[derive(Clone, Debug, Default)]
pub struct SparseMerkleTree {
    /// key -> (value, leaf hash)
    leaves: BTreeMap<[u8; 32], (Vec<u8>, [u8; 32])>,
    root: [u8; 32],
}

impl SparseMerkleTree {
    pub fn new() -> Self {
        Self {
            leaves: BTreeMap::new(),
            root: EMPTY,
        }
    }

    /// Insert `value` under `key`.
    ///
    /// # Errors
    ///
    /// - [`SmtError::LeafExists`] if the key is already set, whatever its value
    pub fn insert(&mut self, key: [u8; 32], value: Vec<u8>) -> Result<()> {
        if self.leaves.contains_key(&key) {
            return Err(SmtError::LeafExists(hex::encode(key)));
        }
        let leaf = otx_crypto::blake3::merkle_leaf(&key, &value);
        self.leaves.insert(key, (value, leaf));
        self.root = self.recompute_root();
        tracing::debug!(leaves = self.leaves.len(), "smt: leaf inserted");
        Ok(())
    }

    pub fn root(&self) -> [u8; 32] {
        self.root
    }

    pub fn get(&self, key: &[u8; 32]) -> Option<&[u8]> {
        self.leaves.get(key).map(|(value, _)| value.as_slice())
    }

    pub fn contains(&self, key: &[u8; 32]) -> bool {
        self.leaves.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.leaves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.leaves.is_empty()
    }

    /// Build the path for `key` against the current root.
    ///
    /// Works for absent keys too, in which case the path proves exclusion.
    pub fn path(&self, key: &[u8; 32]) -> MerkleTreePath {
        let entries = self.sorted_entries();
        let mut slice = entries.as_slice();
        let mut by_depth = Vec::with_capacity(DEPTH);

        for depth in 0..DEPTH {
            let split = slice.partition_point(|(k, _)| !bit(k, depth));
            let (left, right) = slice.split_at(split);
            if bit(key, depth) {
                by_depth.push(subtree_hash(left, depth + 1));
                slice = right;
            } else {
                by_depth.push(subtree_hash(right, depth + 1));
                slice = left;
            }
        }

        let mut bitmap = [0u8; 32];
        let mut siblings = Vec::new();
        for depth in (0..DEPTH).rev() {
            let sibling = by_depth[depth];
            if sibling != EMPTY {
                bitmap[depth / 8] |= 1 << (7 - depth % 8);
                siblings.push(sibling);
            }
        }

        MerkleTreePath {
            root: self.root,
            bitmap,
            siblings,
        }
    }

    /// Path for a key that must be present.
    pub fn inclusion_path(&self, key: &[u8; 32]) -> Result<MerkleTreePath> {
        if !self.contains(key) {
            return Err(SmtError::LeafNotFound(hex::encode(key)));
        }
        Ok(self.path(key))
    }

    fn sorted_entries(&self) -> Vec<([u8; 32], [u8; 32])> {
        self.leaves
            .iter()
            .map(|(key, (_, leaf))| (*key, *leaf))
            .collect()
    }

    fn recompute_root(&self) -> [u8; 32] {
        subtree_hash(&self.sorted_entries(), 0)
    }
}

/// Hash of the subtree rooted at `depth` holding exactly `entries`.
///
/// All entries share the same `depth`-bit prefix and are sorted by key.
fn subtree_hash(entries: &[([u8; 32], [u8; 32])], depth: usize) -> [u8; 32] {
    match entries {
        [] => EMPTY,
        [(key, leaf)] => {
            let mut current = *leaf;
            for d in (depth..DEPTH).rev() {
                current = if bit(key, d) {
                    combine(&EMPTY, &current)
                } else {
                    combine(&current, &EMPTY)
                };
            }
            current
        }
        _ => {
            let split = entries.partition_point(|(k, _)| !bit(k, depth));
            let (left, right) = entries.split_at(split);
            combine(
                &subtree_hash(left, depth + 1),
                &subtree_hash(right, depth + 1),
            )
        }
    }
}
