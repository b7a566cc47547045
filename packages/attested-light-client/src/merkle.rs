//! A sorted binary Merkle tree over key/value pairs and its proofs.
//!
//! Leaves are ordered by key. A leaf hashes `0x00 || len(key) || key || sha256(value)` and an
//! inner node hashes `0x01 || left || right`. A node without a sibling is promoted unchanged to
//! the next level. The root of an empty tree is `sha256("")`.
//!
//! Absence of a key is proven with the existence proofs of its neighbours: adjacent leaves with
//! `left.key < key < right.key`, or a single leaf at either edge of the tree.

use std::collections::BTreeMap;

use ibc_classic_types::ensure;
use serde::{Deserialize, Serialize};
use serde_with::{hex::Hex, serde_as};
use sha2::{Digest, Sha256};

use crate::error::MerkleError;

const LEAF_PREFIX: u8 = 0x00;
const INNER_PREFIX: u8 = 0x01;

/// The root of a tree without leaves.
#[must_use]
pub fn empty_root() -> [u8; 32] {
    Sha256::digest(b"").into()
}

/// Hashes a stored value into the form committed by a leaf.
#[must_use]
pub fn value_hash(value: &[u8]) -> [u8; 32] {
    Sha256::digest(value).into()
}

fn leaf_hash(key: &[u8], value_hash: &[u8; 32]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update([LEAF_PREFIX]);
    hasher.update((key.len() as u64).to_be_bytes());
    hasher.update(key);
    hasher.update(value_hash);
    hasher.finalize().into()
}

fn inner_hash(left: &[u8; 32], right: &[u8; 32]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update([INNER_PREFIX]);
    hasher.update(left);
    hasher.update(right);
    hasher.finalize().into()
}

/// Proof that a key is committed with a given value hash.
#[serde_as]
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ExistenceProof {
    /// The proven key
    #[serde_as(as = "Hex")]
    pub key: Vec<u8>,
    /// `sha256` of the committed value
    #[serde_as(as = "Hex")]
    pub value_hash: [u8; 32],
    /// Position of the leaf in key order
    pub index: u64,
    /// Number of leaves in the tree
    pub leaf_count: u64,
    /// Sibling hashes from the leaf level upwards, skipping levels where the node was promoted
    #[serde_as(as = "Vec<Hex>")]
    pub siblings: Vec<[u8; 32]>,
}

impl ExistenceProof {
    /// Recomputes the root committed to by this proof.
    ///
    /// # Errors
    /// Returns [`MerkleError::MalformedProof`] if the position or sibling count is inconsistent
    /// with the tree size.
    pub fn compute_root(&self) -> Result<[u8; 32], MerkleError> {
        ensure!(
            self.index < self.leaf_count,
            MerkleError::MalformedProof("leaf index out of range")
        );

        let mut siblings = self.siblings.iter();
        let mut hash = leaf_hash(&self.key, &self.value_hash);
        let mut index = self.index;
        let mut width = self.leaf_count;

        while width > 1 {
            if index % 2 == 1 {
                let sibling = siblings
                    .next()
                    .ok_or(MerkleError::MalformedProof("missing sibling"))?;
                hash = inner_hash(sibling, &hash);
            } else if index + 1 < width {
                let sibling = siblings
                    .next()
                    .ok_or(MerkleError::MalformedProof("missing sibling"))?;
                hash = inner_hash(&hash, sibling);
            }
            index /= 2;
            width = width.div_ceil(2);
        }

        ensure!(
            siblings.next().is_none(),
            MerkleError::MalformedProof("unused siblings")
        );
        Ok(hash)
    }
}

/// Proof that a key is not committed.
#[serde_as]
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct NonExistenceProof {
    /// The key proven absent
    #[serde_as(as = "Hex")]
    pub key: Vec<u8>,
    /// The greatest committed key below `key`
    pub left: Option<ExistenceProof>,
    /// The smallest committed key above `key`
    pub right: Option<ExistenceProof>,
    /// Number of leaves in the tree
    pub leaf_count: u64,
}

/// A membership or non-membership proof.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CommitmentProof {
    /// The key is committed
    Exist(ExistenceProof),
    /// The key is absent
    NonExist(NonExistenceProof),
}

/// Verifies that `key` is committed with `value` under `root`.
///
/// # Errors
/// Returns a [`MerkleError`] describing the first check that failed.
pub fn verify_membership(
    root: &[u8; 32],
    proof: &CommitmentProof,
    key: &[u8],
    value: &[u8],
) -> Result<(), MerkleError> {
    let CommitmentProof::Exist(proof) = proof else {
        return Err(MerkleError::UnexpectedProofType {
            expected: "existence",
        });
    };

    ensure!(
        proof.key == key,
        MerkleError::KeyMismatch {
            expected: key.to_vec(),
            found: proof.key.clone(),
        }
    );
    ensure!(
        proof.value_hash == value_hash(value),
        MerkleError::ValueMismatch
    );
    ensure!(proof.compute_root()? == *root, MerkleError::RootMismatch);

    Ok(())
}

/// Verifies that `key` is not committed under `root`.
///
/// # Errors
/// Returns a [`MerkleError`] describing the first check that failed.
pub fn verify_non_membership(
    root: &[u8; 32],
    proof: &CommitmentProof,
    key: &[u8],
) -> Result<(), MerkleError> {
    let CommitmentProof::NonExist(proof) = proof else {
        return Err(MerkleError::UnexpectedProofType {
            expected: "non-existence",
        });
    };

    ensure!(
        proof.key == key,
        MerkleError::KeyMismatch {
            expected: key.to_vec(),
            found: proof.key.clone(),
        }
    );

    for neighbour in [&proof.left, &proof.right].into_iter().flatten() {
        ensure!(
            neighbour.leaf_count == proof.leaf_count,
            MerkleError::MalformedProof("neighbour leaf count mismatch")
        );
        ensure!(
            neighbour.compute_root()? == *root,
            MerkleError::RootMismatch
        );
    }

    match (&proof.left, &proof.right) {
        (None, None) => {
            ensure!(
                proof.leaf_count == 0,
                MerkleError::MalformedProof("absence in a non-empty tree needs a neighbour")
            );
            ensure!(*root == empty_root(), MerkleError::RootMismatch);
        }
        (Some(left), None) => {
            ensure!(
                left.key.as_slice() < key,
                MerkleError::MalformedProof("left neighbour is not below the key")
            );
            ensure!(
                left.index + 1 == proof.leaf_count,
                MerkleError::MalformedProof("left neighbour is not the last leaf")
            );
        }
        (None, Some(right)) => {
            ensure!(
                right.key.as_slice() > key,
                MerkleError::MalformedProof("right neighbour is not above the key")
            );
            ensure!(
                right.index == 0,
                MerkleError::MalformedProof("right neighbour is not the first leaf")
            );
        }
        (Some(left), Some(right)) => {
            ensure!(
                left.key.as_slice() < key && key < right.key.as_slice(),
                MerkleError::MalformedProof("neighbours do not enclose the key")
            );
            ensure!(
                left.index + 1 == right.index,
                MerkleError::MalformedProof("neighbours are not adjacent")
            );
        }
    }

    Ok(())
}

/// A Merkle tree built from a snapshot of key/value pairs. Used by the proving side.
#[derive(Clone, Debug)]
pub struct MerkleTree {
    leaves: Vec<(Vec<u8>, [u8; 32])>,
    levels: Vec<Vec<[u8; 32]>>,
}

impl MerkleTree {
    /// Builds the tree. Later duplicates of a key replace earlier ones.
    pub fn new<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<Vec<u8>>,
        V: AsRef<[u8]>,
    {
        let sorted: BTreeMap<Vec<u8>, [u8; 32]> = entries
            .into_iter()
            .map(|(k, v)| (k.into(), value_hash(v.as_ref())))
            .collect();
        let leaves: Vec<_> = sorted.into_iter().collect();

        let mut levels = vec![leaves
            .iter()
            .map(|(key, value)| leaf_hash(key, value))
            .collect::<Vec<_>>()];
        while let Some(level) = levels.last().filter(|level| level.len() > 1) {
            let next = level
                .chunks(2)
                .map(|pair| match pair {
                    [left, right] => inner_hash(left, right),
                    [single] => *single,
                    _ => unreachable!("chunks(2) yields one or two nodes"),
                })
                .collect();
            levels.push(next);
        }

        Self { leaves, levels }
    }

    /// Returns the root hash.
    #[must_use]
    pub fn root(&self) -> [u8; 32] {
        self.levels
            .last()
            .and_then(|level| level.first())
            .copied()
            .unwrap_or_else(empty_root)
    }

    /// Returns the number of leaves.
    #[must_use]
    pub fn len(&self) -> usize {
        self.leaves.len()
    }

    /// Returns true if the tree has no leaves.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.leaves.is_empty()
    }

    /// Builds a membership proof if `key` is committed and a non-membership proof otherwise.
    #[must_use]
    pub fn prove(&self, key: &[u8]) -> CommitmentProof {
        match self
            .leaves
            .binary_search_by(|(leaf_key, _)| leaf_key.as_slice().cmp(key))
        {
            Ok(index) => CommitmentProof::Exist(self.existence_proof(index)),
            Err(insert_at) => CommitmentProof::NonExist(NonExistenceProof {
                key: key.to_vec(),
                left: insert_at
                    .checked_sub(1)
                    .map(|index| self.existence_proof(index)),
                right: (insert_at < self.leaves.len()).then(|| self.existence_proof(insert_at)),
                leaf_count: self.leaves.len() as u64,
            }),
        }
    }

    fn existence_proof(&self, index: usize) -> ExistenceProof {
        let mut siblings = Vec::new();
        let mut position = index;
        for level in &self.levels[..self.levels.len() - 1] {
            let sibling = if position % 2 == 1 {
                Some(position - 1)
            } else if position + 1 < level.len() {
                Some(position + 1)
            } else {
                None
            };
            siblings.extend(sibling.map(|s| level[s]));
            position /= 2;
        }

        let (key, value_hash) = &self.leaves[index];
        ExistenceProof {
            key: key.clone(),
            value_hash: *value_hash,
            index: index as u64,
            leaf_count: self.leaves.len() as u64,
            siblings,
        }
    }
}
