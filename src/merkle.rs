//! Lean incremental Merkle tree over Poseidon.
//!
//! Parents are `poseidon2(left, right)`. A node without a right sibling is promoted
//! to the next level unchanged, so the depth grows only as far as the leaf count
//! needs. The empty tree has root zero.

use crate::error::CryptoError;
use crate::field::FieldElement;
use crate::poseidon::poseidon2;
use crate::smt::SparseMerkleTree;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A Merkle proof for leaf inclusion.
///
/// `siblings` holds only the levels where the node had a sibling. Bit `i` of `index`
/// is set when the node was the right child at the level of `siblings[i]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerkleProof {
    pub leaf: FieldElement,
    pub root: FieldElement,
    pub siblings: Vec<FieldElement>,
    pub index: u64,
    /// Position of the leaf in the tree.
    pub leaf_index: usize,
}

/// Proof shaped for a fixed-depth circuit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CircuitMerklePath {
    pub leaf_depth: usize,
    pub path: Vec<FieldElement>,
    pub siblings: Vec<FieldElement>,
}

impl MerkleProof {
    /// Recomputes the root from the leaf and siblings.
    pub fn compute_root(&self) -> Result<FieldElement, CryptoError> {
        let mut node = self.leaf;
        for (i, sibling) in self.siblings.iter().enumerate() {
            node = if (self.index >> i) & 1 == 1 {
                poseidon2(*sibling, node)?
            } else {
                poseidon2(node, *sibling)?
            };
        }
        Ok(node)
    }

    /// Zero-pads siblings to `depth` and expands the path bits.
    pub fn to_circuit_path(&self, depth: usize) -> Result<CircuitMerklePath, CryptoError> {
        if self.siblings.len() > depth {
            return Err(CryptoError::Poseidon(format!(
                "proof has {} siblings, circuit depth is {depth}",
                self.siblings.len()
            )));
        }
        let path = (0..depth)
            .map(|i| FieldElement::from(i < 64 && (self.index >> i) & 1 == 1))
            .collect();
        let mut siblings = self.siblings.clone();
        siblings.resize(depth, FieldElement::zero());
        Ok(CircuitMerklePath {
            leaf_depth: self.siblings.len(),
            path,
            siblings,
        })
    }
}

/// A lean incremental Merkle tree.
///
/// Stores every level, leaves first, so proofs need no hashing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MerkleTree {
    pub leaves: Vec<FieldElement>,
    levels: Vec<Vec<FieldElement>>,
}

impl MerkleTree {
    /// Builds the tree from leaves in insertion order.
    pub fn new(leaves: Vec<FieldElement>) -> Result<Self, CryptoError> {
        let mut levels = vec![leaves.clone()];
        while levels[levels.len() - 1].len() > 1 {
            let level = &levels[levels.len() - 1];
            let next = level
                .chunks(2)
                .map(|pair| match pair {
                    [left, right] => poseidon2(*left, *right),
                    _ => Ok(pair[0]),
                })
                .collect::<Result<Vec<_>, _>>()?;
            levels.push(next);
        }
        Ok(MerkleTree { leaves, levels })
    }

    pub fn root(&self) -> FieldElement {
        self.levels
            .last()
            .and_then(|top| top.first())
            .copied()
            .unwrap_or_else(FieldElement::zero)
    }

    /// Number of levels above the leaves.
    pub fn depth(&self) -> usize {
        self.levels.len() - 1
    }

    pub fn size(&self) -> usize {
        self.leaves.len()
    }

    pub fn index_of(&self, leaf: &FieldElement) -> Option<usize> {
        self.leaves.iter().position(|l| l == leaf)
    }

    /// Generate a Merkle proof for the leaf at `leaf_index`.
    ///
    /// Returns `None` if the index is out of range.
    pub fn generate_proof(&self, leaf_index: usize) -> Option<MerkleProof> {
        let leaf = *self.leaves.get(leaf_index)?;
        let mut siblings = Vec::new();
        let mut index = 0u64;
        let mut position = leaf_index;

        for level in &self.levels[..self.depth()] {
            let is_right = position % 2 == 1;
            let sibling_position = if is_right { position - 1 } else { position + 1 };
            if let Some(sibling) = level.get(sibling_position) {
                if is_right {
                    index |= 1 << siblings.len();
                }
                siblings.push(*sibling);
            }
            position /= 2;
        }

        Some(MerkleProof {
            leaf,
            root: self.root(),
            siblings,
            index,
            leaf_index,
        })
    }

    /// Verify a Merkle proof against this tree's root.
    pub fn verify_proof(&self, proof: &MerkleProof) -> bool {
        if proof.root != self.root() {
            return false;
        }
        // path bits exist only for levels that carry a sibling
        if proof.siblings.len() < 64 && proof.index >> proof.siblings.len() != 0 {
            return false;
        }
        matches!(proof.compute_root(), Ok(root) if root == proof.root)
    }
}

/// Builds a sparse Merkle tree from `(key, value)` entries.
pub fn build_smt(entries: &[(FieldElement, FieldElement)]) -> Result<SparseMerkleTree, CryptoError> {
    let mut tree = SparseMerkleTree::new();
    for (key, value) in entries {
        tree.add(*key, *value)?;
    }
    Ok(tree)
}

impl fmt::Display for MerkleProof {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "MerkleProof:\n  Leaf: {}\n  Root: {}\n  Index: {}\n  Siblings: {}",
            self.leaf.to_hex(),
            self.root.to_hex(),
            self.leaf_index,
            self.siblings.len()
        )
    }
}
