//! Sparse Merkle tree compatible with the zk-kit SMT used for sanctions lists.
//!
//! Entries hash as `poseidon3(key, value, 1)`, inner nodes as `poseidon2(left, right)`,
//! and empty subtrees are zero. An entry sits at the shallowest depth where its key's
//! low bits (least significant first) stop colliding with other keys.

use crate::error::CryptoError;
use crate::field::FieldElement;
use crate::poseidon::{poseidon, poseidon2};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Levels the OFAC circuits reserve for SMT siblings.
pub const OFAC_TREE_LEVELS: usize = 64;

const KEY_BITS: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Node {
    Inner(FieldElement, FieldElement),
    Entry(FieldElement, FieldElement),
}

fn entry_hash(key: FieldElement, value: FieldElement) -> Result<FieldElement, CryptoError> {
    poseidon([key, value, FieldElement::from(1u64)])
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SmtProof {
    /// Queried key, with its value on membership.
    pub entry: (FieldElement, Option<FieldElement>),
    /// Entry found on the key's path that holds a different key.
    pub matching_entry: Option<(FieldElement, FieldElement)>,
    /// Siblings from the root down.
    pub siblings: Vec<FieldElement>,
    pub root: FieldElement,
    pub membership: bool,
}

#[derive(Debug, Clone, Default)]
pub struct SparseMerkleTree {
    root: FieldElement,
    nodes: HashMap<FieldElement, Node>,
}

struct Retrieved {
    entry: Option<FieldElement>,
    matching: Option<(FieldElement, FieldElement)>,
    siblings: Vec<FieldElement>,
}

impl SparseMerkleTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn root(&self) -> FieldElement {
        self.root
    }

    /// Number of entries in the tree.
    pub fn len(&self) -> usize {
        self.nodes
            .values()
            .filter(|n| matches!(n, Node::Entry(..)))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_zero()
    }

    pub fn get(&self, key: &FieldElement) -> Option<FieldElement> {
        self.retrieve(key).entry
    }

    fn retrieve(&self, key: &FieldElement) -> Retrieved {
        let mut siblings = Vec::new();
        let mut node = self.root;
        let mut depth = 0;
        while !node.is_zero() {
            match self.nodes.get(&node) {
                Some(Node::Entry(k, v)) => {
                    return if k == key {
                        Retrieved {
                            entry: Some(*v),
                            matching: None,
                            siblings,
                        }
                    } else {
                        Retrieved {
                            entry: None,
                            matching: Some((*k, *v)),
                            siblings,
                        }
                    };
                }
                Some(Node::Inner(left, right)) => {
                    if key.bit(depth) {
                        siblings.push(*left);
                        node = *right;
                    } else {
                        siblings.push(*right);
                        node = *left;
                    }
                    depth += 1;
                }
                None => break,
            }
        }
        Retrieved {
            entry: None,
            matching: None,
            siblings,
        }
    }

    /// Inserts a new entry.
    ///
    /// # Errors
    ///
    /// The key is already present, or two keys agree on every bit.
    pub fn add(&mut self, key: FieldElement, value: FieldElement) -> Result<(), CryptoError> {
        let Retrieved {
            entry,
            matching,
            mut siblings,
        } = self.retrieve(&key);
        if entry.is_some() {
            return Err(CryptoError::Poseidon(format!("key {key} already exists")));
        }

        if let Some((matching_key, matching_value)) = matching {
            let mut depth = siblings.len();
            while depth < KEY_BITS && matching_key.bit(depth) == key.bit(depth) {
                siblings.push(FieldElement::zero());
                depth += 1;
            }
            if depth == KEY_BITS {
                return Err(CryptoError::Poseidon(format!("key {key} collides")));
            }
            siblings.push(entry_hash(matching_key, matching_value)?);
        }

        let mut node = entry_hash(key, value)?;
        self.nodes.insert(node, Node::Entry(key, value));
        for (depth, sibling) in siblings.iter().enumerate().rev() {
            let (left, right) = if key.bit(depth) {
                (*sibling, node)
            } else {
                (node, *sibling)
            };
            node = poseidon2(left, right)?;
            self.nodes.insert(node, Node::Inner(left, right));
        }
        self.root = node;
        Ok(())
    }

    /// Membership proof for `key`, or a non-membership proof naming the closest entry.
    pub fn create_proof(&self, key: &FieldElement) -> SmtProof {
        let Retrieved {
            entry,
            matching,
            siblings,
        } = self.retrieve(key);
        SmtProof {
            entry: (*key, entry),
            matching_entry: matching,
            siblings,
            root: self.root,
            membership: entry.is_some(),
        }
    }

    /// Recomputes the root a proof commits to and compares it with the proof's root.
    pub fn verify_proof(proof: &SmtProof) -> bool {
        let (path_key, node) = match (proof.matching_entry, proof.entry) {
            (Some((k, v)), _) => (k, entry_hash(k, v)),
            (None, (k, Some(v))) => (k, entry_hash(k, v)),
            (None, (k, None)) => (k, Ok(FieldElement::zero())),
        };
        let Ok(mut node) = node else {
            return false;
        };
        if proof.membership != proof.entry.1.is_some() {
            return false;
        }
        for (depth, sibling) in proof.siblings.iter().enumerate().rev() {
            let next = if path_key.bit(depth) {
                poseidon2(*sibling, node)
            } else {
                poseidon2(node, *sibling)
            };
            match next {
                Ok(n) => node = n,
                Err(_) => return false,
            }
        }
        node == proof.root
    }
}

/// SMT proof shaped for the OFAC circuits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SmtCircuitProof {
    pub root: FieldElement,
    pub depth: usize,
    /// Key of the entry the path ends at, zero for an empty branch.
    pub closest_leaf: FieldElement,
    /// Siblings from the deepest level up, zero-padded.
    pub siblings: Vec<FieldElement>,
}

/// Builds the circuit form of a proof for `key`.
pub fn generate_smt_proof(
    tree: &SparseMerkleTree,
    key: &FieldElement,
) -> Result<SmtCircuitProof, CryptoError> {
    let proof = tree.create_proof(key);
    if proof.siblings.len() > OFAC_TREE_LEVELS {
        return Err(CryptoError::Poseidon(format!(
            "smt path of {} exceeds {OFAC_TREE_LEVELS} levels",
            proof.siblings.len()
        )));
    }
    let closest_leaf = match (proof.matching_entry, proof.entry) {
        (Some((k, _)), _) => k,
        (None, (k, Some(_))) => k,
        (None, (_, None)) => FieldElement::zero(),
    };
    debug!(
        "SMT proof for {key}: membership={} depth={}",
        proof.membership,
        proof.siblings.len()
    );
    let depth = proof.siblings.len();
    let mut siblings = proof.siblings;
    siblings.reverse();
    siblings.resize(OFAC_TREE_LEVELS, FieldElement::zero());
    Ok(SmtCircuitProof {
        root: proof.root,
        depth,
        closest_leaf,
        siblings,
    })
}
