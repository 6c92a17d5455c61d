//! # Merkle Tree
//!
//! A membership-proof tree built over the JSON encodings of a block's
//! transactions, used by light (SPV) clients to verify that a given
//! transaction is included in a block without downloading the block body.
//!
//! ## Build algorithm
//!
//! Unlike the conventional "pair leaves, duplicate the odd one out" binary
//! tree, this tree is built by repeatedly popping the front two nodes of a
//! deque whenever their heights match, and elevating (re-queuing) the front
//! node otherwise:
//!
//! ```text
//! dq = deque(leaves)           // all start at height 0
//! while root is None:
//!     if dq[0].height == dq[1].height:
//!         parent = combine(dq.popleft(), dq.popleft())
//!         dq.append(parent)
//!     else:
//!         node = dq.popleft()
//!         node.height += 1
//!         dq.append(node)
//! ```
//!
//! This produces a tree where odd node counts at a level are carried
//! forward and paired against a node one level up, rather than being
//! duplicated as a sibling of themselves. A tree of 3 leaves therefore does
//! NOT mirror the lone leaf against itself — it waits for the pair one
//! level up to combine with it. No two leaves are ever hashed as a pair
//! with themselves.
//!
//! ## Arena, not pointers
//!
//! Rust doesn't make a parent-linked, mutable tree of `Rc<RefCell<Node>>`
//! pleasant to write or safe to reason about (cycles, borrow checker fights
//! for no benefit). Instead nodes live in a flat `Vec<Node>` arena and refer
//! to each other by index; `parent` is `Option<usize>` and `left`/`right`
//! are `Option<usize>`, never raw references.

use std::collections::{HashMap, VecDeque};

use thiserror::Error;

use crate::crypto::sha256_hex;

#[derive(Debug, Error)]
pub enum MerkleError {
    #[error("entry not found in tree")]
    EntryNotFound,

    #[error("invalid proof step direction")]
    InvalidDirection,

    #[error("cannot build a tree with no leaves")]
    Empty,
}

/// One node in the arena: a leaf (no children) or an internal node
/// (combining `left` and `right`).
#[derive(Debug, Clone)]
struct Node {
    hash: String,
    left: Option<usize>,
    right: Option<usize>,
    parent: Option<usize>,
    height: u32,
}

/// A single step in a membership proof: the sibling hash, and which side
/// of the current node it sat on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Side {
    Left,
    Right,
}

/// One (sibling_hash, side) pair. To recompute upward: if `side` is
/// `Right`, the sibling was our right neighbor, so `combine(running, sibling)`;
/// if `Left`, it was our left neighbor, so `combine(sibling, running)`.
pub type ProofStep = (String, Side);

/// A Merkle tree over a set of JSON-encoded transaction entries.
///
/// Entries are kept in insertion order; the map from entry string to its
/// leaf index lets [`MerkleTree::proof`] locate a leaf in O(1).
pub struct MerkleTree {
    arena: Vec<Node>,
    leaf_index: HashMap<String, usize>,
    root: Option<usize>,
}

impl MerkleTree {
    /// Build a tree over `entries` (each hashed individually as a leaf).
    /// Duplicate entries collapse to the same leaf, matching a hash map's
    /// semantics — the tree is keyed by entry content, not position.
    pub fn build(entries: &[String]) -> Result<Self, MerkleError> {
        if entries.is_empty() {
            return Err(MerkleError::Empty);
        }

        let mut arena = Vec::with_capacity(entries.len() * 2);
        let mut leaf_index = HashMap::with_capacity(entries.len());

        for entry in entries {
            if leaf_index.contains_key(entry) {
                continue;
            }
            let idx = arena.len();
            arena.push(Node {
                hash: sha256_hex(entry.as_bytes()),
                left: None,
                right: None,
                parent: None,
                height: 0,
            });
            leaf_index.insert(entry.clone(), idx);
        }

        let mut dq: VecDeque<usize> = (0..arena.len()).collect();
        let root = if dq.len() == 1 {
            dq[0]
        } else {
            loop {
                if dq.len() >= 2 && arena[dq[0]].height == arena[dq[1]].height {
                    let left = dq.pop_front().unwrap();
                    let right = dq.pop_front().unwrap();
                    let combined = sha256_hex(
                        format!("{}{}", arena[left].hash, arena[right].hash).as_bytes(),
                    );
                    let height = arena[left].height + 1;
                    let parent_idx = arena.len();
                    arena.push(Node {
                        hash: combined,
                        left: Some(left),
                        right: Some(right),
                        parent: None,
                        height,
                    });
                    arena[left].parent = Some(parent_idx);
                    arena[right].parent = Some(parent_idx);
                    if dq.is_empty() {
                        break parent_idx;
                    }
                    dq.push_back(parent_idx);
                } else {
                    let idx = dq.pop_front().unwrap();
                    arena[idx].height += 1;
                    dq.push_back(idx);
                }
            }
        };

        Ok(Self {
            arena,
            leaf_index,
            root: Some(root),
        })
    }

    /// The tree's root hash.
    pub fn root(&self) -> &str {
        &self.arena[self.root.expect("build() always sets root")].hash
    }

    /// Produce a membership proof for `entry`: a path of sibling hashes
    /// from the entry's leaf up to the root.
    pub fn proof(&self, entry: &str) -> Result<Vec<ProofStep>, MerkleError> {
        let mut idx = *self.leaf_index.get(entry).ok_or(MerkleError::EntryNotFound)?;
        let root = self.root.expect("build() always sets root");
        let mut steps = Vec::new();

        while idx != root {
            let parent_idx = self.arena[idx].parent.expect("non-root node has a parent");
            let parent = &self.arena[parent_idx];
            if parent.left == Some(idx) {
                let sibling = self.arena[parent.right.expect("internal node has both children")].hash.clone();
                steps.push((sibling, Side::Right));
            } else {
                let sibling = self.arena[parent.left.expect("internal node has both children")].hash.clone();
                steps.push((sibling, Side::Left));
            }
            idx = parent_idx;
        }
        Ok(steps)
    }
}

/// Verify a membership proof for `entry` against `root`, without needing a
/// [`MerkleTree`] instance — this is what an SPV client calls, since it
/// never builds the full tree itself.
pub fn verify_proof(entry: &str, proof: &[ProofStep], root: &str) -> bool {
    let mut running = sha256_hex(entry.as_bytes());
    for (sibling, side) in proof {
        running = match side {
            Side::Right => sha256_hex(format!("{}{}", running, sibling).as_bytes()),
            Side::Left => sha256_hex(format!("{}{}", sibling, running).as_bytes()),
        };
    }
    running == root
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entries(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("{{\"tx\":{}}}", i)).collect()
    }

    #[test]
    fn single_leaf_root_is_its_own_hash() {
        let tree = MerkleTree::build(&entries(1)).unwrap();
        assert_eq!(tree.root(), sha256_hex(b"{\"tx\":0}"));
    }

    #[test]
    fn proof_verifies_for_every_entry() {
        for n in [1, 2, 3, 4, 5, 7, 8, 16, 17] {
            let items = entries(n);
            let tree = MerkleTree::build(&items).unwrap();
            let root = tree.root().to_string();
            for item in &items {
                let proof = tree.proof(item).unwrap();
                assert!(verify_proof(item, &proof, &root), "failed for n={n}");
            }
        }
    }

    #[test]
    fn tampered_entry_fails_verification() {
        let items = entries(5);
        let tree = MerkleTree::build(&items).unwrap();
        let root = tree.root().to_string();
        let proof = tree.proof(&items[2]).unwrap();
        assert!(!verify_proof("not the real entry", &proof, &root));
    }

    #[test]
    fn tampered_root_fails_verification() {
        let items = entries(4);
        let tree = MerkleTree::build(&items).unwrap();
        let proof = tree.proof(&items[0]).unwrap();
        assert!(!verify_proof(&items[0], &proof, "0000000000000000000000000000000000000000000000000000000000000000"));
    }

    #[test]
    fn missing_entry_proof_errors() {
        let tree = MerkleTree::build(&entries(3)).unwrap();
        assert!(matches!(tree.proof("nope"), Err(MerkleError::EntryNotFound)));
    }

    #[test]
    fn empty_build_errors() {
        assert!(matches!(MerkleTree::build(&[]), Err(MerkleError::Empty)));
    }

    #[test]
    fn duplicate_entries_collapse_to_one_leaf() {
        let items = vec!["a".to_string(), "a".to_string(), "b".to_string()];
        let tree = MerkleTree::build(&items).unwrap();
        // Only 2 distinct leaves, so the root is a single combine.
        let expected = sha256_hex(
            format!("{}{}", sha256_hex(b"a"), sha256_hex(b"b")).as_bytes(),
        );
        assert_eq!(tree.root(), expected);
    }

    #[test]
    fn three_leaves_do_not_self_pair_the_odd_one() {
        // With 3 leaves the deque algorithm elevates the 3rd leaf once
        // before it can combine with the (already-combined) pair of the
        // first two, rather than duplicating it against itself.
        let items = entries(3);
        let tree = MerkleTree::build(&items).unwrap();
        let pair01 = sha256_hex(
            format!("{}{}", sha256_hex(b"{\"tx\":0}"), sha256_hex(b"{\"tx\":1}")).as_bytes(),
        );
        let expected_root =
            sha256_hex(format!("{}{}", pair01, sha256_hex(b"{\"tx\":2}")).as_bytes());
        assert_eq!(tree.root(), expected_root);
    }
}
