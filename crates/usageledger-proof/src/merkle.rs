//! Sorted-pair Merkle verification.
//!
//! Interior nodes hash the two children in lexicographic order, so a proof
//! is just the list of sibling hashes from leaf to root with no left/right
//! flags. The `0x01` node prefix and the domain tags on leaves keep a leaf
//! from ever being mistaken for an interior node.

use sha2::{Digest, Sha256};
use usageledger_types::constants::MAX_PROOF_DEPTH;

/// Prefix byte of every interior node.
const NODE_PREFIX: u8 = 0x01;

/// Hash two sibling nodes into their parent.
#[must_use]
pub fn hash_node(a: &[u8; 32], b: &[u8; 32]) -> [u8; 32] {
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
    let mut hasher = Sha256::new();
    hasher.update([NODE_PREFIX]);
    hasher.update(lo);
    hasher.update(hi);
    hasher.finalize().into()
}

/// Fold a proof path onto a leaf, yielding the implied root.
///
/// Returns `None` if the path is longer than `max_depth`.
#[must_use]
pub fn fold_proof(leaf: &[u8; 32], proof: &[[u8; 32]], max_depth: usize) -> Option<[u8; 32]> {
    if proof.len() > max_depth.min(MAX_PROOF_DEPTH) {
        tracing::debug!(
            depth = proof.len(),
            max_depth,
            "Merkle proof exceeds maximum depth"
        );
        return None;
    }
    Some(proof.iter().fold(*leaf, |acc, sibling| hash_node(&acc, sibling)))
}

/// Check that `leaf` is committed under `root` via `proof`.
///
/// Never panics. Over-long proofs are rejected without hashing.
#[must_use]
pub fn verify(root: &[u8; 32], leaf: &[u8; 32], proof: &[[u8; 32]]) -> bool {
    verify_with_depth(root, leaf, proof, MAX_PROOF_DEPTH)
}

/// [`verify`] with a tighter depth bound (capped at [`MAX_PROOF_DEPTH`]).
#[must_use]
pub fn verify_with_depth(
    root: &[u8; 32],
    leaf: &[u8; 32],
    proof: &[[u8; 32]],
    max_depth: usize,
) -> bool {
    fold_proof(leaf, proof, max_depth).is_some_and(|computed| computed == *root)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn h(n: u8) -> [u8; 32] {
        [n; 32]
    }

    #[test]
    fn node_hash_is_order_independent() {
        assert_eq!(hash_node(&h(1), &h(2)), hash_node(&h(2), &h(1)));
        assert_ne!(hash_node(&h(1), &h(2)), hash_node(&h(1), &h(3)));
    }

    #[test]
    fn empty_proof_means_leaf_is_root() {
        assert!(verify(&h(5), &h(5), &[]));
        assert!(!verify(&h(5), &h(6), &[]));
    }

    #[test]
    fn two_level_proof() {
        let ab = hash_node(&h(1), &h(2));
        let cd = hash_node(&h(3), &h(4));
        let root = hash_node(&ab, &cd);
        assert!(verify(&root, &h(1), &[h(2), cd]));
        assert!(verify(&root, &h(4), &[h(3), ab]));
        assert!(!verify(&root, &h(1), &[h(3), cd]));
    }

    #[test]
    fn over_deep_proof_rejected() {
        let leaf = h(1);
        let proof = vec![h(2); MAX_PROOF_DEPTH + 1];
        let root = proof.iter().fold(leaf, |acc, s| hash_node(&acc, s));
        assert!(!verify(&root, &leaf, &proof));
        assert!(fold_proof(&leaf, &proof, usize::MAX).is_none());
    }

    #[test]
    fn depth_bound_is_configurable() {
        let proof = vec![h(2); 4];
        let root = fold_proof(&h(1), &proof, 4).unwrap();
        assert!(verify_with_depth(&root, &h(1), &proof, 4));
        assert!(!verify_with_depth(&root, &h(1), &proof, 3));
    }
}
