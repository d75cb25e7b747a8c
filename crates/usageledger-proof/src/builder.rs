//! Tree construction for tests and tooling.
//!
//! The ledger only ever verifies proofs; building roots is the off-chain
//! aggregator's job. These helpers reproduce the aggregator's layout so that
//! tests can produce roots and proofs the verifier accepts.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use usageledger_types::{EntityId, EpochId, LeafKey, Modality};

use crate::{
    leaf::{GapLeaf, UsageLeaf},
    merkle::hash_node,
};

/// Plain sorted-pair Merkle tree over precomputed leaf hashes. Odd nodes are
/// promoted unchanged to the next level.
#[derive(Debug, Clone)]
pub struct MerkleTree {
    levels: Vec<Vec<[u8; 32]>>,
}

impl MerkleTree {
    #[must_use]
    pub fn from_leaves(leaves: Vec<[u8; 32]>) -> Self {
        let mut levels = vec![leaves];
        while levels.last().is_some_and(|level| level.len() > 1) {
            let next: Vec<[u8; 32]> = levels
                .last()
                .map(|level| {
                    level
                        .chunks(2)
                        .map(|pair| match pair {
                            [a, b] => hash_node(a, b),
                            _ => pair[0],
                        })
                        .collect()
                })
                .unwrap_or_default();
            levels.push(next);
        }
        Self { levels }
    }

    /// `None` for an empty tree.
    #[must_use]
    pub fn root(&self) -> Option<[u8; 32]> {
        self.levels.last().and_then(|level| level.first().copied())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.levels.first().map_or(0, Vec::len)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sibling path for the leaf at `index`.
    #[must_use]
    pub fn proof(&self, index: usize) -> Option<Vec<[u8; 32]>> {
        if index >= self.len() {
            return None;
        }
        let mut path = Vec::new();
        let mut idx = index;
        for level in &self.levels[..self.levels.len() - 1] {
            if let Some(sibling) = level.get(idx ^ 1) {
                path.push(*sibling);
            }
            idx /= 2;
        }
        Some(path)
    }
}

/// Builds the aggregator's tree for one epoch: usage leaves sorted by key
/// plus a gap leaf between every pair of adjacent keys (sentinels included).
#[derive(Debug, Clone)]
pub struct UsageTreeBuilder {
    epoch_id: EpochId,
    entries: BTreeMap<LeafKey, UsageLeaf>,
}

impl UsageTreeBuilder {
    #[must_use]
    pub fn new(epoch_id: EpochId) -> Self {
        Self {
            epoch_id,
            entries: BTreeMap::new(),
        }
    }

    /// Add (or replace) the leaf for `(entity, modality)`.
    #[must_use]
    pub fn leaf(mut self, entity: EntityId, modality: Modality, amount: Decimal) -> Self {
        let leaf = UsageLeaf {
            epoch_id: self.epoch_id,
            entity,
            modality,
            amount,
        };
        self.entries.insert(leaf.key(), leaf);
        self
    }

    #[must_use]
    pub fn build(self) -> UsageTree {
        let mut keys = Vec::with_capacity(self.entries.len() + 2);
        keys.push(LeafKey::MIN);
        keys.extend(self.entries.keys().copied());
        keys.push(LeafKey::MAX);

        let gaps: Vec<GapLeaf> = keys
            .windows(2)
            .map(|w| GapLeaf {
                epoch_id: self.epoch_id,
                lower: w[0],
                upper: w[1],
            })
            .collect();

        let leaves: Vec<UsageLeaf> = self.entries.into_values().collect();
        let hashes = leaves
            .iter()
            .map(UsageLeaf::hash)
            .chain(gaps.iter().map(GapLeaf::hash))
            .collect();

        UsageTree {
            tree: MerkleTree::from_leaves(hashes),
            leaves,
            gaps,
        }
    }
}

/// A built epoch tree.
#[derive(Debug, Clone)]
pub struct UsageTree {
    tree: MerkleTree,
    leaves: Vec<UsageLeaf>,
    gaps: Vec<GapLeaf>,
}

impl UsageTree {
    /// Always present: even an empty epoch commits the sentinel gap.
    #[must_use]
    pub fn root(&self) -> [u8; 32] {
        self.tree.root().unwrap_or([0u8; 32])
    }

    #[must_use]
    pub fn leaves(&self) -> &[UsageLeaf] {
        &self.leaves
    }

    /// The committed leaf and its proof.
    #[must_use]
    pub fn inclusion_proof(
        &self,
        entity: EntityId,
        modality: Modality,
    ) -> Option<(UsageLeaf, Vec<[u8; 32]>)> {
        let key = LeafKey::new(entity, modality);
        let index = self.leaves.iter().position(|l| l.key() == key)?;
        let proof = self.tree.proof(index)?;
        Some((self.leaves[index], proof))
    }

    /// The gap bracketing an absent key and its proof. `None` if the key is
    /// committed.
    #[must_use]
    pub fn absence_proof(
        &self,
        entity: EntityId,
        modality: Modality,
    ) -> Option<(GapLeaf, Vec<[u8; 32]>)> {
        let key = LeafKey::new(entity, modality);
        let index = self.gaps.iter().position(|g| g.brackets(&key))?;
        let proof = self.tree.proof(self.leaves.len() + index)?;
        Some((self.gaps[index], proof))
    }
}

#[cfg(test)]
mod tests {
    use rand::{Rng, SeedableRng, rngs::StdRng};
    use usageledger_types::AccountId;

    use super::*;
    use crate::{
        leaf::{verify_absence, verify_inclusion},
        merkle::verify,
    };

    fn entity(n: u8) -> EntityId {
        AccountId([n; 32])
    }

    #[test]
    fn every_leaf_of_random_trees_verifies() {
        let mut rng = StdRng::seed_from_u64(42);
        for size in 1..40usize {
            let leaves: Vec<[u8; 32]> = (0..size)
                .map(|_| {
                    let mut leaf = [0u8; 32];
                    rng.fill(&mut leaf);
                    leaf
                })
                .collect();
            let tree = MerkleTree::from_leaves(leaves.clone());
            let root = tree.root().unwrap();
            for (i, leaf) in leaves.iter().enumerate() {
                let proof = tree.proof(i).unwrap();
                assert!(verify(&root, leaf, &proof), "size {size}, leaf {i}");
            }
        }
    }

    #[test]
    fn out_of_range_index_has_no_proof() {
        let tree = MerkleTree::from_leaves(vec![[1; 32], [2; 32]]);
        assert!(tree.proof(2).is_none());
        assert!(MerkleTree::from_leaves(Vec::new()).root().is_none());
    }

    #[test]
    fn usage_tree_inclusion_and_absence() {
        let tree = UsageTreeBuilder::new(EpochId(1))
            .leaf(entity(1), Modality::Text, Decimal::new(100, 0))
            .leaf(entity(3), Modality::Text, Decimal::new(40, 0))
            .leaf(entity(3), Modality::Video, Decimal::new(12, 0))
            .build();
        let root = tree.root();

        let (leaf, proof) = tree.inclusion_proof(entity(1), Modality::Text).unwrap();
        assert!(verify_inclusion(&root, &leaf, &proof, 32));
        let forged = UsageLeaf {
            amount: Decimal::new(107, 0),
            ..leaf
        };
        assert!(!verify_inclusion(&root, &forged, &proof, 32));

        assert!(tree.absence_proof(entity(1), Modality::Text).is_none());
        for (e, m) in [
            (entity(2), Modality::Text),
            (entity(1), Modality::Image),
            (entity(0), Modality::Video),
            (entity(9), Modality::Text),
        ] {
            let key = LeafKey::new(e, m);
            let (gap, proof) = tree.absence_proof(e, m).unwrap();
            assert!(verify_absence(&root, &key, &gap, &proof, 32), "{m} for {}", e.short());
        }
    }

    #[test]
    fn present_key_cannot_be_proven_absent() {
        let tree = UsageTreeBuilder::new(EpochId(1))
            .leaf(entity(1), Modality::Text, Decimal::ONE)
            .leaf(entity(2), Modality::Text, Decimal::ONE)
            .build();
        let root = tree.root();
        let present = LeafKey::new(entity(1), Modality::Text);
        let (gap, proof) = tree.absence_proof(entity(5), Modality::Text).unwrap();
        assert!(!verify_absence(&root, &present, &gap, &proof, 32));
    }

    #[test]
    fn empty_epoch_commits_sentinel_gap() {
        let tree = UsageTreeBuilder::new(EpochId(7)).build();
        let (gap, proof) = tree.absence_proof(entity(4), Modality::Image).unwrap();
        assert!(proof.is_empty());
        assert_eq!(gap.lower, LeafKey::MIN);
        assert_eq!(gap.upper, LeafKey::MAX);
        assert_eq!(tree.root(), gap.hash());
    }

    #[test]
    fn proofs_do_not_carry_across_epochs() {
        let one = UsageTreeBuilder::new(EpochId(1))
            .leaf(entity(1), Modality::Text, Decimal::ONE)
            .build();
        let two = UsageTreeBuilder::new(EpochId(2))
            .leaf(entity(1), Modality::Text, Decimal::ONE)
            .build();
        let (leaf, proof) = one.inclusion_proof(entity(1), Modality::Text).unwrap();
        assert!(!verify_inclusion(&two.root(), &leaf, &proof, 32));
    }
}
