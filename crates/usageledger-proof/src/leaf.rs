//! Leaf encodings committed under a settlement root.
//!
//! Usage leaves carry `(entity, modality, amount, epoch)`. Gap leaves commit
//! to an adjacent pair of usage-leaf keys; a gap `(lower, upper)` in the root
//! proves that no usage leaf with a key strictly between them exists.

use rust_decimal::Decimal;
use sha2::{Digest, Sha256};
use usageledger_types::{EntityId, EpochId, LeafKey, Modality, canonical, constants};

use crate::merkle;

/// One provider's committed reward for one modality in one epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UsageLeaf {
    pub epoch_id: EpochId,
    pub entity: EntityId,
    pub modality: Modality,
    pub amount: Decimal,
}

impl UsageLeaf {
    #[must_use]
    pub fn key(&self) -> LeafKey {
        LeafKey::new(self.entity, self.modality)
    }

    /// `SHA-256(LEAF_DOMAIN || entity || modality || amount || epoch)`.
    #[must_use]
    pub fn hash(&self) -> [u8; 32] {
        let mut body = Vec::with_capacity(96);
        body.extend_from_slice(self.entity.as_bytes());
        body.push(self.modality.tag());
        canonical::encode_amount(&mut body, self.amount);
        body.extend_from_slice(&self.epoch_id.0.to_le_bytes());

        let mut hasher = Sha256::new();
        hasher.update(constants::LEAF_DOMAIN);
        hasher.update(&body);
        hasher.finalize().into()
    }
}

/// Commitment to the absence of any key strictly between `lower` and `upper`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GapLeaf {
    pub epoch_id: EpochId,
    pub lower: LeafKey,
    pub upper: LeafKey,
}

impl GapLeaf {
    /// `SHA-256(GAP_DOMAIN || epoch || lower || upper)`.
    #[must_use]
    pub fn hash(&self) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(constants::GAP_DOMAIN);
        hasher.update(self.epoch_id.0.to_le_bytes());
        hasher.update(self.lower.to_bytes());
        hasher.update(self.upper.to_bytes());
        hasher.finalize().into()
    }

    #[must_use]
    pub fn brackets(&self, key: &LeafKey) -> bool {
        self.lower < *key && *key < self.upper
    }
}

/// Check that `leaf`, exactly as given, is committed under `root`.
#[must_use]
pub fn verify_inclusion(
    root: &[u8; 32],
    leaf: &UsageLeaf,
    proof: &[[u8; 32]],
    max_depth: usize,
) -> bool {
    merkle::verify_with_depth(root, &leaf.hash(), proof, max_depth)
}

/// Check that no usage leaf for `key` is committed under `root`: the gap
/// must bracket the key and be committed itself.
#[must_use]
pub fn verify_absence(
    root: &[u8; 32],
    key: &LeafKey,
    gap: &GapLeaf,
    proof: &[[u8; 32]],
    max_depth: usize,
) -> bool {
    if !gap.brackets(key) {
        tracing::debug!(
            lower = hex::encode(gap.lower.to_bytes()),
            upper = hex::encode(gap.upper.to_bytes()),
            "gap does not bracket key"
        );
        return false;
    }
    merkle::verify_with_depth(root, &gap.hash(), proof, max_depth)
}
