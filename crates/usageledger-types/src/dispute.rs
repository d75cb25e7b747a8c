//! # Disputes: stake-backed challenges against a committed settlement
//!
//! ## State Machine
//!
//! ```text
//!   ┌─────────┐  verdict upheld   ┌────────┐
//!   │ PENDING ├──────────────────▶│ UPHELD │
//!   └────┬────┘                   └────────┘
//!        │ verdict rejected
//!        ▼
//!   ┌──────────┐
//!   │ REJECTED │
//!   └──────────┘
//! ```
//!
//! Both outcomes are terminal. A dispute is resolved exactly once.
//!
//! ## Evidence
//!
//! - `WrongCount` / `WrongReward`: the challenged leaf is shown to be in the
//!   committed root (inclusion proof of the exact committed amount).
//! - `MissingEntry`: a gap leaf bracketing the entity's key is shown to be in
//!   the root, so no leaf for that key was committed.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{AccountId, DisputeId, EntityId, EpochId, LedgerError, Modality, Result};

/// What the challenger claims is wrong with the committed usage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DisputeKind {
    /// The usage count behind the leaf is wrong.
    WrongCount,
    /// The reward amount in the leaf is wrong.
    WrongReward,
    /// The entity's usage was left out of the root entirely.
    MissingEntry,
}

impl std::fmt::Display for DisputeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::WrongCount => write!(f, "WRONG_COUNT"),
            Self::WrongReward => write!(f, "WRONG_REWARD"),
            Self::MissingEntry => write!(f, "MISSING_ENTRY"),
        }
    }
}

/// Lifecycle state of a dispute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DisputeStatus {
    /// Awaiting the arbiter's verdict. Stake is escrowed.
    Pending,
    /// Totals corrected, stake refunded, compensation paid. **Terminal.**
    Upheld,
    /// Stake slashed. **Terminal.**
    Rejected,
}

impl DisputeStatus {
    #[must_use]
    pub fn can_transition_to(&self, target: Self) -> bool {
        matches!((self, target), (Self::Pending, Self::Upheld | Self::Rejected))
    }
}

impl std::fmt::Display for DisputeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "PENDING"),
            Self::Upheld => write!(f, "UPHELD"),
            Self::Rejected => write!(f, "REJECTED"),
        }
    }
}

/// The arbiter's decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verdict {
    /// The challenge is correct; the disputed bucket's provider reward
    /// becomes `corrected_amount`.
    Upheld { corrected_amount: Decimal },
    /// The challenge is wrong; the stake is slashed.
    Rejected,
}

impl Verdict {
    #[must_use]
    pub fn status(&self) -> DisputeStatus {
        match self {
            Self::Upheld { .. } => DisputeStatus::Upheld,
            Self::Rejected => DisputeStatus::Rejected,
        }
    }
}

// ---------------------------------------------------------------------------
// Leaf keys
// ---------------------------------------------------------------------------

/// Sort key of a committed leaf: `(entity, modality tag)`.
///
/// Leaves are ordered by this key when the aggregator builds the tree. The
/// two sentinel keys bound the key space so that every absent key falls
/// inside some committed gap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct LeafKey {
    pub entity: AccountId,
    pub tag: u8,
}

impl LeafKey {
    /// Lower sentinel, below every real key.
    pub const MIN: Self = Self {
        entity: AccountId([0x00; 32]),
        tag: 0x00,
    };
    /// Upper sentinel, above every real key.
    pub const MAX: Self = Self {
        entity: AccountId([0xFF; 32]),
        tag: 0xFF,
    };

    #[must_use]
    pub fn new(entity: EntityId, modality: Modality) -> Self {
        Self {
            entity,
            tag: modality.tag(),
        }
    }

    /// 33-byte encoding used inside gap leaves.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; 33] {
        let mut out = [0u8; 33];
        out[..32].copy_from_slice(&self.entity.0);
        out[32] = self.tag;
        out
    }
}

/// Proof material attached to a dispute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DisputeEvidence {
    /// The challenged leaf, as committed, is part of the root.
    Inclusion {
        committed_amount: Decimal,
        proof: Vec<[u8; 32]>,
    },
    /// The gap `(lower, upper)` is part of the root and brackets the key.
    Absence {
        lower: LeafKey,
        upper: LeafKey,
        proof: Vec<[u8; 32]>,
    },
}

impl DisputeEvidence {
    #[must_use]
    pub fn proof_len(&self) -> usize {
        match self {
            Self::Inclusion { proof, .. } | Self::Absence { proof, .. } => proof.len(),
        }
    }
}

// ---------------------------------------------------------------------------
// Dispute
// ---------------------------------------------------------------------------

/// Input to `raise_dispute`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisputeRequest {
    pub epoch_id: EpochId,
    pub kind: DisputeKind,
    pub entity: EntityId,
    pub modality: Modality,
    /// The amount the challenger asserts is correct.
    pub claimed_amount: Decimal,
    pub evidence: DisputeEvidence,
    pub stake: Decimal,
}

/// A recorded dispute. Kept forever for audit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dispute {
    pub dispute_id: DisputeId,
    pub epoch_id: EpochId,
    pub challenger: AccountId,
    pub kind: DisputeKind,
    pub entity: EntityId,
    pub modality: Modality,
    pub claimed_amount: Decimal,
    pub evidence: DisputeEvidence,
    pub stake: Decimal,
    pub status: DisputeStatus,
    pub raised_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub verdict: Option<Verdict>,
    /// Paid to the challenger on an upheld correction.
    pub compensation: Decimal,
}

impl Dispute {
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.status == DisputeStatus::Pending
    }

    /// Record the verdict.
    ///
    /// # Errors
    /// Returns [`LedgerError::DisputeAlreadyResolved`] if not pending.
    pub fn resolve(
        &mut self,
        verdict: Verdict,
        compensation: Decimal,
        at: DateTime<Utc>,
    ) -> Result<()> {
        if !self.status.can_transition_to(verdict.status()) {
            return Err(LedgerError::DisputeAlreadyResolved(self.dispute_id));
        }
        self.status = verdict.status();
        self.verdict = Some(verdict);
        self.compensation = compensation;
        self.resolved_at = Some(at);
        Ok(())
    }
}
