//! Settlement lifecycle types.
//!
//! Each epoch produces at most one [`Settlement`]:
//! **OPEN → DISPUTED ⇄ OPEN → FINALIZED**, with **CANCELLED** reachable from
//! OPEN or DISPUTED by an emergency action.
//!
//! The Merkle root commits to the per-entity leaves; the [`SettlementTotals`]
//! carry per-modality aggregates that must balance
//! (`provider_reward + platform_fee == user_payment`) for every bucket.

use std::{collections::BTreeMap, fmt};

use chrono::{DateTime, Duration, Utc};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{
    AccountId, DisputeId, EntityId, EpochId, LedgerError, Result, ServiceClass, canonical,
    constants,
};

/// The kind of usage a leaf or bucket accounts for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub enum Modality {
    /// Counted in calls.
    Text,
    /// Counted in generated images.
    Image,
    /// Counted in seconds of video.
    Video,
}

impl Modality {
    pub const ALL: [Self; 3] = [Self::Text, Self::Image, Self::Video];

    /// Stable one-byte tag used in leaf and key encodings.
    #[must_use]
    pub fn tag(self) -> u8 {
        match self {
            Self::Text => 1,
            Self::Image => 2,
            Self::Video => 3,
        }
    }
}

impl fmt::Display for Modality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text => write!(f, "TEXT"),
            Self::Image => write!(f, "IMAGE"),
            Self::Video => write!(f, "VIDEO"),
        }
    }
}

// ---------------------------------------------------------------------------
// Totals
// ---------------------------------------------------------------------------

/// Aggregate usage and money for one modality bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModalityTotals {
    /// Calls, images, or video seconds depending on the modality.
    pub usage_count: u64,
    pub provider_reward: Decimal,
    pub platform_fee: Decimal,
    pub user_payment: Decimal,
}

impl ModalityTotals {
    #[must_use]
    pub fn new(
        usage_count: u64,
        provider_reward: Decimal,
        platform_fee: Decimal,
        user_payment: Decimal,
    ) -> Self {
        Self {
            usage_count,
            provider_reward,
            platform_fee,
            user_payment,
        }
    }

    /// `user_payment - (provider_reward + platform_fee)`; zero when balanced,
    /// `None` when the amounts are too large to combine.
    #[must_use]
    pub fn imbalance(&self) -> Option<Decimal> {
        let allocated = self.provider_reward.checked_add(self.platform_fee)?;
        self.user_payment.checked_sub(allocated)
    }

    #[must_use]
    pub fn is_balanced(&self, tolerance: Decimal) -> bool {
        self.imbalance().is_some_and(|d| d.abs() <= tolerance)
    }

    #[must_use]
    pub fn has_negative_amount(&self) -> bool {
        self.provider_reward.is_sign_negative()
            || self.platform_fee.is_sign_negative()
            || self.user_payment.is_sign_negative()
    }
}

impl Default for ModalityTotals {
    fn default() -> Self {
        Self::new(0, Decimal::ZERO, Decimal::ZERO, Decimal::ZERO)
    }
}

/// Per-modality totals for one settlement.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementTotals {
    buckets: BTreeMap<Modality, ModalityTotals>,
}

impl SettlementTotals {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style bucket insertion.
    #[must_use]
    pub fn with_bucket(mut self, modality: Modality, totals: ModalityTotals) -> Self {
        self.buckets.insert(modality, totals);
        self
    }

    pub fn set_bucket(&mut self, modality: Modality, totals: ModalityTotals) {
        self.buckets.insert(modality, totals);
    }

    #[must_use]
    pub fn bucket(&self, modality: Modality) -> Option<&ModalityTotals> {
        self.buckets.get(&modality)
    }

    pub fn buckets(&self) -> impl Iterator<Item = (Modality, &ModalityTotals)> {
        self.buckets.iter().map(|(m, t)| (*m, t))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    fn count_of(&self, modality: Modality) -> u64 {
        self.buckets.get(&modality).map_or(0, |b| b.usage_count)
    }

    #[must_use]
    pub fn text_calls(&self) -> u64 {
        self.count_of(Modality::Text)
    }

    #[must_use]
    pub fn image_count(&self) -> u64 {
        self.count_of(Modality::Image)
    }

    #[must_use]
    pub fn video_seconds(&self) -> u64 {
        self.count_of(Modality::Video)
    }

    fn sum_of(&self, amount: impl Fn(&ModalityTotals) -> Decimal) -> Result<Decimal> {
        self.buckets.values().try_fold(Decimal::ZERO, |acc, bucket| {
            acc.checked_add(amount(bucket)).ok_or(LedgerError::Overflow)
        })
    }

    /// Provider reward across all buckets.
    ///
    /// # Errors
    /// Returns [`LedgerError::Overflow`] if the sum is not representable.
    pub fn provider_reward(&self) -> Result<Decimal> {
        self.sum_of(|b| b.provider_reward)
    }

    /// # Errors
    /// Returns [`LedgerError::Overflow`] if the sum is not representable.
    pub fn platform_fee(&self) -> Result<Decimal> {
        self.sum_of(|b| b.platform_fee)
    }

    /// # Errors
    /// Returns [`LedgerError::Overflow`] if the sum is not representable.
    pub fn user_payment(&self) -> Result<Decimal> {
        self.sum_of(|b| b.user_payment)
    }

    /// Whether all three cross-bucket sums are representable.
    #[must_use]
    pub fn is_summable(&self) -> bool {
        self.provider_reward().is_ok()
            && self.platform_fee().is_ok()
            && self.user_payment().is_ok()
    }

    /// Check the balance invariant on every bucket.
    ///
    /// # Errors
    /// Returns [`LedgerError::InvalidTotals`] naming the first bucket whose
    /// imbalance exceeds `tolerance`.
    pub fn ensure_balanced(&self, tolerance: Decimal) -> Result<()> {
        for (modality, bucket) in &self.buckets {
            if !bucket.is_balanced(tolerance) {
                return Err(LedgerError::InvalidTotals {
                    reason: format!(
                        "{modality}: provider {} + fee {} != payment {}",
                        bucket.provider_reward, bucket.platform_fee, bucket.user_payment
                    ),
                });
            }
        }
        Ok(())
    }

    fn encode_into(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&(self.buckets.len() as u64).to_le_bytes());
        for (modality, bucket) in &self.buckets {
            buf.push(modality.tag());
            buf.extend_from_slice(&bucket.usage_count.to_le_bytes());
            canonical::encode_amount(buf, bucket.provider_reward);
            canonical::encode_amount(buf, bucket.platform_fee);
            canonical::encode_amount(buf, bucket.user_payment);
        }
    }
}

// ---------------------------------------------------------------------------
// State machine
// ---------------------------------------------------------------------------

/// Lifecycle state of a settlement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SettlementState {
    /// Committed; dispute window running.
    Open,
    /// At least one dispute is pending.
    Disputed,
    /// Totals are authoritative and claimable. **Irreversible.**
    Finalized,
    /// Voided by an emergency action. **Irreversible.**
    Cancelled,
}

impl SettlementState {
    #[must_use]
    pub fn can_transition_to(&self, target: Self) -> bool {
        matches!(
            (self, target),
            (Self::Open, Self::Disputed | Self::Finalized | Self::Cancelled)
                | (Self::Disputed, Self::Open | Self::Cancelled)
        )
    }

    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finalized | Self::Cancelled)
    }
}

impl fmt::Display for SettlementState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open => write!(f, "OPEN"),
            Self::Disputed => write!(f, "DISPUTED"),
            Self::Finalized => write!(f, "FINALIZED"),
            Self::Cancelled => write!(f, "CANCELLED"),
        }
    }
}

/// Audit record of an upheld correction to one leaf.
///
/// The leaf's amount moves from `committed_amount` (or zero for a missing
/// entry) to `corrected_amount`; the bucket's provider reward and user
/// payment move by the same delta.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TotalsCorrection {
    pub dispute_id: DisputeId,
    pub entity: EntityId,
    pub modality: Modality,
    /// Amount in the committed leaf; `None` if the leaf was missing.
    pub committed_amount: Option<Decimal>,
    /// Leaf amount in force before this correction.
    pub previous_amount: Decimal,
    pub corrected_amount: Decimal,
    pub previous: ModalityTotals,
    pub corrected: ModalityTotals,
    /// Paid to the challenger out of the fee reserve.
    pub compensation: Decimal,
}

/// One committed settlement. Never deleted; immutable once FINALIZED.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settlement {
    pub epoch_id: EpochId,
    pub merkle_root: [u8; 32],
    pub totals: SettlementTotals,
    pub service_class: ServiceClass,
    pub committed_at: DateTime<Utc>,
    pub committer: AccountId,
    pub state: SettlementState,
    pub open_dispute_count: u32,
    /// Platform fee still available to fund dispute compensation.
    pub fee_reserve: Decimal,
    /// Rewards already claimed, per modality.
    pub distributed: BTreeMap<Modality, Decimal>,
    pub corrections: Vec<TotalsCorrection>,
    pub finalized_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
}

impl Settlement {
    /// First instant at which disputes are no longer accepted and
    /// finalization becomes possible.
    #[must_use]
    pub fn window_closes_at(&self, dispute_window: Duration) -> DateTime<Utc> {
        self.committed_at
            .checked_add_signed(dispute_window)
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    /// Provider reward not yet claimed for a modality.
    #[must_use]
    pub fn remaining_reward(&self, modality: Modality) -> Decimal {
        let pool = self
            .totals
            .bucket(modality)
            .map_or(Decimal::ZERO, |b| b.provider_reward);
        let paid = self.distributed.get(&modality).copied().unwrap_or_default();
        pool - paid
    }

    /// The most recent upheld correction for a leaf, if any.
    #[must_use]
    pub fn latest_correction(
        &self,
        entity: &EntityId,
        modality: Modality,
    ) -> Option<&TotalsCorrection> {
        self.corrections
            .iter()
            .rev()
            .find(|c| c.entity == *entity && c.modality == modality)
    }

    /// Total compensation paid out of this settlement's fee reserve.
    #[must_use]
    pub fn compensation_paid(&self) -> Decimal {
        self.corrections.iter().map(|c| c.compensation).sum()
    }

    /// Move to `target`, enforcing the state machine.
    ///
    /// # Errors
    /// Returns [`LedgerError::InvalidTransition`] for illegal moves.
    pub fn transition(&mut self, target: SettlementState) -> Result<()> {
        if !self.state.can_transition_to(target) {
            return Err(LedgerError::InvalidTransition {
                reason: format!(
                    "settlement {} cannot move from {} to {target}",
                    self.epoch_id, self.state
                ),
            });
        }
        self.state = target;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Commitment wire types
// ---------------------------------------------------------------------------

/// Per-epoch record submitted by the off-chain aggregator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementCommitment {
    pub epoch_id: EpochId,
    pub merkle_root: [u8; 32],
    pub totals: SettlementTotals,
    pub service_class: ServiceClass,
}

impl SettlementCommitment {
    /// Canonical signing payload.
    ///
    /// Format: `"usageledger:commit:v1:" || epoch_id || merkle_root ||
    /// service_class || totals`
    #[must_use]
    pub fn signing_payload(&self) -> Vec<u8> {
        let mut payload = Vec::with_capacity(256);
        payload.extend_from_slice(constants::COMMIT_DOMAIN);
        payload.extend_from_slice(&self.epoch_id.0.to_le_bytes());
        payload.extend_from_slice(&self.merkle_root);
        canonical::encode_bytes(&mut payload, self.service_class.as_str().as_bytes());
        self.totals.encode_into(&mut payload);
        payload
    }
}

/// A commitment plus the committer's ed25519 signature over
/// [`SettlementCommitment::signing_payload`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignedCommitment {
    pub commitment: SettlementCommitment,
    pub signature: Vec<u8>,
}

impl SignedCommitment {
    /// Sign a commitment with the aggregator's key.
    #[must_use]
    pub fn sign(commitment: SettlementCommitment, key: &SigningKey) -> Self {
        let signature = key.sign(&commitment.signing_payload()).to_bytes().to_vec();
        Self {
            commitment,
            signature,
        }
    }

    /// Verify the signature against `signer`'s public key.
    ///
    /// # Errors
    /// Returns [`LedgerError::InvalidSignature`] if the key or signature is
    /// malformed or the signature does not verify.
    pub fn verify(&self, signer: &AccountId) -> Result<()> {
        let key = signer.verifying_key()?;
        let signature =
            Signature::from_slice(&self.signature).map_err(|e| LedgerError::InvalidSignature {
                reason: format!("malformed signature: {e}"),
            })?;
        key.verify(&self.commitment.signing_payload(), &signature)
            .map_err(|_| LedgerError::InvalidSignature {
                reason: format!(
                    "commitment for {} not signed by {signer}",
                    self.commitment.epoch_id
                ),
            })
    }
}

/// Result of a successful `finalize_settlement` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FinalizeOutcome {
    /// This call moved the settlement to FINALIZED.
    Finalized,
    /// The settlement was already FINALIZED; nothing changed.
    AlreadyFinalized,
}
