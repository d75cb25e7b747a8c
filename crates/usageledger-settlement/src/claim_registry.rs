//! Claim registry: the anti-replay guard for reward payouts.
//!
//! Each `(epoch, entity)` pair can be claimed once. A second attempt returns
//! [`LedgerError::AlreadyClaimed`]. Unlike a bounded replay cache, records
//! are never evicted: a settled epoch stays claimable forever, so its guard
//! must too.

use std::collections::{BTreeMap, HashMap};

use usageledger_types::{ClaimRecord, EntityId, EpochId, LedgerError, Result};

#[derive(Debug, Default)]
pub struct ClaimRegistry {
    records: HashMap<(EpochId, EntityId), ClaimRecord>,
    /// Per-epoch count, for audit queries.
    per_epoch: BTreeMap<EpochId, usize>,
}

impl ClaimRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store the record for a first claim.
    ///
    /// # Errors
    /// Returns [`LedgerError::AlreadyClaimed`] if the pair already has one.
    pub fn record(&mut self, record: ClaimRecord) -> Result<()> {
        let key = (record.epoch_id, record.entity);
        if self.records.contains_key(&key) {
            return Err(LedgerError::AlreadyClaimed {
                epoch: record.epoch_id,
                entity: record.entity,
            });
        }
        *self.per_epoch.entry(record.epoch_id).or_default() += 1;
        self.records.insert(key, record);
        Ok(())
    }

    /// Undo a record whose payout failed within the same transition.
    pub(crate) fn revert(&mut self, epoch_id: EpochId, entity: EntityId) -> Option<ClaimRecord> {
        let removed = self.records.remove(&(epoch_id, entity))?;
        if let Some(count) = self.per_epoch.get_mut(&epoch_id) {
            *count -= 1;
            if *count == 0 {
                self.per_epoch.remove(&epoch_id);
            }
        }
        Some(removed)
    }

    #[must_use]
    pub fn is_claimed(&self, epoch_id: EpochId, entity: &EntityId) -> bool {
        self.records.contains_key(&(epoch_id, *entity))
    }

    #[must_use]
    pub fn get(&self, epoch_id: EpochId, entity: &EntityId) -> Option<&ClaimRecord> {
        self.records.get(&(epoch_id, *entity))
    }

    #[must_use]
    pub fn claims_in(&self, epoch_id: EpochId) -> usize {
        self.per_epoch.get(&epoch_id).copied().unwrap_or(0)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
