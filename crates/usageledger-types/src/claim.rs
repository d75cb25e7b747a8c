//! Reward claims.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{EntityId, EpochId, Modality};

/// A provider's claim against a finalized settlement, proven by the exact
/// committed leaf.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimRequest {
    pub epoch_id: EpochId,
    pub entity: EntityId,
    pub modality: Modality,
    pub amount: Decimal,
    pub proof: Vec<[u8; 32]>,
}

/// Written once per `(epoch, entity)` on the first successful claim and
/// never updated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimRecord {
    pub epoch_id: EpochId,
    pub entity: EntityId,
    pub modality: Modality,
    pub amount: Decimal,
    pub claimed_at: DateTime<Utc>,
}
