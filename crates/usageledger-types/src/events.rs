//! Ledger events and the hash-chained audit record that carries them.
//!
//! Every state-changing transition emits one [`LedgerEvent`]. Events are
//! appended as [`EventRecord`]s whose digest chains over the previous one, so
//! tampering with or dropping any record breaks every later digest.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::{
    AccountId, DisputeId, DisputeKind, EntityId, EpochId, Modality, Result, Role, ServiceClass,
    Verdict,
};

/// The type of a ledger event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    SettlementCommitted,
    DisputeRaised,
    DisputeResolved,
    SettlementFinalized,
    SettlementCancelled,
    RewardClaimed,
    PolicySet,
    RoleGranted,
    RoleRevoked,
    LedgerPaused,
    LedgerResumed,
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SettlementCommitted => write!(f, "SETTLEMENT_COMMITTED"),
            Self::DisputeRaised => write!(f, "DISPUTE_RAISED"),
            Self::DisputeResolved => write!(f, "DISPUTE_RESOLVED"),
            Self::SettlementFinalized => write!(f, "SETTLEMENT_FINALIZED"),
            Self::SettlementCancelled => write!(f, "SETTLEMENT_CANCELLED"),
            Self::RewardClaimed => write!(f, "REWARD_CLAIMED"),
            Self::PolicySet => write!(f, "POLICY_SET"),
            Self::RoleGranted => write!(f, "ROLE_GRANTED"),
            Self::RoleRevoked => write!(f, "ROLE_REVOKED"),
            Self::LedgerPaused => write!(f, "LEDGER_PAUSED"),
            Self::LedgerResumed => write!(f, "LEDGER_RESUMED"),
        }
    }
}

/// An observable ledger transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LedgerEvent {
    SettlementCommitted {
        epoch_id: EpochId,
        merkle_root: [u8; 32],
        committer: AccountId,
        user_payment: Decimal,
        at: DateTime<Utc>,
    },
    DisputeRaised {
        dispute_id: DisputeId,
        epoch_id: EpochId,
        challenger: AccountId,
        kind: DisputeKind,
        entity: EntityId,
        modality: Modality,
        stake: Decimal,
        at: DateTime<Utc>,
    },
    DisputeResolved {
        dispute_id: DisputeId,
        epoch_id: EpochId,
        verdict: Verdict,
        compensation: Decimal,
        at: DateTime<Utc>,
    },
    SettlementFinalized {
        epoch_id: EpochId,
        at: DateTime<Utc>,
    },
    SettlementCancelled {
        epoch_id: EpochId,
        reason: String,
        at: DateTime<Utc>,
    },
    RewardClaimed {
        epoch_id: EpochId,
        entity: EntityId,
        modality: Modality,
        amount: Decimal,
        at: DateTime<Utc>,
    },
    PolicySet {
        service_class: ServiceClass,
        effective_at: DateTime<Utc>,
        set_by: AccountId,
    },
    RoleGranted {
        account: AccountId,
        role: Role,
        by: AccountId,
    },
    RoleRevoked {
        account: AccountId,
        role: Role,
        by: AccountId,
    },
    LedgerPaused {
        by: AccountId,
        reason: String,
        at: DateTime<Utc>,
    },
    LedgerResumed {
        by: AccountId,
        at: DateTime<Utc>,
    },
}

impl LedgerEvent {
    #[must_use]
    pub fn kind(&self) -> EventKind {
        match self {
            Self::SettlementCommitted { .. } => EventKind::SettlementCommitted,
            Self::DisputeRaised { .. } => EventKind::DisputeRaised,
            Self::DisputeResolved { .. } => EventKind::DisputeResolved,
            Self::SettlementFinalized { .. } => EventKind::SettlementFinalized,
            Self::SettlementCancelled { .. } => EventKind::SettlementCancelled,
            Self::RewardClaimed { .. } => EventKind::RewardClaimed,
            Self::PolicySet { .. } => EventKind::PolicySet,
            Self::RoleGranted { .. } => EventKind::RoleGranted,
            Self::RoleRevoked { .. } => EventKind::RoleRevoked,
            Self::LedgerPaused { .. } => EventKind::LedgerPaused,
            Self::LedgerResumed { .. } => EventKind::LedgerResumed,
        }
    }

    /// The epoch this event concerns, if any.
    #[must_use]
    pub fn epoch_id(&self) -> Option<EpochId> {
        match self {
            Self::SettlementCommitted { epoch_id, .. }
            | Self::DisputeRaised { epoch_id, .. }
            | Self::DisputeResolved { epoch_id, .. }
            | Self::SettlementFinalized { epoch_id, .. }
            | Self::SettlementCancelled { epoch_id, .. }
            | Self::RewardClaimed { epoch_id, .. } => Some(*epoch_id),
            _ => None,
        }
    }
}

/// One entry of the append-only event log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    pub sequence: u64,
    pub event: LedgerEvent,
    /// `SHA-256(prev_digest || sequence || json(event))`.
    pub digest: [u8; 32],
}

impl EventRecord {
    /// Compute the chained digest for an event.
    ///
    /// # Errors
    /// Returns [`crate::LedgerError::Serialization`] if the event cannot be
    /// encoded.
    pub fn chain_digest(prev: &[u8; 32], sequence: u64, event: &LedgerEvent) -> Result<[u8; 32]> {
        let body = serde_json::to_vec(event)?;
        let mut hasher = Sha256::new();
        hasher.update(prev);
        hasher.update(sequence.to_le_bytes());
        hasher.update(&body);
        Ok(hasher.finalize().into())
    }
}
