//! Error types for the UsageLedger settlement core.
//!
//! All errors use the `UL_ERR_` prefix convention for easy grepping in logs.
//! Error codes are grouped by category:
//! - 1xx: Validation (malformed input, caller retries with corrected input)
//! - 2xx: State conflicts (wrong-state calls, double resolution, double claim)
//! - 3xx: Economic (stake, reserve, balance)
//! - 4xx: Timing (dispute window)
//! - 5xx: Authorization
//! - 9xx: General / internal
//!
//! No error halts the ledger. Every failure is scoped to the single call and
//! leaves ledger state unchanged.

use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use thiserror::Error;

use crate::{AccountId, DisputeId, EpochId, Role, ServiceClass, SettlementState};

/// Coarse classification of a [`LedgerError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    Validation,
    StateConflict,
    Economic,
    Timing,
    Authorization,
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Validation => write!(f, "VALIDATION"),
            Self::StateConflict => write!(f, "STATE_CONFLICT"),
            Self::Economic => write!(f, "ECONOMIC"),
            Self::Timing => write!(f, "TIMING"),
            Self::Authorization => write!(f, "AUTHORIZATION"),
            Self::Internal => write!(f, "INTERNAL"),
        }
    }
}

/// Central error enum for all UsageLedger operations.
#[derive(Debug, Error)]
pub enum LedgerError {
    // =================================================================
    // Validation Errors (1xx)
    // =================================================================
    /// No settlement has been committed for this epoch.
    #[error("UL_ERR_100: Unknown epoch: {0}")]
    UnknownEpoch(EpochId),

    /// No dispute with this ID exists.
    #[error("UL_ERR_101: Unknown dispute: {0}")]
    UnknownDispute(DisputeId),

    /// The Merkle proof is malformed or does not lead to the committed root.
    #[error("UL_ERR_102: Invalid proof: {reason}")]
    InvalidProof { reason: String },

    /// A zero, negative, or otherwise unusable amount.
    #[error("UL_ERR_103: Invalid amount: {reason}")]
    InvalidAmount { reason: String },

    /// Committed totals are inconsistent with themselves or with the policy.
    #[error("UL_ERR_104: Invalid totals: {reason}")]
    InvalidTotals { reason: String },

    /// A pricing policy failed validation (share sum, discount range, ...).
    #[error("UL_ERR_105: Invalid policy: {reason}")]
    InvalidPolicy { reason: String },

    /// No policy for the service class is effective at the given time.
    #[error("UL_ERR_106: No pricing policy for {class} at {at}")]
    PolicyNotFound {
        class: ServiceClass,
        at: DateTime<Utc>,
    },

    /// Epoch IDs must increase with every commit.
    #[error("UL_ERR_107: Epoch out of order: {epoch} is not after latest {latest}")]
    EpochOutOfOrder { epoch: EpochId, latest: EpochId },

    /// A signature or public key failed to verify.
    #[error("UL_ERR_108: Invalid signature: {reason}")]
    InvalidSignature { reason: String },

    /// A batch request exceeds the configured maximum size.
    #[error("UL_ERR_109: Batch too large: {size} entries, limit {limit}")]
    BatchTooLarge { size: usize, limit: usize },

    /// Ledger time may never move backwards.
    #[error("UL_ERR_110: Clock regression: {requested} is before {current}")]
    ClockRegression {
        current: DateTime<Utc>,
        requested: DateTime<Utc>,
    },

    /// A policy's effective time lies before `now - grace`.
    #[error("UL_ERR_111: Policy effective time {effective_at} is in the past (earliest {earliest})")]
    PolicyEffectiveInPast {
        effective_at: DateTime<Utc>,
        earliest: DateTime<Utc>,
    },

    // =================================================================
    // State Conflicts (2xx)
    // =================================================================
    /// Settlements are append-only; an epoch is committed at most once.
    #[error("UL_ERR_200: Settlement already exists for {0}")]
    SettlementAlreadyExists(EpochId),

    /// Disputes can only be raised against Open or Disputed settlements.
    #[error("UL_ERR_201: Settlement {epoch} is {state}, cannot be disputed")]
    SettlementNotDisputable {
        epoch: EpochId,
        state: SettlementState,
    },

    /// Claims require a Finalized settlement.
    #[error("UL_ERR_202: Settlement {epoch} is {state}, not FINALIZED")]
    SettlementNotFinalized {
        epoch: EpochId,
        state: SettlementState,
    },

    /// The settlement was cancelled by an emergency action.
    #[error("UL_ERR_203: Settlement {0} was cancelled")]
    SettlementCancelled(EpochId),

    /// Finalization is blocked while disputes are pending.
    #[error("UL_ERR_204: Settlement {epoch} has {open} unresolved dispute(s)")]
    UnresolvedDisputes { epoch: EpochId, open: u32 },

    /// Each dispute is resolved exactly once.
    #[error("UL_ERR_205: Dispute already resolved: {0}")]
    DisputeAlreadyResolved(DisputeId),

    /// Central anti-replay guard: one claim per (epoch, entity).
    #[error("UL_ERR_206: Reward already claimed for {entity} in {epoch}")]
    AlreadyClaimed { epoch: EpochId, entity: AccountId },

    /// Policies are superseded, never overwritten.
    #[error("UL_ERR_207: Policy for {class} already scheduled at {effective_at}")]
    PolicyAlreadyScheduled {
        class: ServiceClass,
        effective_at: DateTime<Utc>,
    },

    /// The ledger is paused by an emergency action.
    #[error("UL_ERR_208: Ledger is paused")]
    LedgerPaused,

    /// Generic illegal state-machine transition.
    #[error("UL_ERR_209: Invalid transition: {reason}")]
    InvalidTransition { reason: String },

    // =================================================================
    // Economic Errors (3xx)
    // =================================================================
    /// The posted stake is below the configured minimum.
    #[error("UL_ERR_300: Insufficient stake: need {minimum}, got {provided}")]
    InsufficientStake { minimum: Decimal, provided: Decimal },

    /// Compensation would exceed the settlement's remaining fee reserve.
    #[error("UL_ERR_301: Insufficient reserve: need {needed}, available {available}")]
    InsufficientReserve { needed: Decimal, available: Decimal },

    /// Not enough available balance to escrow a stake.
    #[error("UL_ERR_302: Insufficient available balance: need {needed}, have {available}")]
    InsufficientBalance { needed: Decimal, available: Decimal },

    /// Not enough escrowed balance to release or slash.
    #[error("UL_ERR_303: Insufficient escrowed balance: need {needed}, have {escrowed}")]
    InsufficientEscrow { needed: Decimal, escrowed: Decimal },

    /// Cumulative claims would exceed the modality's provider reward.
    #[error("UL_ERR_304: Reward pool exhausted: requested {requested}, remaining {remaining}")]
    RewardPoolExhausted {
        requested: Decimal,
        remaining: Decimal,
    },

    /// Decimal arithmetic overflowed.
    #[error("UL_ERR_305: Arithmetic overflow")]
    Overflow,

    // =================================================================
    // Timing Errors (4xx)
    // =================================================================
    /// The operation's time gate has not opened yet.
    #[error("UL_ERR_400: Too early: allowed from {allowed_at}, now {now}")]
    TooEarly {
        allowed_at: DateTime<Utc>,
        now: DateTime<Utc>,
    },

    /// The operation's time gate has closed.
    #[error("UL_ERR_401: Too late: window closed at {closed_at}, now {now}")]
    TooLate {
        closed_at: DateTime<Utc>,
        now: DateTime<Utc>,
    },

    // =================================================================
    // Authorization Errors (5xx)
    // =================================================================
    /// The caller does not hold the role the operation requires.
    #[error("UL_ERR_500: Unauthorized: {caller} lacks role {required}")]
    Unauthorized { caller: AccountId, required: Role },

    // =================================================================
    // General / Internal (9xx)
    // =================================================================
    /// Configuration error (invalid config file, out-of-range values, ...).
    #[error("UL_ERR_900: Configuration error: {0}")]
    Configuration(String),

    /// Serialization / deserialization error.
    #[error("UL_ERR_901: Serialization error: {0}")]
    Serialization(String),

    /// The single-writer ledger service is no longer running.
    #[error("UL_ERR_902: Ledger service unavailable")]
    ServiceUnavailable,

    /// Conservation invariant violated; critical safety alert.
    #[error("UL_ERR_903: Conservation violation: {reason}")]
    ConservationViolation { reason: String },

    /// A record of the event log does not chain onto its predecessor.
    #[error("UL_ERR_904: Event chain broken: {reason}")]
    EventChainBroken { reason: String },

    /// Unrecoverable internal error.
    #[error("UL_ERR_999: Internal error: {0}")]
    Internal(String),
}

impl LedgerError {
    /// The taxonomy bucket this error belongs to.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::UnknownEpoch(_)
            | Self::UnknownDispute(_)
            | Self::InvalidProof { .. }
            | Self::InvalidAmount { .. }
            | Self::InvalidTotals { .. }
            | Self::InvalidPolicy { .. }
            | Self::PolicyNotFound { .. }
            | Self::EpochOutOfOrder { .. }
            | Self::InvalidSignature { .. }
            | Self::BatchTooLarge { .. }
            | Self::ClockRegression { .. }
            | Self::PolicyEffectiveInPast { .. } => ErrorCategory::Validation,

            Self::SettlementAlreadyExists(_)
            | Self::SettlementNotDisputable { .. }
            | Self::SettlementNotFinalized { .. }
            | Self::SettlementCancelled(_)
            | Self::UnresolvedDisputes { .. }
            | Self::DisputeAlreadyResolved(_)
            | Self::AlreadyClaimed { .. }
            | Self::PolicyAlreadyScheduled { .. }
            | Self::LedgerPaused
            | Self::InvalidTransition { .. } => ErrorCategory::StateConflict,

            Self::InsufficientStake { .. }
            | Self::InsufficientReserve { .. }
            | Self::InsufficientBalance { .. }
            | Self::InsufficientEscrow { .. }
            | Self::RewardPoolExhausted { .. }
            | Self::Overflow => ErrorCategory::Economic,

            Self::TooEarly { .. } | Self::TooLate { .. } => ErrorCategory::Timing,

            Self::Unauthorized { .. } => ErrorCategory::Authorization,

            Self::Configuration(_)
            | Self::Serialization(_)
            | Self::ServiceUnavailable
            | Self::ConservationViolation { .. }
            | Self::EventChainBroken { .. }
            | Self::Internal(_) => ErrorCategory::Internal,
        }
    }
}

/// Crate-wide `Result` alias.
pub type Result<T> = std::result::Result<T, LedgerError>;

impl From<serde_json::Error> for LedgerError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
