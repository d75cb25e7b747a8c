//! # usageledger-types
//!
//! Shared types, errors, and configuration for the **UsageLedger**
//! settlement core.
//!
//! This crate is the leaf dependency of the workspace. It defines:
//!
//! - **Identifiers**: [`EpochId`], [`AccountId`], [`EntityId`], [`DisputeId`], [`ServiceClass`]
//! - **Settlement model**: [`Settlement`], [`SettlementState`], [`SettlementTotals`], [`ModalityTotals`], [`Modality`]
//! - **Commitments**: [`SettlementCommitment`], [`SignedCommitment`]
//! - **Dispute model**: [`Dispute`], [`DisputeKind`], [`DisputeStatus`], [`Verdict`], [`DisputeEvidence`], [`LeafKey`]
//! - **Pricing**: [`PricingPolicy`], [`PolicyVersion`]
//! - **Claims**: [`ClaimRequest`], [`ClaimRecord`]
//! - **Events**: [`LedgerEvent`], [`EventRecord`]
//! - **Balances**: [`BalanceEntry`]
//! - **Roles**: [`Role`]
//! - **Configuration**: [`LedgerConfig`]
//! - **Errors**: [`LedgerError`] with `UL_ERR_` prefix codes
//! - **Constants**: system-wide limits and defaults

pub mod balance;
pub mod canonical;
pub mod claim;
pub mod config;
pub mod constants;
pub mod dispute;
pub mod error;
pub mod events;
pub mod ids;
pub mod pricing;
pub mod roles;
pub mod settlement;

pub use balance::*;
pub use claim::*;
pub use config::*;
pub use dispute::*;
pub use error::*;
pub use events::*;
pub use ids::*;
pub use pricing::*;
pub use roles::*;
pub use settlement::*;

// Constants and canonical encoders are accessed by module path
// (not re-exported to avoid name collisions).
