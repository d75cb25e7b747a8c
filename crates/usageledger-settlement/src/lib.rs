//! # usageledger-settlement
//!
//! **Settlement plane**: pricing policies, the commit → dispute window →
//! finalize lifecycle, dispute arbitration and reward distribution.
//!
//! ## Architecture
//!
//! An off-chain aggregator commits one signed [`SignedCommitment`] per epoch:
//! a Merkle root over per-entity usage leaves plus per-modality totals.
//! The [`SettlementLedger`]:
//! 1. Validates the totals against the pricing policy in force
//! 2. Accepts stake-backed disputes, proven against the root, until the
//!    dispute window closes
//! 3. Applies arbiter verdicts: corrections paid from the fee reserve, or
//!    slashed stakes
//! 4. Finalizes once the window is closed and no dispute is pending
//! 5. Pays each entity its proven reward exactly once
//!
//! Every accepted transition is appended to a hash-chained [`EventLog`].
//! [`LedgerService`] runs the ledger as a single-writer tokio task for
//! concurrent callers.
//!
//! [`SignedCommitment`]: usageledger_types::SignedCommitment

pub mod access;
pub mod arbitrator;
pub mod balance_manager;
pub mod claim_registry;
pub mod conservation;
pub mod distributor;
pub mod event_log;
pub mod ledger;
pub mod pause;
pub mod policy_store;
pub mod service;
pub mod token;

#[cfg(any(test, feature = "test-helpers"))]
pub mod testing;

pub use access::AccessControl;
pub use balance_manager::BalanceManager;
pub use claim_registry::ClaimRegistry;
pub use conservation::SupplyConservation;
pub use distributor::{BatchOutcome, ClaimOutcome};
pub use event_log::{EventLog, GENESIS_DIGEST, verify_records};
pub use ledger::SettlementLedger;
pub use pause::{PauseState, PauseSwitch};
pub use policy_store::PolicyStore;
pub use service::{LedgerCommand, LedgerHandle, LedgerService};
pub use token::{CreditKind, TokenLedger};
