//! The balance-ledger seam.
//!
//! Moving reward tokens is not the ledger's job. It calls into a
//! [`TokenLedger`] to escrow stakes, refund or slash them, and to pay out
//! rewards and compensation. [`crate::BalanceManager`] is the in-memory
//! implementation; production deployments plug in their own.

use rust_decimal::Decimal;
use usageledger_types::{AccountId, BalanceEntry, Result};

/// Why tokens are being credited. Tracked separately for conservation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CreditKind {
    /// A provider reward claimed from a finalized settlement.
    Reward,
    /// Compensation for an upheld dispute, drawn from the fee reserve.
    Compensation,
}

/// Token operations the settlement ledger depends on.
///
/// Every method is all-or-nothing: on error, balances are unchanged.
pub trait TokenLedger {
    /// Move `amount` from available into escrow.
    fn lock_stake(&mut self, account: AccountId, amount: Decimal) -> Result<()>;

    /// Return escrowed `amount` to available.
    fn release_stake(&mut self, account: AccountId, amount: Decimal) -> Result<()>;

    /// Remove escrowed `amount` from the account into the platform pool.
    fn slash_stake(&mut self, account: AccountId, amount: Decimal) -> Result<()>;

    /// Pay `amount` to the account's available balance.
    fn credit(&mut self, account: AccountId, amount: Decimal, kind: CreditKind) -> Result<()>;

    fn balance(&self, account: AccountId) -> BalanceEntry;

    /// Check the implementation's own supply invariant, if it keeps one.
    fn verify_conservation(&self) -> Result<()> {
        Ok(())
    }
}
