//! In-memory reward-token balances.
//!
//! Tracks per-account balances with available/escrowed accounting plus the
//! platform pool that receives slashed stakes. All mutations are atomic:
//! either the full operation succeeds or the balance is unchanged.

use std::collections::HashMap;

use rust_decimal::Decimal;
use usageledger_types::{AccountId, BalanceEntry, LedgerError, Result};

use crate::{
    conservation::SupplyConservation,
    token::{CreditKind, TokenLedger},
};

/// The default [`TokenLedger`].
#[derive(Debug, Default)]
pub struct BalanceManager {
    balances: HashMap<AccountId, BalanceEntry>,
    /// Slashed stakes.
    platform_pool: Decimal,
    supply: SupplyConservation,
}

impl BalanceManager {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Deposit funds from outside the ledger (increases available).
    ///
    /// # Errors
    /// Returns [`LedgerError::InvalidAmount`] for a non-positive amount and
    /// [`LedgerError::Overflow`] if the balance would overflow.
    pub fn deposit(&mut self, account: AccountId, amount: Decimal) -> Result<()> {
        ensure_positive(amount)?;
        let updated = self
            .balance(account)
            .available
            .checked_add(amount)
            .ok_or(LedgerError::Overflow)?;
        self.supply.record_deposit(amount)?;
        self.balances.entry(account).or_default().available = updated;
        Ok(())
    }

    #[must_use]
    pub fn platform_pool(&self) -> Decimal {
        self.platform_pool
    }

    /// Sum of every account's available + escrowed, plus the platform pool.
    ///
    /// # Errors
    /// Returns [`LedgerError::Overflow`] if the sum is not representable.
    pub fn total_supply(&self) -> Result<Decimal> {
        self.balances
            .values()
            .try_fold(self.platform_pool, |acc, entry| {
                acc.checked_add(entry.available)?.checked_add(entry.escrowed)
            })
            .ok_or(LedgerError::Overflow)
    }

    #[must_use]
    pub fn supply(&self) -> &SupplyConservation {
        &self.supply
    }

    fn escrowed_entry(&mut self, account: AccountId, amount: Decimal) -> Result<&mut BalanceEntry> {
        let entry = self
            .balances
            .get_mut(&account)
            .ok_or(LedgerError::InsufficientEscrow {
                needed: amount,
                escrowed: Decimal::ZERO,
            })?;
        if entry.escrowed < amount {
            return Err(LedgerError::InsufficientEscrow {
                needed: amount,
                escrowed: entry.escrowed,
            });
        }
        Ok(entry)
    }
}

impl TokenLedger for BalanceManager {
    fn lock_stake(&mut self, account: AccountId, amount: Decimal) -> Result<()> {
        ensure_positive(amount)?;
        let entry = self
            .balances
            .get_mut(&account)
            .ok_or(LedgerError::InsufficientBalance {
                needed: amount,
                available: Decimal::ZERO,
            })?;
        if entry.available < amount {
            return Err(LedgerError::InsufficientBalance {
                needed: amount,
                available: entry.available,
            });
        }
        entry.available -= amount;
        entry.escrowed += amount;
        Ok(())
    }

    fn release_stake(&mut self, account: AccountId, amount: Decimal) -> Result<()> {
        let entry = self.escrowed_entry(account, amount)?;
        entry.escrowed -= amount;
        entry.available += amount;
        Ok(())
    }

    fn slash_stake(&mut self, account: AccountId, amount: Decimal) -> Result<()> {
        let pool = self
            .platform_pool
            .checked_add(amount)
            .ok_or(LedgerError::Overflow)?;
        let entry = self.escrowed_entry(account, amount)?;
        entry.escrowed -= amount;
        self.platform_pool = pool;
        Ok(())
    }

    fn credit(&mut self, account: AccountId, amount: Decimal, kind: CreditKind) -> Result<()> {
        ensure_positive(amount)?;
        let current = self
            .balances
            .get(&account)
            .map_or(Decimal::ZERO, |e| e.available);
        let updated = current.checked_add(amount).ok_or(LedgerError::Overflow)?;
        self.supply.record_credit(kind, amount)?;
        self.balances.entry(account).or_default().available = updated;
        Ok(())
    }

    fn balance(&self, account: AccountId) -> BalanceEntry {
        self.balances.get(&account).copied().unwrap_or_default()
    }

    /// No tokens are created or destroyed outside the tracked deposit and
    /// credit paths.
    fn verify_conservation(&self) -> Result<()> {
        self.supply.verify(self.total_supply()?)
    }
}

fn ensure_positive(amount: Decimal) -> Result<()> {
    if amount <= Decimal::ZERO {
        return Err(LedgerError::InvalidAmount {
            reason: format!("amount must be positive, got {amount}"),
        });
    }
    Ok(())
}
