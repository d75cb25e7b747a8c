//! Supply conservation invariant checker.
//!
//! ```text
//! Σ(available + escrowed) + platform_pool == deposits + rewards + compensation
//! ```
//!
//! Stakes move between available, escrowed and the platform pool but never
//! change the total. Only deposits and ledger credits create supply, and
//! each is refused if the total issued supply would stop being representable,
//! so every partial sum of balances is too.

use rust_decimal::Decimal;
use usageledger_types::{LedgerError, Result};

use crate::token::CreditKind;

/// Running totals of every source of supply since genesis.
#[derive(Debug, Clone, Default)]
pub struct SupplyConservation {
    deposits: Decimal,
    rewards: Decimal,
    compensation: Decimal,
}

impl SupplyConservation {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// # Errors
    /// Returns [`LedgerError::Overflow`] if total supply would overflow;
    /// nothing is recorded then.
    pub fn record_deposit(&mut self, amount: Decimal) -> Result<()> {
        self.deposits = self.issue(self.deposits, amount)?;
        Ok(())
    }

    /// # Errors
    /// Returns [`LedgerError::Overflow`] if total supply would overflow;
    /// nothing is recorded then.
    pub fn record_credit(&mut self, kind: CreditKind, amount: Decimal) -> Result<()> {
        match kind {
            CreditKind::Reward => self.rewards = self.issue(self.rewards, amount)?,
            CreditKind::Compensation => {
                self.compensation = self.issue(self.compensation, amount)?;
            }
        }
        Ok(())
    }

    fn issue(&self, counter: Decimal, amount: Decimal) -> Result<Decimal> {
        self.expected_supply()?
            .checked_add(amount)
            .ok_or(LedgerError::Overflow)?;
        counter.checked_add(amount).ok_or(LedgerError::Overflow)
    }

    /// Deposits + rewards + compensation.
    ///
    /// # Errors
    /// Returns [`LedgerError::Overflow`] if the sum is not representable.
    pub fn expected_supply(&self) -> Result<Decimal> {
        self.deposits
            .checked_add(self.rewards)
            .and_then(|sum| sum.checked_add(self.compensation))
            .ok_or(LedgerError::Overflow)
    }

    #[must_use]
    pub fn total_deposits(&self) -> Decimal {
        self.deposits
    }

    #[must_use]
    pub fn total_rewards(&self) -> Decimal {
        self.rewards
    }

    #[must_use]
    pub fn total_compensation(&self) -> Decimal {
        self.compensation
    }

    /// Compare the observed supply with the expected supply.
    ///
    /// # Errors
    /// Returns [`LedgerError::ConservationViolation`] if they differ.
    pub fn verify(&self, actual_supply: Decimal) -> Result<()> {
        let expected = self.expected_supply()?;
        if actual_supply != expected {
            return Err(LedgerError::ConservationViolation {
                reason: format!(
                    "actual supply {actual_supply} != expected {expected} \
                     (deposits={}, rewards={}, compensation={})",
                    self.deposits, self.rewards, self.compensation
                ),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_supply_is_zero() {
        let sc = SupplyConservation::new();
        assert_eq!(sc.expected_supply().unwrap(), Decimal::ZERO);
        assert!(sc.verify(Decimal::ZERO).is_ok());
    }

    #[test]
    fn all_sources_count() {
        let mut sc = SupplyConservation::new();
        sc.record_deposit(Decimal::new(1000, 0)).unwrap();
        sc.record_credit(CreditKind::Reward, Decimal::new(107, 0)).unwrap();
        sc.record_credit(CreditKind::Compensation, Decimal::new(35, 1)).unwrap();
        assert_eq!(sc.expected_supply().unwrap(), Decimal::new(11105, 1));
        assert!(sc.verify(Decimal::new(11105, 1)).is_ok());
    }

    #[test]
    fn verify_fails_when_imbalanced() {
        let mut sc = SupplyConservation::new();
        sc.record_deposit(Decimal::new(10, 0)).unwrap();
        let err = sc.verify(Decimal::new(11, 0)).unwrap_err();
        assert!(matches!(err, LedgerError::ConservationViolation { .. }));
        assert!(err.to_string().contains("deposits=10"));
    }

    #[test]
    fn supply_that_would_overflow_is_refused() {
        let mut sc = SupplyConservation::new();
        sc.record_deposit(Decimal::MAX).unwrap();
        let err = sc.record_credit(CreditKind::Reward, Decimal::ONE).unwrap_err();
        assert!(matches!(err, LedgerError::Overflow));
        assert!(sc.record_deposit(Decimal::ONE).is_err());
        assert_eq!(sc.total_rewards(), Decimal::ZERO);
        assert_eq!(sc.expected_supply().unwrap(), Decimal::MAX);
    }
}
