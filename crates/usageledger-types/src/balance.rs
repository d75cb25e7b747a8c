//! Balance tracking types for the stake escrow model.
//!
//! Every account has an `available` balance (withdrawable, usable as stake)
//! and an `escrowed` balance (locked behind pending disputes).

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A single account balance in the reward token.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct BalanceEntry {
    pub available: Decimal,
    /// Locked as dispute stake.
    pub escrowed: Decimal,
}

impl BalanceEntry {
    #[must_use]
    pub fn new() -> Self {
        Self {
            available: Decimal::ZERO,
            escrowed: Decimal::ZERO,
        }
    }

    /// Total balance (available + escrowed), saturating at `Decimal::MAX`.
    #[must_use]
    pub fn total(&self) -> Decimal {
        self.available.saturating_add(self.escrowed)
    }

    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.available.is_zero() && self.escrowed.is_zero()
    }
}

impl Default for BalanceEntry {
    fn default() -> Self {
        Self::new()
    }
}
