//! Pricing policies and the totals check they imply.
//!
//! A policy fixes the unit price of a service class and how a user payment
//! splits between provider and platform. Basis points left unallocated by
//! `provider_share_bps + platform_share_bps < 10 000` accrue to providers.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{
    AccountId, LedgerError, ModalityTotals, Result, ServiceClass, SettlementTotals,
    constants::BPS_DENOMINATOR,
};

/// Apply a basis-point rate to an amount; `None` if the product overflows.
#[must_use]
pub fn apply_bps(amount: Decimal, bps: u32) -> Option<Decimal> {
    amount
        .checked_mul(Decimal::from(bps))?
        .checked_div(Decimal::from(BPS_DENOMINATOR))
}

/// Revenue split and price for one service class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingPolicy {
    /// Price per usage unit. Zero disables the price check.
    pub unit_price: Decimal,
    pub provider_share_bps: u32,
    pub platform_share_bps: u32,
    pub user_discount_bps: u32,
}

impl PricingPolicy {
    /// Check share and discount bounds.
    ///
    /// # Errors
    /// Returns [`LedgerError::InvalidPolicy`] if shares exceed 100%, the
    /// discount exceeds 100%, or the unit price is negative.
    pub fn validate(&self) -> Result<()> {
        let shares = u64::from(self.provider_share_bps) + u64::from(self.platform_share_bps);
        if shares > u64::from(BPS_DENOMINATOR) {
            return Err(LedgerError::InvalidPolicy {
                reason: format!(
                    "provider {} + platform {} bps exceeds {BPS_DENOMINATOR}",
                    self.provider_share_bps, self.platform_share_bps
                ),
            });
        }
        if self.user_discount_bps > BPS_DENOMINATOR {
            return Err(LedgerError::InvalidPolicy {
                reason: format!("discount {} bps exceeds {BPS_DENOMINATOR}", self.user_discount_bps),
            });
        }
        if self.unit_price.is_sign_negative() {
            return Err(LedgerError::InvalidPolicy {
                reason: format!("negative unit price {}", self.unit_price),
            });
        }
        Ok(())
    }

    /// Expected user payment for `usage_count` units after discount, or
    /// `None` if it is not representable.
    #[must_use]
    pub fn expected_payment(&self, usage_count: u64) -> Option<Decimal> {
        let gross = Decimal::from(usage_count).checked_mul(self.unit_price)?;
        apply_bps(gross, BPS_DENOMINATOR.saturating_sub(self.user_discount_bps))
    }

    /// Check committed totals against this policy.
    ///
    /// Every bucket must balance, the platform fee must match its share of
    /// the payment, the provider must receive at least its share, and when a
    /// unit price is set the payment must match the discounted price.
    ///
    /// # Errors
    /// Returns [`LedgerError::InvalidTotals`] describing the first failure.
    pub fn check_totals(&self, totals: &SettlementTotals, tolerance: Decimal) -> Result<()> {
        if totals.is_empty() {
            return Err(LedgerError::InvalidTotals {
                reason: "no modality buckets".into(),
            });
        }
        for (modality, bucket) in totals.buckets() {
            self.check_bucket(bucket, tolerance)
                .map_err(|reason| LedgerError::InvalidTotals {
                    reason: format!("{modality}: {reason}"),
                })?;
        }
        if !totals.is_summable() {
            return Err(LedgerError::InvalidTotals {
                reason: "settlement totals overflow".into(),
            });
        }
        Ok(())
    }

    fn check_bucket(
        &self,
        bucket: &ModalityTotals,
        tolerance: Decimal,
    ) -> std::result::Result<(), String> {
        if bucket.has_negative_amount() {
            return Err("negative amount".into());
        }
        if bucket.imbalance().is_none() {
            return Err(format!(
                "provider {} + fee {} overflows",
                bucket.provider_reward, bucket.platform_fee
            ));
        }
        if !bucket.is_balanced(tolerance) {
            return Err(format!(
                "provider {} + fee {} != payment {}",
                bucket.provider_reward, bucket.platform_fee, bucket.user_payment
            ));
        }
        let expected_fee = apply_bps(bucket.user_payment, self.platform_share_bps)
            .ok_or_else(|| format!("payment {} too large", bucket.user_payment))?;
        if (bucket.platform_fee - expected_fee).abs() > tolerance {
            return Err(format!(
                "platform fee {} != {expected_fee} ({} bps of {})",
                bucket.platform_fee, self.platform_share_bps, bucket.user_payment
            ));
        }
        let provider_floor = apply_bps(bucket.user_payment, self.provider_share_bps)
            .ok_or_else(|| format!("payment {} too large", bucket.user_payment))?;
        if bucket.provider_reward < provider_floor - tolerance {
            return Err(format!(
                "provider reward {} below share {provider_floor}",
                bucket.provider_reward
            ));
        }
        if self.unit_price > Decimal::ZERO {
            let expected = self.expected_payment(bucket.usage_count).ok_or_else(|| {
                format!(
                    "{} units at {} overflows",
                    bucket.usage_count, self.unit_price
                )
            })?;
            if (bucket.user_payment - expected).abs() > tolerance {
                return Err(format!(
                    "payment {} != {expected} for {} units at {}",
                    bucket.user_payment, bucket.usage_count, self.unit_price
                ));
            }
        }
        Ok(())
    }
}

/// One stored version of a policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyVersion {
    pub service_class: ServiceClass,
    pub policy: PricingPolicy,
    pub effective_at: DateTime<Utc>,
    pub set_by: AccountId,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Modality;

    fn dec(n: i64) -> Decimal {
        Decimal::new(n, 0)
    }

    fn policy() -> PricingPolicy {
        PricingPolicy {
            unit_price: Decimal::ONE,
            provider_share_bps: 9_524,
            platform_share_bps: 476,
            user_discount_bps: 0,
        }
    }

    fn tol() -> Decimal {
        Decimal::new(1, 2)
    }

    fn text(count: u64, provider: i64, fee: i64, payment: i64) -> SettlementTotals {
        SettlementTotals::new().with_bucket(
            Modality::Text,
            ModalityTotals::new(count, dec(provider), dec(fee), dec(payment)),
        )
    }

    #[test]
    fn validate_bounds() {
        assert!(policy().validate().is_ok());
        let over = PricingPolicy {
            provider_share_bps: 9_600,
            ..policy()
        };
        assert!(matches!(over.validate(), Err(LedgerError::InvalidPolicy { .. })));
        let discount = PricingPolicy {
            user_discount_bps: 10_001,
            ..policy()
        };
        assert!(discount.validate().is_err());
        let negative = PricingPolicy {
            unit_price: dec(-1),
            ..policy()
        };
        assert!(negative.validate().is_err());
    }

    #[test]
    fn reference_totals_pass() {
        policy().check_totals(&text(105, 100, 5, 105), tol()).unwrap();
    }

    #[test]
    fn unbalanced_totals_fail() {
        let err = policy().check_totals(&text(105, 100, 5, 106), tol()).unwrap_err();
        assert!(matches!(err, LedgerError::InvalidTotals { .. }));
    }

    #[test]
    fn wrong_fee_share_fails() {
        // balanced, but the fee is 10% instead of 4.76%
        let t = SettlementTotals::new().with_bucket(
            Modality::Text,
            ModalityTotals::new(105, Decimal::new(945, 1), Decimal::new(105, 1), dec(105)),
        );
        assert!(policy().check_totals(&t, tol()).is_err());
    }

    #[test]
    fn wrong_unit_price_fails() {
        assert!(policy().check_totals(&text(90, 100, 5, 105), tol()).is_err());
    }

    #[test]
    fn zero_unit_price_skips_price_check() {
        let p = PricingPolicy {
            unit_price: Decimal::ZERO,
            ..policy()
        };
        p.check_totals(&text(1, 100, 5, 105), tol()).unwrap();
    }

    #[test]
    fn unallocated_bps_accrue_to_provider() {
        let p = PricingPolicy {
            unit_price: Decimal::ZERO,
            provider_share_bps: 9_000,
            platform_share_bps: 476,
            user_discount_bps: 0,
        };
        p.check_totals(&text(1, 100, 5, 105), tol()).unwrap();
    }

    #[test]
    fn discount_lowers_expected_payment() {
        let p = PricingPolicy {
            unit_price: dec(2),
            user_discount_bps: 2_500,
            ..policy()
        };
        assert_eq!(p.expected_payment(10), Some(dec(15)));
    }

    #[test]
    fn apply_bps_reports_overflow() {
        assert_eq!(apply_bps(dec(7), 5_000), Some(Decimal::new(35, 1)));
        assert_eq!(apply_bps(Decimal::MAX, 5_000), None);
    }

    #[test]
    fn extreme_amounts_are_invalid_totals() {
        let t = SettlementTotals::new().with_bucket(
            Modality::Text,
            ModalityTotals::new(1, Decimal::MAX, dec(5), Decimal::MAX),
        );
        let err = policy().check_totals(&t, tol()).unwrap_err();
        assert!(matches!(err, LedgerError::InvalidTotals { .. }));

        let huge_price = PricingPolicy {
            unit_price: Decimal::MAX,
            ..policy()
        };
        assert_eq!(huge_price.expected_payment(2), None);
        assert!(huge_price.check_totals(&text(105, 100, 5, 105), tol()).is_err());
    }

    #[test]
    fn empty_and_negative_totals_fail() {
        assert!(policy().check_totals(&SettlementTotals::new(), tol()).is_err());
        assert!(policy().check_totals(&text(0, -5, 5, 0), tol()).is_err());
    }
}
