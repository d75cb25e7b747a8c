//! Configuration for a ledger instance.

use chrono::Duration;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{LedgerError, Result, constants};

/// Tunables of the settlement ledger. Missing JSON fields take defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Seconds after `committed_at` during which disputes are accepted.
    pub dispute_window_secs: u64,
    /// Minimum challenger stake.
    pub min_stake: Decimal,
    /// How far in the past a new policy's `effective_at` may lie.
    pub policy_grace_secs: u64,
    /// Absolute tolerance for totals checks.
    pub rounding_tolerance: Decimal,
    /// Longest accepted Merkle proof.
    pub max_proof_depth: usize,
    /// Share of an upheld correction paid to the challenger.
    pub dispute_reward_bps: u32,
    /// Largest accepted `batch_distribute` request.
    pub max_batch_claims: usize,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        let (mantissa, scale) = constants::DEFAULT_ROUNDING_TOLERANCE;
        Self {
            dispute_window_secs: constants::DEFAULT_DISPUTE_WINDOW_SECS,
            min_stake: Decimal::new(constants::DEFAULT_MIN_STAKE, 0),
            policy_grace_secs: constants::DEFAULT_POLICY_GRACE_SECS,
            rounding_tolerance: Decimal::new(mantissa, scale),
            max_proof_depth: constants::MAX_PROOF_DEPTH,
            dispute_reward_bps: constants::DEFAULT_DISPUTE_REWARD_BPS,
            max_batch_claims: constants::DEFAULT_MAX_BATCH_CLAIMS,
        }
    }
}

impl LedgerConfig {
    /// Parse and validate a JSON configuration.
    ///
    /// # Errors
    /// Returns [`LedgerError::Serialization`] on malformed JSON and
    /// [`LedgerError::Configuration`] on out-of-range values.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Check every field is in range.
    ///
    /// # Errors
    /// Returns [`LedgerError::Configuration`] naming the offending field.
    pub fn validate(&self) -> Result<()> {
        if self.dispute_window_secs == 0 {
            return Err(LedgerError::Configuration(
                "dispute_window_secs must be positive".into(),
            ));
        }
        if self.dispute_window_secs > constants::MAX_DISPUTE_WINDOW_SECS {
            return Err(LedgerError::Configuration(format!(
                "dispute_window_secs {} exceeds {}",
                self.dispute_window_secs,
                constants::MAX_DISPUTE_WINDOW_SECS
            )));
        }
        if self.policy_grace_secs > constants::MAX_DISPUTE_WINDOW_SECS {
            return Err(LedgerError::Configuration(format!(
                "policy_grace_secs {} is unreasonably large",
                self.policy_grace_secs
            )));
        }
        if self.min_stake.is_sign_negative() {
            return Err(LedgerError::Configuration("min_stake is negative".into()));
        }
        if self.rounding_tolerance.is_sign_negative() {
            return Err(LedgerError::Configuration(
                "rounding_tolerance is negative".into(),
            ));
        }
        if self.max_proof_depth == 0 || self.max_proof_depth > constants::MAX_PROOF_DEPTH {
            return Err(LedgerError::Configuration(format!(
                "max_proof_depth must be in 1..={}",
                constants::MAX_PROOF_DEPTH
            )));
        }
        if self.dispute_reward_bps > constants::BPS_DENOMINATOR {
            return Err(LedgerError::Configuration(format!(
                "dispute_reward_bps {} exceeds {}",
                self.dispute_reward_bps,
                constants::BPS_DENOMINATOR
            )));
        }
        if self.max_batch_claims == 0 {
            return Err(LedgerError::Configuration(
                "max_batch_claims must be positive".into(),
            ));
        }
        Ok(())
    }

    #[must_use]
    pub fn dispute_window(&self) -> Duration {
        seconds(self.dispute_window_secs)
    }

    #[must_use]
    pub fn policy_grace(&self) -> Duration {
        seconds(self.policy_grace_secs)
    }
}

fn seconds(secs: u64) -> Duration {
    let clamped = secs.min(constants::MAX_DISPUTE_WINDOW_SECS);
    Duration::seconds(i64::try_from(clamped).unwrap_or_default())
}
