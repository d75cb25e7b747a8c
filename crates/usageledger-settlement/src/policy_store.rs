//! Pricing Policy Store.
//!
//! Policies are versioned per service class by `effective_at`. A version is
//! never changed once stored; a new version supersedes it from its own
//! effective time onward. Lookups return the latest version effective at the
//! requested instant, so a settlement is always validated against the policy
//! that was in force when it was committed.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use usageledger_types::{
    AccountId, LedgerError, PolicyVersion, PricingPolicy, Result, ServiceClass, SettlementTotals,
};

#[derive(Debug, Default)]
pub struct PolicyStore {
    versions: HashMap<ServiceClass, BTreeMap<DateTime<Utc>, PolicyVersion>>,
}

impl PolicyStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule a new policy version.
    ///
    /// # Errors
    /// - [`LedgerError::InvalidPolicy`] if shares or discount are out of range
    /// - [`LedgerError::PolicyEffectiveInPast`] if `effective_at < now - grace`
    /// - [`LedgerError::PolicyAlreadyScheduled`] if a version already exists
    ///   at exactly `effective_at`
    pub fn set(
        &mut self,
        service_class: ServiceClass,
        policy: PricingPolicy,
        effective_at: DateTime<Utc>,
        set_by: AccountId,
        now: DateTime<Utc>,
        grace: Duration,
    ) -> Result<PolicyVersion> {
        policy.validate()?;
        let earliest = now
            .checked_sub_signed(grace)
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        if effective_at < earliest {
            return Err(LedgerError::PolicyEffectiveInPast {
                effective_at,
                earliest,
            });
        }
        let history = self.versions.entry(service_class.clone()).or_default();
        if history.contains_key(&effective_at) {
            return Err(LedgerError::PolicyAlreadyScheduled {
                class: service_class,
                effective_at,
            });
        }
        let version = PolicyVersion {
            service_class,
            policy,
            effective_at,
            set_by,
        };
        history.insert(effective_at, version.clone());
        Ok(version)
    }

    /// The version in force at `at`.
    ///
    /// # Errors
    /// Returns [`LedgerError::PolicyNotFound`] if no version is effective yet.
    pub fn get(&self, service_class: &ServiceClass, at: DateTime<Utc>) -> Result<&PolicyVersion> {
        let found = self
            .versions
            .get(service_class)
            .and_then(|history| history.range(..=at).next_back())
            .map(|(_, version)| version);
        tracing::debug!(
            class = %service_class,
            at = %at,
            found = found.is_some(),
            "Policy lookup"
        );
        found.ok_or_else(|| LedgerError::PolicyNotFound {
            class: service_class.clone(),
            at,
        })
    }

    /// Validate totals against the policy in force at `at`.
    ///
    /// # Errors
    /// [`LedgerError::PolicyNotFound`] or [`LedgerError::InvalidTotals`].
    pub fn validate_totals(
        &self,
        service_class: &ServiceClass,
        totals: &SettlementTotals,
        at: DateTime<Utc>,
        tolerance: Decimal,
    ) -> Result<()> {
        self.get(service_class, at)?
            .policy
            .check_totals(totals, tolerance)
    }

    /// All versions for a class, oldest first.
    pub fn history(&self, service_class: &ServiceClass) -> impl Iterator<Item = &PolicyVersion> {
        self.versions
            .get(service_class)
            .into_iter()
            .flat_map(BTreeMap::values)
    }
}
