//! Shared fixture for unit and integration tests.
//!
//! Builds a ledger with one admin, committer, arbiter and funded challenger,
//! and a reference policy under which a TEXT bucket of 105 calls at 1.00
//! splits 100 / 5 / 105.

use chrono::{DateTime, Utc};
use ed25519_dalek::SigningKey;
use rust_decimal::Decimal;
use usageledger_proof::{UsageTree, UsageTreeBuilder};
use usageledger_types::{
    AccountId, DisputeEvidence, DisputeKind, DisputeRequest, EpochId, LedgerConfig, Modality,
    ModalityTotals, PricingPolicy, Result, Role, ServiceClass, SettlementCommitment,
    SettlementTotals, SignedCommitment, test_keypair,
};

use crate::{balance_manager::BalanceManager, ledger::SettlementLedger};

pub const ADMIN_SEED: u8 = 1;
pub const COMMITTER_SEED: u8 = 2;
pub const ARBITER_SEED: u8 = 3;
pub const CHALLENGER_SEED: u8 = 4;
pub const PROVIDER_SEED: u8 = 5;

/// Starting balance of the fixture challenger.
pub const CHALLENGER_FUNDS: i64 = 100;

#[must_use]
pub fn dec(n: i64) -> Decimal {
    Decimal::new(n, 0)
}

/// 2023-11-14T22:13:20Z.
#[must_use]
pub fn genesis() -> DateTime<Utc> {
    DateTime::from_timestamp(1_700_000_000, 0).unwrap_or_default()
}

pub struct Fixture {
    pub ledger: SettlementLedger<BalanceManager>,
    pub admin: AccountId,
    pub committer: AccountId,
    pub committer_key: SigningKey,
    pub arbiter: AccountId,
    pub challenger: AccountId,
    pub provider: AccountId,
}

impl Fixture {
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(LedgerConfig::default())
    }

    /// # Panics
    /// If the config is invalid or setup fails.
    #[must_use]
    pub fn with_config(config: LedgerConfig) -> Self {
        let (_, admin) = test_keypair(ADMIN_SEED);
        let (committer_key, committer) = test_keypair(COMMITTER_SEED);
        let (_, arbiter) = test_keypair(ARBITER_SEED);
        let (_, challenger) = test_keypair(CHALLENGER_SEED);
        let (_, provider) = test_keypair(PROVIDER_SEED);

        let mut ledger = SettlementLedger::new(config, admin, BalanceManager::new(), genesis())
            .expect("fixture config");
        ledger
            .grant_role(admin, committer, Role::Committer)
            .expect("grant committer");
        ledger
            .grant_role(admin, arbiter, Role::Arbiter)
            .expect("grant arbiter");
        ledger
            .set_policy(admin, Self::class(), Self::reference_policy(), genesis())
            .expect("reference policy");
        ledger
            .tokens_mut()
            .deposit(challenger, dec(CHALLENGER_FUNDS))
            .expect("fund challenger");

        Self {
            ledger,
            admin,
            committer,
            committer_key,
            arbiter,
            challenger,
            provider,
        }
    }

    #[must_use]
    pub fn class() -> ServiceClass {
        ServiceClass::new("inference")
    }

    /// Unit price 1.00, 4.76% platform fee, the rest to the provider.
    #[must_use]
    pub fn reference_policy() -> PricingPolicy {
        PricingPolicy {
            unit_price: Decimal::ONE,
            provider_share_bps: 9_524,
            platform_share_bps: 476,
            user_discount_bps: 0,
        }
    }

    /// TEXT: 105 calls, provider 100, fee 5, payment 105.
    #[must_use]
    pub fn reference_totals(&self) -> SettlementTotals {
        SettlementTotals::new().with_bucket(
            Modality::Text,
            ModalityTotals::new(105, dec(100), dec(5), dec(105)),
        )
    }

    /// One committed leaf: the provider's 100 TEXT reward.
    #[must_use]
    pub fn reference_tree(&self, epoch_id: EpochId) -> UsageTree {
        UsageTreeBuilder::new(epoch_id)
            .leaf(self.provider, Modality::Text, dec(100))
            .build()
    }

    #[must_use]
    pub fn signed(
        &self,
        epoch_id: EpochId,
        merkle_root: [u8; 32],
        totals: SettlementTotals,
    ) -> SignedCommitment {
        let commitment = SettlementCommitment {
            epoch_id,
            merkle_root,
            totals,
            service_class: Self::class(),
        };
        SignedCommitment::sign(commitment, &self.committer_key)
    }

    /// Commit the reference totals under `merkle_root`.
    ///
    /// # Errors
    /// Whatever `commit_settlement` rejects.
    pub fn commit(&mut self, epoch_id: EpochId, merkle_root: [u8; 32]) -> Result<EpochId> {
        let signed = self.signed(epoch_id, merkle_root, self.reference_totals());
        self.ledger.commit_settlement(self.committer, signed)
    }

    /// A WRONG_REWARD challenge against the provider's TEXT leaf, asserting
    /// 107 instead of the committed 100, with the minimum stake.
    ///
    /// # Panics
    /// If the provider has no TEXT leaf in `tree`.
    #[must_use]
    pub fn wrong_reward(tree: &UsageTree, epoch_id: EpochId) -> DisputeRequest {
        let (_, provider) = test_keypair(PROVIDER_SEED);
        let (leaf, proof) = tree
            .inclusion_proof(provider, Modality::Text)
            .expect("provider leaf");
        DisputeRequest {
            epoch_id,
            kind: DisputeKind::WrongReward,
            entity: provider,
            modality: Modality::Text,
            claimed_amount: dec(107),
            evidence: DisputeEvidence::Inclusion {
                committed_amount: leaf.amount,
                proof,
            },
            stake: dec(10),
        }
    }
}

impl Default for Fixture {
    fn default() -> Self {
        Self::new()
    }
}
