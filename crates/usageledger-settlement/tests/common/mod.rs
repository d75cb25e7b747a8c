//! Harness shared by the integration tests: a ledger with its operators, a
//! pool of funded challengers, and helpers to build epoch trees.

#![allow(dead_code)]

use std::sync::Once;

use chrono::{DateTime, Duration, Utc};
use ed25519_dalek::SigningKey;
use rust_decimal::Decimal;
use usageledger_proof::{UsageTree, UsageTreeBuilder};
use usageledger_settlement::{BalanceManager, SettlementLedger};
use usageledger_types::{
    AccountId, ClaimRequest, DisputeEvidence, DisputeKind, DisputeRequest, EpochId, LedgerConfig,
    Modality, ModalityTotals, PricingPolicy, Result, Role, ServiceClass, SettlementCommitment,
    SettlementTotals, SignedCommitment, test_keypair,
};

static TRACING: Once = Once::new();

/// Route ledger logs to the test writer; `RUST_LOG` picks the level.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

pub fn dec(n: i64) -> Decimal {
    Decimal::new(n, 0)
}

pub fn start_time() -> DateTime<Utc> {
    DateTime::from_timestamp(1_750_000_000, 0).unwrap()
}

pub fn text_class() -> ServiceClass {
    ServiceClass::new("text-inference")
}

/// 1.00 per call; 4.76% platform, 95.24% provider.
pub fn text_policy() -> PricingPolicy {
    PricingPolicy {
        unit_price: Decimal::ONE,
        provider_share_bps: 9_524,
        platform_share_bps: 476,
        user_discount_bps: 0,
    }
}

/// The 105-call epoch: provider 100, platform 5, users 105.
pub fn text_totals(provider_reward: i64, platform_fee: i64) -> SettlementTotals {
    let payment = provider_reward + platform_fee;
    SettlementTotals::new().with_bucket(
        Modality::Text,
        ModalityTotals::new(
            u64::try_from(payment).unwrap(),
            dec(provider_reward),
            dec(platform_fee),
            dec(payment),
        ),
    )
}

pub struct Harness {
    pub ledger: SettlementLedger<BalanceManager>,
    pub admin: AccountId,
    pub committer: AccountId,
    committer_key: SigningKey,
    pub arbiter: AccountId,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(LedgerConfig::default())
    }

    pub fn with_config(config: LedgerConfig) -> Self {
        init_tracing();
        let (_, admin) = test_keypair(10);
        let (committer_key, committer) = test_keypair(11);
        let (_, arbiter) = test_keypair(12);
        let mut ledger =
            SettlementLedger::new(config, admin, BalanceManager::new(), start_time()).unwrap();
        ledger.grant_role(admin, committer, Role::Committer).unwrap();
        ledger.grant_role(admin, arbiter, Role::Arbiter).unwrap();
        ledger
            .set_policy(admin, text_class(), text_policy(), start_time())
            .unwrap();
        Self {
            ledger,
            admin,
            committer,
            committer_key,
            arbiter,
        }
    }

    /// A challenger account with `funds` available.
    pub fn funded(&mut self, seed: u8, funds: i64) -> AccountId {
        let (_, account) = test_keypair(seed);
        self.ledger.tokens_mut().deposit(account, dec(funds)).unwrap();
        account
    }

    pub fn window(&self) -> Duration {
        self.ledger.config().dispute_window()
    }

    pub fn sign(
        &self,
        epoch_id: EpochId,
        root: [u8; 32],
        totals: SettlementTotals,
    ) -> SignedCommitment {
        SignedCommitment::sign(
            SettlementCommitment {
                epoch_id,
                merkle_root: root,
                totals,
                service_class: text_class(),
            },
            &self.committer_key,
        )
    }

    pub fn commit(
        &mut self,
        tree: &UsageTree,
        epoch_id: EpochId,
        totals: SettlementTotals,
    ) -> Result<EpochId> {
        let signed = self.sign(epoch_id, tree.root(), totals);
        self.ledger.commit_settlement(self.committer, signed)
    }

    /// Let the window run out and finalize.
    pub fn finalize_after_window(&mut self, epoch_id: EpochId) {
        let window = self.window();
        self.ledger.advance(window).unwrap();
        self.ledger.finalize_settlement(epoch_id).unwrap();
    }
}

/// Tree with one TEXT leaf per `(entity, amount)`.
pub fn text_tree(epoch_id: EpochId, leaves: &[(AccountId, i64)]) -> UsageTree {
    leaves
        .iter()
        .fold(UsageTreeBuilder::new(epoch_id), |b, (entity, amount)| {
            b.leaf(*entity, Modality::Text, dec(*amount))
        })
        .build()
}

pub fn claim_for(tree: &UsageTree, entity: AccountId) -> ClaimRequest {
    let (leaf, proof) = tree.inclusion_proof(entity, Modality::Text).unwrap();
    ClaimRequest {
        epoch_id: leaf.epoch_id,
        entity,
        modality: Modality::Text,
        amount: leaf.amount,
        proof,
    }
}

/// Challenge `entity`'s TEXT leaf, asserting `claimed` is the right amount.
pub fn challenge(tree: &UsageTree, entity: AccountId, claimed: i64, stake: i64) -> DisputeRequest {
    let (leaf, proof) = tree.inclusion_proof(entity, Modality::Text).unwrap();
    DisputeRequest {
        epoch_id: leaf.epoch_id,
        kind: DisputeKind::WrongReward,
        entity,
        modality: Modality::Text,
        claimed_amount: dec(claimed),
        evidence: DisputeEvidence::Inclusion {
            committed_amount: leaf.amount,
            proof,
        },
        stake: dec(stake),
    }
}

/// Claim that `entity` was left out of the epoch.
pub fn missing(tree: &UsageTree, entity: AccountId, claimed: i64, stake: i64) -> DisputeRequest {
    let (gap, proof) = tree.absence_proof(entity, Modality::Text).unwrap();
    DisputeRequest {
        epoch_id: gap.epoch_id,
        kind: DisputeKind::MissingEntry,
        entity,
        modality: Modality::Text,
        claimed_amount: dec(claimed),
        evidence: DisputeEvidence::Absence {
            lower: gap.lower,
            upper: gap.upper,
            proof,
        },
        stake: dec(stake),
    }
}
