//! Settlement Ledger: the commit → dispute window → finalize state machine.
//!
//! ```text
//!   commit ──▶ OPEN ──raise──▶ DISPUTED
//!               ▲ │◀──last resolve──┘ │
//!               │ │ window closed,     │
//!               │ ▼ no open disputes   │
//!           FINALIZED      CANCELLED ◀─┘ (admin, from OPEN or DISPUTED)
//! ```
//!
//! The ledger is a deterministic state machine. It owns every settlement,
//! dispute and claim record and executes one transition at a time; ledger
//! time is supplied by the host through [`SettlementLedger::set_time`] and
//! never moves backwards. Every rejected call leaves all state unchanged:
//! checks run first, the event record is sealed next, and only then is
//! anything mutated.
//!
//! Dispute arbitration lives in [`crate::arbitrator`] and reward payout in
//! [`crate::distributor`]; both extend this type.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use usageledger_proof::{GapLeaf, UsageLeaf, verify_absence, verify_inclusion};
use usageledger_types::{
    AccountId, ClaimRecord, Dispute, DisputeEvidence, DisputeId, DisputeKind, DisputeRequest,
    DisputeStatus, EntityId, EpochId, FinalizeOutcome, LedgerConfig, LedgerError, LedgerEvent,
    LeafKey, PolicyVersion, PricingPolicy, Result, Role, ServiceClass, Settlement,
    SettlementState, SignedCommitment,
};

use crate::{
    access::AccessControl, balance_manager::BalanceManager, claim_registry::ClaimRegistry,
    event_log::EventLog, pause::PauseSwitch, policy_store::PolicyStore, token::TokenLedger,
};

/// The settlement core. Generic over the token seam so hosts can plug in
/// their own balance ledger.
#[derive(Debug)]
pub struct SettlementLedger<L: TokenLedger = BalanceManager> {
    pub(crate) config: LedgerConfig,
    pub(crate) now: DateTime<Utc>,
    pub(crate) access: AccessControl,
    pub(crate) pause: PauseSwitch,
    pub(crate) policies: PolicyStore,
    pub(crate) settlements: BTreeMap<EpochId, Settlement>,
    pub(crate) disputes: HashMap<DisputeId, Dispute>,
    pub(crate) disputes_by_epoch: BTreeMap<EpochId, Vec<DisputeId>>,
    /// Ledger-wide dispute counter feeding deterministic dispute IDs.
    pub(crate) dispute_seq: u64,
    pub(crate) claims: ClaimRegistry,
    pub(crate) tokens: L,
    pub(crate) events: EventLog,
}

impl<L: TokenLedger> SettlementLedger<L> {
    /// Create a ledger with `admin` as the genesis administrator.
    ///
    /// # Errors
    /// Returns [`LedgerError::Configuration`] if the config is invalid.
    pub fn new(
        config: LedgerConfig,
        admin: AccountId,
        tokens: L,
        genesis: DateTime<Utc>,
    ) -> Result<Self> {
        config.validate()?;
        tracing::info!(
            admin = %admin,
            dispute_window_secs = config.dispute_window_secs,
            min_stake = %config.min_stake,
            "Settlement ledger created"
        );
        Ok(Self {
            config,
            now: genesis,
            access: AccessControl::new(admin),
            pause: PauseSwitch::new(),
            policies: PolicyStore::new(),
            settlements: BTreeMap::new(),
            disputes: HashMap::new(),
            disputes_by_epoch: BTreeMap::new(),
            dispute_seq: 0,
            claims: ClaimRegistry::new(),
            tokens,
            events: EventLog::new(),
        })
    }

    // -----------------------------------------------------------------------
    // Clock
    // -----------------------------------------------------------------------

    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        self.now
    }

    /// Advance ledger time to `now`.
    ///
    /// # Errors
    /// Returns [`LedgerError::ClockRegression`] if `now` is earlier than the
    /// current ledger time.
    pub fn set_time(&mut self, now: DateTime<Utc>) -> Result<()> {
        if now < self.now {
            return Err(LedgerError::ClockRegression {
                current: self.now,
                requested: now,
            });
        }
        self.now = now;
        Ok(())
    }

    /// Advance ledger time by `delta`.
    ///
    /// # Errors
    /// Returns [`LedgerError::ClockRegression`] for a negative delta and
    /// [`LedgerError::Configuration`] if the result is out of range.
    pub fn advance(&mut self, delta: Duration) -> Result<()> {
        let target = self.now.checked_add_signed(delta).ok_or_else(|| {
            LedgerError::Configuration(format!("clock advance by {delta} is out of range"))
        })?;
        self.set_time(target)
    }

    // -----------------------------------------------------------------------
    // Administration
    // -----------------------------------------------------------------------

    /// Grant `role` to `account`. Returns `false` if already held.
    ///
    /// # Errors
    /// [`LedgerError::Unauthorized`] unless `caller` is an admin.
    pub fn grant_role(
        &mut self,
        caller: AccountId,
        account: AccountId,
        role: Role,
    ) -> Result<bool> {
        self.access.require(&caller, Role::Admin)?;
        if self.access.has_role(&account, role) {
            return Ok(false);
        }
        let record = self.events.seal(LedgerEvent::RoleGranted {
            account,
            role,
            by: caller,
        })?;
        self.access.grant(account, role);
        self.events.push(record);
        tracing::info!(account = %account, role = %role, by = %caller, "Role granted");
        Ok(true)
    }

    /// Revoke `role` from `account`. Returns `false` if not held.
    ///
    /// # Errors
    /// [`LedgerError::Unauthorized`] unless `caller` is an admin;
    /// [`LedgerError::InvalidTransition`] when revoking the last admin.
    pub fn revoke_role(
        &mut self,
        caller: AccountId,
        account: AccountId,
        role: Role,
    ) -> Result<bool> {
        self.access.require(&caller, Role::Admin)?;
        if !self.access.has_role(&account, role) {
            return Ok(false);
        }
        let record = self.events.seal(LedgerEvent::RoleRevoked {
            account,
            role,
            by: caller,
        })?;
        self.access.revoke(&account, role)?;
        self.events.push(record);
        tracing::info!(account = %account, role = %role, by = %caller, "Role revoked");
        Ok(true)
    }

    /// Stop commits, disputes, finalization and claims. Returns `false` if
    /// already paused.
    ///
    /// # Errors
    /// [`LedgerError::Unauthorized`] unless `caller` is an admin.
    pub fn pause(&mut self, caller: AccountId, reason: &str) -> Result<bool> {
        self.access.require(&caller, Role::Admin)?;
        if self.pause.is_paused() {
            return Ok(false);
        }
        let record = self.events.seal(LedgerEvent::LedgerPaused {
            by: caller,
            reason: reason.to_string(),
            at: self.now,
        })?;
        self.pause.pause(caller, reason.to_string(), self.now);
        self.events.push(record);
        tracing::warn!(by = %caller, reason, "Ledger paused");
        Ok(true)
    }

    /// Lift a pause. Returns `false` if not paused.
    ///
    /// # Errors
    /// [`LedgerError::Unauthorized`] unless `caller` is an admin.
    pub fn unpause(&mut self, caller: AccountId) -> Result<bool> {
        self.access.require(&caller, Role::Admin)?;
        if !self.pause.is_paused() {
            return Ok(false);
        }
        let record = self.events.seal(LedgerEvent::LedgerResumed {
            by: caller,
            at: self.now,
        })?;
        self.pause.resume();
        self.events.push(record);
        tracing::info!(by = %caller, "Ledger resumed");
        Ok(true)
    }

    // -----------------------------------------------------------------------
    // Pricing policies
    // -----------------------------------------------------------------------

    /// Schedule a pricing policy version for a service class.
    ///
    /// # Errors
    /// [`LedgerError::Unauthorized`] unless `caller` is an admin, plus the
    /// errors of [`PolicyStore::set`].
    pub fn set_policy(
        &mut self,
        caller: AccountId,
        service_class: ServiceClass,
        policy: PricingPolicy,
        effective_at: DateTime<Utc>,
    ) -> Result<PolicyVersion> {
        self.access.require(&caller, Role::Admin)?;
        let record = self.events.seal(LedgerEvent::PolicySet {
            service_class: service_class.clone(),
            effective_at,
            set_by: caller,
        })?;
        let version = self.policies.set(
            service_class,
            policy,
            effective_at,
            caller,
            self.now,
            self.config.policy_grace(),
        )?;
        self.events.push(record);
        tracing::info!(
            class = %version.service_class,
            effective_at = %effective_at,
            provider_bps = policy.provider_share_bps,
            platform_bps = policy.platform_share_bps,
            "Pricing policy scheduled"
        );
        Ok(version)
    }

    /// The policy version in force for `service_class` at `at`.
    ///
    /// # Errors
    /// [`LedgerError::PolicyNotFound`].
    pub fn get_policy(
        &self,
        service_class: &ServiceClass,
        at: DateTime<Utc>,
    ) -> Result<&PolicyVersion> {
        self.policies.get(service_class, at)
    }

    // -----------------------------------------------------------------------
    // Commit
    // -----------------------------------------------------------------------

    /// Record a signed per-epoch commitment as a new OPEN settlement.
    ///
    /// # Errors
    /// - [`LedgerError::LedgerPaused`]
    /// - [`LedgerError::Unauthorized`] unless `caller` is a committer
    /// - [`LedgerError::InvalidSignature`] unless `caller` signed it
    /// - [`LedgerError::SettlementAlreadyExists`] / [`LedgerError::EpochOutOfOrder`]
    /// - [`LedgerError::PolicyNotFound`] / [`LedgerError::InvalidTotals`]
    pub fn commit_settlement(
        &mut self,
        caller: AccountId,
        signed: SignedCommitment,
    ) -> Result<EpochId> {
        self.pause.check()?;
        self.access.require(&caller, Role::Committer)?;
        signed.verify(&caller)?;

        let commitment = signed.commitment;
        let epoch_id = commitment.epoch_id;
        if self.settlements.contains_key(&epoch_id) {
            return Err(LedgerError::SettlementAlreadyExists(epoch_id));
        }
        if let Some(latest) = self.latest_epoch() {
            if epoch_id < latest {
                return Err(LedgerError::EpochOutOfOrder {
                    epoch: epoch_id,
                    latest,
                });
            }
        }
        self.policies.validate_totals(
            &commitment.service_class,
            &commitment.totals,
            self.now,
            self.config.rounding_tolerance,
        )?;

        let fee_reserve = commitment.totals.platform_fee()?;
        let user_payment = commitment.totals.user_payment()?;
        let provider_reward = commitment.totals.provider_reward()?;
        let record = self.events.seal(LedgerEvent::SettlementCommitted {
            epoch_id,
            merkle_root: commitment.merkle_root,
            committer: caller,
            user_payment,
            at: self.now,
        })?;

        tracing::info!(
            epoch = %epoch_id,
            root = hex::encode(commitment.merkle_root),
            class = %commitment.service_class,
            provider_reward = %provider_reward,
            platform_fee = %fee_reserve,
            "Settlement committed"
        );
        self.settlements.insert(
            epoch_id,
            Settlement {
                epoch_id,
                merkle_root: commitment.merkle_root,
                totals: commitment.totals,
                service_class: commitment.service_class,
                committed_at: self.now,
                committer: caller,
                state: SettlementState::Open,
                open_dispute_count: 0,
                fee_reserve,
                distributed: BTreeMap::new(),
                corrections: Vec::new(),
                finalized_at: None,
                cancelled_at: None,
            },
        );
        self.events.push(record);
        Ok(epoch_id)
    }

    // -----------------------------------------------------------------------
    // Disputes
    // -----------------------------------------------------------------------

    /// Challenge an OPEN or DISPUTED settlement inside its dispute window.
    ///
    /// The challenger's stake is escrowed until the arbiter resolves the
    /// dispute.
    ///
    /// # Errors
    /// - [`LedgerError::LedgerPaused`], [`LedgerError::UnknownEpoch`]
    /// - [`LedgerError::SettlementNotDisputable`] / [`LedgerError::SettlementCancelled`]
    /// - [`LedgerError::TooLate`] at or after `committed_at + window`
    /// - [`LedgerError::InsufficientStake`], [`LedgerError::InvalidAmount`]
    /// - [`LedgerError::InvalidProof`] if the evidence does not verify
    /// - [`LedgerError::InsufficientBalance`] if the stake cannot be escrowed
    pub fn raise_dispute(
        &mut self,
        challenger: AccountId,
        request: DisputeRequest,
    ) -> Result<DisputeId> {
        self.pause.check()?;
        let settlement = self.settlement_ref(request.epoch_id)?;
        match settlement.state {
            SettlementState::Open | SettlementState::Disputed => {}
            SettlementState::Cancelled => {
                return Err(LedgerError::SettlementCancelled(request.epoch_id));
            }
            SettlementState::Finalized => {
                return Err(LedgerError::SettlementNotDisputable {
                    epoch: request.epoch_id,
                    state: settlement.state,
                });
            }
        }
        let closes_at = settlement.window_closes_at(self.config.dispute_window());
        if self.now >= closes_at {
            return Err(LedgerError::TooLate {
                closed_at: closes_at,
                now: self.now,
            });
        }
        if request.stake < self.config.min_stake {
            return Err(LedgerError::InsufficientStake {
                minimum: self.config.min_stake,
                provided: request.stake,
            });
        }
        if request.claimed_amount <= Decimal::ZERO {
            return Err(LedgerError::InvalidAmount {
                reason: format!("claimed amount must be positive, got {}", request.claimed_amount),
            });
        }
        self.check_evidence(settlement, &request)?;

        let dispute_id = DisputeId::deterministic(request.epoch_id, self.dispute_seq);
        let record = self.events.seal(LedgerEvent::DisputeRaised {
            dispute_id,
            epoch_id: request.epoch_id,
            challenger,
            kind: request.kind,
            entity: request.entity,
            modality: request.modality,
            stake: request.stake,
            at: self.now,
        })?;
        self.tokens.lock_stake(challenger, request.stake)?;

        let epoch_id = request.epoch_id;
        let settlement = self.settlement_mut(epoch_id)?;
        if settlement.state == SettlementState::Open {
            settlement.transition(SettlementState::Disputed)?;
        }
        settlement.open_dispute_count += 1;
        let open = settlement.open_dispute_count;

        tracing::info!(
            dispute = %dispute_id,
            epoch = %epoch_id,
            challenger = %challenger,
            kind = %request.kind,
            entity = %request.entity,
            modality = %request.modality,
            stake = %request.stake,
            open,
            "Dispute raised"
        );
        self.disputes.insert(
            dispute_id,
            Dispute {
                dispute_id,
                epoch_id,
                challenger,
                kind: request.kind,
                entity: request.entity,
                modality: request.modality,
                claimed_amount: request.claimed_amount,
                evidence: request.evidence,
                stake: request.stake,
                status: DisputeStatus::Pending,
                raised_at: self.now,
                resolved_at: None,
                verdict: None,
                compensation: Decimal::ZERO,
            },
        );
        self.disputes_by_epoch
            .entry(epoch_id)
            .or_default()
            .push(dispute_id);
        self.dispute_seq += 1;
        self.events.push(record);
        Ok(dispute_id)
    }

    fn check_evidence(&self, settlement: &Settlement, request: &DisputeRequest) -> Result<()> {
        let root = &settlement.merkle_root;
        let depth = self.config.max_proof_depth;
        let verified = match (request.kind, &request.evidence) {
            (
                DisputeKind::WrongCount | DisputeKind::WrongReward,
                DisputeEvidence::Inclusion {
                    committed_amount,
                    proof,
                },
            ) => {
                let leaf = UsageLeaf {
                    epoch_id: request.epoch_id,
                    entity: request.entity,
                    modality: request.modality,
                    amount: *committed_amount,
                };
                verify_inclusion(root, &leaf, proof, depth)
            }
            (DisputeKind::MissingEntry, DisputeEvidence::Absence { lower, upper, proof }) => {
                let gap = GapLeaf {
                    epoch_id: request.epoch_id,
                    lower: *lower,
                    upper: *upper,
                };
                let key = LeafKey::new(request.entity, request.modality);
                verify_absence(root, &key, &gap, proof, depth)
            }
            (kind, _) => {
                return Err(LedgerError::InvalidProof {
                    reason: format!("evidence type does not match dispute kind {kind}"),
                });
            }
        };
        if verified {
            Ok(())
        } else {
            tracing::warn!(
                epoch = %request.epoch_id,
                entity = %request.entity,
                kind = %request.kind,
                proof_len = request.evidence.proof_len(),
                "Dispute evidence rejected"
            );
            Err(LedgerError::InvalidProof {
                reason: format!(
                    "evidence for {} {} does not verify against root {}",
                    request.entity,
                    request.modality,
                    hex::encode(root)
                ),
            })
        }
    }

    // -----------------------------------------------------------------------
    // Finalize / cancel
    // -----------------------------------------------------------------------

    /// Make a settlement's totals authoritative once its window has closed
    /// and no dispute is pending. Anyone may call it; repeated calls on a
    /// FINALIZED settlement are no-ops.
    ///
    /// # Errors
    /// - [`LedgerError::LedgerPaused`], [`LedgerError::UnknownEpoch`]
    /// - [`LedgerError::SettlementCancelled`]
    /// - [`LedgerError::TooEarly`] before `committed_at + window`
    /// - [`LedgerError::UnresolvedDisputes`] while disputes are pending
    pub fn finalize_settlement(&mut self, epoch_id: EpochId) -> Result<FinalizeOutcome> {
        self.pause.check()?;
        let settlement = self.settlement_ref(epoch_id)?;
        match settlement.state {
            SettlementState::Finalized => {
                tracing::debug!(epoch = %epoch_id, "Settlement already finalized");
                return Ok(FinalizeOutcome::AlreadyFinalized);
            }
            SettlementState::Cancelled => return Err(LedgerError::SettlementCancelled(epoch_id)),
            SettlementState::Open | SettlementState::Disputed => {}
        }
        let allowed_at = settlement.window_closes_at(self.config.dispute_window());
        if self.now < allowed_at {
            return Err(LedgerError::TooEarly {
                allowed_at,
                now: self.now,
            });
        }
        if settlement.open_dispute_count > 0 {
            return Err(LedgerError::UnresolvedDisputes {
                epoch: epoch_id,
                open: settlement.open_dispute_count,
            });
        }

        let provider_reward = settlement.totals.provider_reward()?;
        let record = self.events.seal(LedgerEvent::SettlementFinalized {
            epoch_id,
            at: self.now,
        })?;
        let now = self.now;
        let settlement = self.settlement_mut(epoch_id)?;
        settlement.transition(SettlementState::Finalized)?;
        settlement.finalized_at = Some(now);
        tracing::info!(
            epoch = %epoch_id,
            provider_reward = %provider_reward,
            corrections = settlement.corrections.len(),
            "Settlement finalized"
        );
        self.events.push(record);
        Ok(FinalizeOutcome::Finalized)
    }

    /// Emergency action: void an OPEN or DISPUTED settlement. Pending
    /// disputes stay pending and are still resolved by the arbiter.
    ///
    /// # Errors
    /// - [`LedgerError::Unauthorized`] unless `caller` is an admin
    /// - [`LedgerError::UnknownEpoch`], [`LedgerError::SettlementCancelled`]
    /// - [`LedgerError::InvalidTransition`] for a FINALIZED settlement
    pub fn cancel_settlement(
        &mut self,
        caller: AccountId,
        epoch_id: EpochId,
        reason: &str,
    ) -> Result<()> {
        self.access.require(&caller, Role::Admin)?;
        let settlement = self.settlement_ref(epoch_id)?;
        if settlement.state == SettlementState::Cancelled {
            return Err(LedgerError::SettlementCancelled(epoch_id));
        }
        if !settlement.state.can_transition_to(SettlementState::Cancelled) {
            return Err(LedgerError::InvalidTransition {
                reason: format!("settlement {epoch_id} is {}", settlement.state),
            });
        }
        let record = self.events.seal(LedgerEvent::SettlementCancelled {
            epoch_id,
            reason: reason.to_string(),
            at: self.now,
        })?;
        let now = self.now;
        let settlement = self.settlement_mut(epoch_id)?;
        settlement.transition(SettlementState::Cancelled)?;
        settlement.cancelled_at = Some(now);
        tracing::warn!(
            epoch = %epoch_id,
            by = %caller,
            reason,
            pending_disputes = settlement.open_dispute_count,
            "Settlement cancelled"
        );
        self.events.push(record);
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    #[must_use]
    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    #[must_use]
    pub fn settlement(&self, epoch_id: EpochId) -> Option<&Settlement> {
        self.settlements.get(&epoch_id)
    }

    pub fn settlements(&self) -> impl Iterator<Item = &Settlement> {
        self.settlements.values()
    }

    #[must_use]
    pub fn latest_epoch(&self) -> Option<EpochId> {
        self.settlements.keys().next_back().copied()
    }

    #[must_use]
    pub fn dispute(&self, dispute_id: DisputeId) -> Option<&Dispute> {
        self.disputes.get(&dispute_id)
    }

    /// Disputes raised against an epoch, in the order they were raised.
    pub fn disputes_for(&self, epoch_id: EpochId) -> impl Iterator<Item = &Dispute> {
        self.disputes_by_epoch
            .get(&epoch_id)
            .into_iter()
            .flatten()
            .filter_map(|id| self.disputes.get(id))
    }

    #[must_use]
    pub fn claim_record(&self, epoch_id: EpochId, entity: &EntityId) -> Option<&ClaimRecord> {
        self.claims.get(epoch_id, entity)
    }

    #[must_use]
    pub fn claims(&self) -> &ClaimRegistry {
        &self.claims
    }

    #[must_use]
    pub fn events(&self) -> &EventLog {
        &self.events
    }

    #[must_use]
    pub fn access(&self) -> &AccessControl {
        &self.access
    }

    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.pause.is_paused()
    }

    #[must_use]
    pub fn tokens(&self) -> &L {
        &self.tokens
    }

    /// Direct access to the token ledger (deposits, host-side transfers).
    pub fn tokens_mut(&mut self) -> &mut L {
        &mut self.tokens
    }

    /// Re-check every ledger-wide invariant.
    ///
    /// - the event chain is intact
    /// - every bucket still balances
    /// - claims never exceed a bucket's provider reward
    /// - reserve plus paid compensation equals the committed platform fee
    /// - each open-dispute counter matches the pending disputes
    /// - the token ledger's own supply invariant holds
    ///
    /// # Errors
    /// Returns [`LedgerError::ConservationViolation`] or
    /// [`LedgerError::EventChainBroken`] describing the first failure.
    pub fn audit(&self) -> Result<()> {
        self.events.verify_chain()?;
        for settlement in self.settlements.values() {
            let epoch = settlement.epoch_id;
            settlement
                .totals
                .ensure_balanced(self.config.rounding_tolerance)
                .map_err(|e| violation(epoch, &e.to_string()))?;
            for (modality, paid) in &settlement.distributed {
                if settlement.remaining_reward(*modality) < Decimal::ZERO {
                    return Err(violation(epoch, &format!("{modality} paid {paid} exceeds pool")));
                }
            }
            let platform_fee = settlement
                .totals
                .platform_fee()
                .map_err(|e| violation(epoch, &e.to_string()))?;
            let accounted = settlement
                .fee_reserve
                .checked_add(settlement.compensation_paid());
            if settlement.fee_reserve.is_sign_negative() || accounted != Some(platform_fee) {
                return Err(violation(
                    epoch,
                    &format!(
                        "reserve {} + compensation {} != platform fee {platform_fee}",
                        settlement.fee_reserve,
                        settlement.compensation_paid(),
                    ),
                ));
            }
            let pending = self.disputes_for(epoch).filter(|d| d.is_pending()).count();
            if pending != settlement.open_dispute_count as usize {
                return Err(violation(
                    epoch,
                    &format!(
                        "{pending} pending disputes, counter says {}",
                        settlement.open_dispute_count
                    ),
                ));
            }
        }
        self.tokens.verify_conservation()
    }

    pub(crate) fn settlement_ref(&self, epoch_id: EpochId) -> Result<&Settlement> {
        self.settlements
            .get(&epoch_id)
            .ok_or(LedgerError::UnknownEpoch(epoch_id))
    }

    pub(crate) fn settlement_mut(&mut self, epoch_id: EpochId) -> Result<&mut Settlement> {
        self.settlements
            .get_mut(&epoch_id)
            .ok_or(LedgerError::UnknownEpoch(epoch_id))
    }
}

fn violation(epoch: EpochId, reason: &str) -> LedgerError {
    LedgerError::ConservationViolation {
        reason: format!("{epoch}: {reason}"),
    }
}
