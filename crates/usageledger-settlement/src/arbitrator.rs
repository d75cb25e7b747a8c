//! Dispute Arbitrator.
//!
//! An upheld verdict corrects the disputed leaf and moves its bucket by the
//! same delta, refunds the stake and pays the challenger out of the
//! settlement's fee reserve. A rejected verdict slashes the stake into the
//! platform pool.
//!
//! Compensation is measured against the leaf the challenger disputed (the
//! committed amount, or zero for a missing entry), never against another
//! dispute's correction, so two disputes on the same leaf are paid on their
//! own verdicts whatever order they are resolved in.
//!
//! Resolution is not pause-gated, so escrowed stakes can always be released.

use rust_decimal::Decimal;
use usageledger_types::{
    AccountId, Dispute, DisputeEvidence, DisputeId, LedgerError, LedgerEvent, ModalityTotals,
    Result, Role, SettlementState, TotalsCorrection, Verdict, apply_bps,
};

use crate::{
    ledger::SettlementLedger,
    token::{CreditKind, TokenLedger},
};

impl<L: TokenLedger> SettlementLedger<L> {
    /// Record the arbiter's verdict on a pending dispute.
    ///
    /// # Errors
    /// - [`LedgerError::Unauthorized`] unless `caller` is an arbiter
    /// - [`LedgerError::UnknownDispute`], [`LedgerError::DisputeAlreadyResolved`]
    /// - [`LedgerError::InvalidAmount`] for a negative corrected amount
    /// - [`LedgerError::Overflow`] if the corrected totals are not representable
    /// - [`LedgerError::InsufficientReserve`] if compensation exceeds the
    ///   settlement's remaining fee reserve
    /// - token errors from releasing, slashing or crediting
    pub fn resolve_dispute(
        &mut self,
        caller: AccountId,
        dispute_id: DisputeId,
        verdict: Verdict,
    ) -> Result<Dispute> {
        self.access.require(&caller, Role::Arbiter)?;
        let dispute = self
            .disputes
            .get(&dispute_id)
            .ok_or(LedgerError::UnknownDispute(dispute_id))?;
        if !dispute.is_pending() {
            return Err(LedgerError::DisputeAlreadyResolved(dispute_id));
        }
        let dispute = dispute.clone();
        let settlement = self.settlement_ref(dispute.epoch_id)?;
        let cancelled = settlement.state == SettlementState::Cancelled;

        let correction = match verdict {
            Verdict::Upheld { corrected_amount } if !cancelled => {
                Some(self.plan_correction(&dispute, corrected_amount)?)
            }
            Verdict::Upheld { corrected_amount } => {
                ensure_non_negative(corrected_amount)?;
                None
            }
            Verdict::Rejected => None,
        };
        let compensation = correction.as_ref().map_or(Decimal::ZERO, |c| c.compensation);

        let record = self.events.seal(LedgerEvent::DisputeResolved {
            dispute_id,
            epoch_id: dispute.epoch_id,
            verdict,
            compensation,
            at: self.now,
        })?;

        match verdict {
            Verdict::Upheld { .. } => self.refund_and_compensate(&dispute, compensation)?,
            Verdict::Rejected => {
                self.tokens.slash_stake(dispute.challenger, dispute.stake)?;
                tracing::warn!(
                    dispute = %dispute_id,
                    challenger = %dispute.challenger,
                    stake = %dispute.stake,
                    "Dispute rejected, stake slashed"
                );
            }
        }

        let now = self.now;
        let settlement = self.settlement_mut(dispute.epoch_id)?;
        if let Some(applied) = correction {
            tracing::info!(
                dispute = %dispute_id,
                entity = %applied.entity,
                modality = %applied.modality,
                previous = %applied.previous_amount,
                corrected = %applied.corrected_amount,
                compensation = %applied.compensation,
                "Totals corrected"
            );
            settlement.totals.set_bucket(applied.modality, applied.corrected);
            settlement.fee_reserve -= applied.compensation;
            settlement.corrections.push(applied);
        }
        settlement.open_dispute_count = settlement.open_dispute_count.saturating_sub(1);
        if settlement.open_dispute_count == 0 && settlement.state == SettlementState::Disputed {
            settlement.transition(SettlementState::Open)?;
        }
        let open = settlement.open_dispute_count;

        let stored = self
            .disputes
            .get_mut(&dispute_id)
            .ok_or(LedgerError::UnknownDispute(dispute_id))?;
        stored.resolve(verdict, compensation, now)?;
        let resolved = stored.clone();
        self.events.push(record);

        tracing::info!(
            dispute = %dispute_id,
            epoch = %resolved.epoch_id,
            status = %resolved.status,
            compensation = %compensation,
            open,
            "Dispute resolved"
        );
        Ok(resolved)
    }

    /// Work out the corrected bucket and compensation for an upheld verdict
    /// without touching any state.
    fn plan_correction(
        &self,
        dispute: &Dispute,
        corrected_amount: Decimal,
    ) -> Result<TotalsCorrection> {
        ensure_non_negative(corrected_amount)?;
        let settlement = self.settlement_ref(dispute.epoch_id)?;

        let committed_amount = match &dispute.evidence {
            DisputeEvidence::Inclusion {
                committed_amount, ..
            } => Some(*committed_amount),
            DisputeEvidence::Absence { .. } => None,
        };
        let baseline = committed_amount.unwrap_or(Decimal::ZERO);
        let previous_amount = settlement
            .latest_correction(&dispute.entity, dispute.modality)
            .map_or(baseline, |c| c.corrected_amount);
        let delta = corrected_amount
            .checked_sub(previous_amount)
            .ok_or(LedgerError::Overflow)?;

        let previous = settlement
            .totals
            .bucket(dispute.modality)
            .copied()
            .unwrap_or_default();
        let provider_reward = previous
            .provider_reward
            .checked_add(delta)
            .ok_or(LedgerError::Overflow)?;
        if provider_reward.is_sign_negative() {
            return Err(LedgerError::InvalidAmount {
                reason: format!(
                    "correction of {delta} would make {} provider reward negative",
                    dispute.modality
                ),
            });
        }
        let user_payment = provider_reward
            .checked_add(previous.platform_fee)
            .ok_or(LedgerError::Overflow)?;
        let corrected = ModalityTotals {
            provider_reward,
            user_payment,
            ..previous
        };
        let mut totals = settlement.totals.clone();
        totals.set_bucket(dispute.modality, corrected);
        if !totals.is_summable() {
            return Err(LedgerError::Overflow);
        }

        let disputed_delta = corrected_amount
            .checked_sub(baseline)
            .ok_or(LedgerError::Overflow)?;
        let compensation = apply_bps(disputed_delta.abs(), self.config.dispute_reward_bps)
            .ok_or(LedgerError::Overflow)?;
        if compensation > settlement.fee_reserve {
            tracing::warn!(
                dispute = %dispute.dispute_id,
                needed = %compensation,
                reserve = %settlement.fee_reserve,
                "Compensation exceeds fee reserve"
            );
            return Err(LedgerError::InsufficientReserve {
                needed: compensation,
                available: settlement.fee_reserve,
            });
        }

        Ok(TotalsCorrection {
            dispute_id: dispute.dispute_id,
            entity: dispute.entity,
            modality: dispute.modality,
            committed_amount,
            previous_amount,
            corrected_amount,
            previous,
            corrected,
            compensation,
        })
    }

    /// Release the stake, then pay compensation. A failed payment re-locks
    /// the stake so the token ledger is left as it was.
    fn refund_and_compensate(&mut self, dispute: &Dispute, compensation: Decimal) -> Result<()> {
        let escrowed = self.tokens.balance(dispute.challenger).escrowed;
        if escrowed < dispute.stake {
            return Err(LedgerError::InsufficientEscrow {
                needed: dispute.stake,
                escrowed,
            });
        }
        self.tokens.release_stake(dispute.challenger, dispute.stake)?;
        if compensation > Decimal::ZERO {
            if let Err(err) =
                self.tokens
                    .credit(dispute.challenger, compensation, CreditKind::Compensation)
            {
                tracing::warn!(
                    dispute = %dispute.dispute_id,
                    error = %err,
                    "Compensation payment failed, restoring stake escrow"
                );
                self.tokens.lock_stake(dispute.challenger, dispute.stake)?;
                return Err(err);
            }
        }
        Ok(())
    }
}

fn ensure_non_negative(amount: Decimal) -> Result<()> {
    if amount.is_sign_negative() {
        return Err(LedgerError::InvalidAmount {
            reason: format!("corrected amount must not be negative, got {amount}"),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use usageledger_types::{DisputeStatus, EpochId, LedgerConfig, Modality};

    use super::*;
    use crate::testing::{CHALLENGER_FUNDS, Fixture, dec};

    fn upheld(amount: i64) -> Verdict {
        Verdict::Upheld {
            corrected_amount: dec(amount),
        }
    }

    fn disputed() -> (Fixture, DisputeId) {
        let mut fx = Fixture::new();
        let tree = fx.reference_tree(EpochId(1));
        fx.commit(EpochId(1), tree.root()).unwrap();
        let id = fx
            .ledger
            .raise_dispute(fx.challenger, Fixture::wrong_reward(&tree, EpochId(1)))
            .unwrap();
        (fx, id)
    }

    #[test]
    fn upheld_corrects_bucket_and_pays_from_reserve() {
        let (mut fx, id) = disputed();
        let resolved = fx.ledger.resolve_dispute(fx.arbiter, id, upheld(107)).unwrap();
        assert_eq!(resolved.status, DisputeStatus::Upheld);
        assert_eq!(resolved.compensation, Decimal::new(35, 1));

        let s = fx.ledger.settlement(EpochId(1)).unwrap();
        let bucket = s.totals.bucket(Modality::Text).unwrap();
        assert_eq!(bucket.provider_reward, dec(107));
        assert_eq!(bucket.platform_fee, dec(5));
        assert_eq!(bucket.user_payment, dec(112));
        assert_eq!(s.fee_reserve, Decimal::new(15, 1));
        assert_eq!(s.state, SettlementState::Open);
        assert_eq!(s.corrections.len(), 1);
        assert_eq!(s.corrections[0].previous.provider_reward, dec(100));

        let bal = fx.ledger.tokens().balance(fx.challenger);
        assert_eq!(bal.escrowed, Decimal::ZERO);
        assert_eq!(bal.available, dec(CHALLENGER_FUNDS) + Decimal::new(35, 1));
        fx.ledger.audit().unwrap();
    }

    #[test]
    fn rejected_slashes_stake() {
        let (mut fx, id) = disputed();
        let resolved = fx.ledger.resolve_dispute(fx.arbiter, id, Verdict::Rejected).unwrap();
        assert_eq!(resolved.status, DisputeStatus::Rejected);
        let bal = fx.ledger.tokens().balance(fx.challenger);
        assert_eq!(bal.total(), dec(CHALLENGER_FUNDS - 10));
        assert_eq!(fx.ledger.tokens().platform_pool(), dec(10));
        let s = fx.ledger.settlement(EpochId(1)).unwrap();
        assert_eq!(s.totals.bucket(Modality::Text).unwrap().provider_reward, dec(100));
        assert_eq!(s.fee_reserve, dec(5));
        fx.ledger.audit().unwrap();
    }

    #[test]
    fn resolution_is_exactly_once() {
        let (mut fx, id) = disputed();
        fx.ledger.resolve_dispute(fx.arbiter, id, upheld(107)).unwrap();
        let events = fx.ledger.events().len();
        let err = fx.ledger.resolve_dispute(fx.arbiter, id, Verdict::Rejected).unwrap_err();
        assert!(matches!(err, LedgerError::DisputeAlreadyResolved(_)));
        assert_eq!(fx.ledger.events().len(), events);
        assert_eq!(fx.ledger.tokens().platform_pool(), Decimal::ZERO);
    }

    #[test]
    fn only_arbiters_resolve() {
        let (mut fx, id) = disputed();
        let err = fx.ledger.resolve_dispute(fx.admin, id, upheld(107)).unwrap_err();
        assert!(matches!(err, LedgerError::Unauthorized { required: Role::Arbiter, .. }));
        let err = fx
            .ledger
            .resolve_dispute(fx.arbiter, DisputeId::deterministic(EpochId(9), 9), upheld(1))
            .unwrap_err();
        assert!(matches!(err, LedgerError::UnknownDispute(_)));
        assert!(fx.ledger.dispute(id).unwrap().is_pending());
    }

    #[test]
    fn compensation_beyond_reserve_changes_nothing() {
        let (mut fx, id) = disputed();
        // |200 - 100| * 50% = 50 > reserve 5
        let err = fx.ledger.resolve_dispute(fx.arbiter, id, upheld(200)).unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientReserve { .. }));
        let s = fx.ledger.settlement(EpochId(1)).unwrap();
        assert_eq!(s.totals.bucket(Modality::Text).unwrap().provider_reward, dec(100));
        assert_eq!(s.fee_reserve, dec(5));
        assert_eq!(s.state, SettlementState::Disputed);
        assert!(fx.ledger.dispute(id).unwrap().is_pending());
        assert_eq!(fx.ledger.tokens().balance(fx.challenger).escrowed, dec(10));
        fx.ledger.audit().unwrap();
    }

    #[test]
    fn negative_correction_rejected() {
        let (mut fx, id) = disputed();
        let err = fx.ledger.resolve_dispute(fx.arbiter, id, upheld(-1)).unwrap_err();
        assert!(matches!(err, LedgerError::InvalidAmount { .. }));
    }

    #[test]
    fn downward_correction_also_compensates() {
        let (mut fx, id) = disputed();
        fx.ledger.resolve_dispute(fx.arbiter, id, upheld(96)).unwrap();
        let s = fx.ledger.settlement(EpochId(1)).unwrap();
        let bucket = s.totals.bucket(Modality::Text).unwrap();
        assert_eq!(bucket.provider_reward, dec(96));
        assert_eq!(bucket.user_payment, dec(101));
        assert_eq!(s.fee_reserve, dec(3));
        fx.ledger.audit().unwrap();
    }

    fn low_reward_fixture() -> Fixture {
        Fixture::with_config(LedgerConfig {
            dispute_reward_bps: 2_000,
            ..LedgerConfig::default()
        })
    }

    fn two_disputes(fx: &mut Fixture) -> (DisputeId, DisputeId) {
        let tree = fx.reference_tree(EpochId(1));
        fx.commit(EpochId(1), tree.root()).unwrap();
        let first = fx
            .ledger
            .raise_dispute(fx.challenger, Fixture::wrong_reward(&tree, EpochId(1)))
            .unwrap();
        let second = fx
            .ledger
            .raise_dispute(fx.challenger, Fixture::wrong_reward(&tree, EpochId(1)))
            .unwrap();
        (first, second)
    }

    #[test]
    fn second_correction_builds_on_first() {
        let mut fx = low_reward_fixture();
        let (first, second) = two_disputes(&mut fx);
        assert_eq!(fx.ledger.settlement(EpochId(1)).unwrap().open_dispute_count, 2);

        fx.ledger.resolve_dispute(fx.arbiter, first, upheld(107)).unwrap();
        assert_eq!(
            fx.ledger.settlement(EpochId(1)).unwrap().state,
            SettlementState::Disputed
        );
        fx.ledger.resolve_dispute(fx.arbiter, second, upheld(108)).unwrap();
        let s = fx.ledger.settlement(EpochId(1)).unwrap();
        assert_eq!(s.totals.bucket(Modality::Text).unwrap().provider_reward, dec(108));
        let latest = s.latest_correction(&fx.provider, Modality::Text).unwrap();
        assert_eq!(latest.previous_amount, dec(107));
        // 20% of |108 - 100|, measured against the committed leaf
        assert_eq!(latest.compensation, Decimal::new(16, 1));
        // 5 - 1.4 - 1.6
        assert_eq!(s.fee_reserve, dec(2));
        assert_eq!(s.state, SettlementState::Open);
        fx.ledger.audit().unwrap();
    }

    #[test]
    fn both_upheld_pay_on_their_own_verdicts() {
        for reversed in [false, true] {
            let mut fx = low_reward_fixture();
            let (a, b) = two_disputes(&mut fx);
            let order = if reversed {
                [(b, 104), (a, 107)]
            } else {
                [(a, 107), (b, 104)]
            };
            for (id, amount) in order {
                fx.ledger.resolve_dispute(fx.arbiter, id, upheld(amount)).unwrap();
            }
            assert_eq!(fx.ledger.dispute(a).unwrap().compensation, Decimal::new(14, 1));
            assert_eq!(fx.ledger.dispute(b).unwrap().compensation, Decimal::new(8, 1));

            let s = fx.ledger.settlement(EpochId(1)).unwrap();
            let last = order[1].1;
            assert_eq!(s.totals.bucket(Modality::Text).unwrap().provider_reward, dec(last));
            assert_eq!(s.fee_reserve, Decimal::new(28, 1));
            fx.ledger.audit().unwrap();
        }
    }

    #[test]
    fn identical_upheld_disputes_are_paid_alike() {
        let mut fx = low_reward_fixture();
        let (first, second) = two_disputes(&mut fx);
        let a = fx.ledger.resolve_dispute(fx.arbiter, first, upheld(107)).unwrap();
        let b = fx.ledger.resolve_dispute(fx.arbiter, second, upheld(107)).unwrap();
        assert_eq!(a.compensation, Decimal::new(14, 1));
        assert_eq!(b.compensation, a.compensation);
        let bucket = *fx
            .ledger
            .settlement(EpochId(1))
            .unwrap()
            .totals
            .bucket(Modality::Text)
            .unwrap();
        assert_eq!(bucket.provider_reward, dec(107));
        assert_eq!(bucket.user_payment, dec(112));
        fx.ledger.audit().unwrap();
    }

    #[test]
    fn extreme_correction_is_an_overflow_error() {
        let (mut fx, id) = disputed();
        let err = fx
            .ledger
            .resolve_dispute(
                fx.arbiter,
                id,
                Verdict::Upheld {
                    corrected_amount: Decimal::MAX,
                },
            )
            .unwrap_err();
        assert!(matches!(err, LedgerError::Overflow));
        let s = fx.ledger.settlement(EpochId(1)).unwrap();
        assert_eq!(s.totals.bucket(Modality::Text).unwrap().provider_reward, dec(100));
        assert_eq!(s.fee_reserve, dec(5));
        assert!(fx.ledger.dispute(id).unwrap().is_pending());

        // the arbiter can still resolve it sensibly afterwards
        fx.ledger.resolve_dispute(fx.arbiter, id, upheld(107)).unwrap();
        fx.ledger.audit().unwrap();
    }

    #[test]
    fn missing_entry_adds_new_bucket() {
        let mut fx = Fixture::new();
        let tree = fx.reference_tree(EpochId(1));
        fx.commit(EpochId(1), tree.root()).unwrap();
        let (_, absent) = usageledger_types::test_keypair(50);
        let (gap, proof) = tree.absence_proof(absent, Modality::Image).unwrap();
        let id = fx
            .ledger
            .raise_dispute(
                fx.challenger,
                usageledger_types::DisputeRequest {
                    epoch_id: EpochId(1),
                    kind: usageledger_types::DisputeKind::MissingEntry,
                    entity: absent,
                    modality: Modality::Image,
                    claimed_amount: dec(4),
                    evidence: DisputeEvidence::Absence {
                        lower: gap.lower,
                        upper: gap.upper,
                        proof,
                    },
                    stake: dec(10),
                },
            )
            .unwrap();
        fx.ledger.resolve_dispute(fx.arbiter, id, upheld(4)).unwrap();
        let s = fx.ledger.settlement(EpochId(1)).unwrap();
        let image = s.totals.bucket(Modality::Image).unwrap();
        assert_eq!(image.provider_reward, dec(4));
        assert_eq!(image.user_payment, dec(4));
        let correction = s.latest_correction(&absent, Modality::Image).unwrap();
        assert_eq!(correction.committed_amount, None);
        assert_eq!(correction.compensation, dec(2));
        fx.ledger.audit().unwrap();
    }

    #[test]
    fn cancelled_settlement_only_refunds() {
        let (mut fx, id) = disputed();
        fx.ledger.cancel_settlement(fx.admin, EpochId(1), "bad root").unwrap();
        let resolved = fx.ledger.resolve_dispute(fx.arbiter, id, upheld(107)).unwrap();
        assert_eq!(resolved.compensation, Decimal::ZERO);
        let s = fx.ledger.settlement(EpochId(1)).unwrap();
        assert_eq!(s.state, SettlementState::Cancelled);
        assert_eq!(s.open_dispute_count, 0);
        assert!(s.corrections.is_empty());
        assert_eq!(
            fx.ledger.tokens().balance(fx.challenger).available,
            dec(CHALLENGER_FUNDS)
        );
        fx.ledger.audit().unwrap();
    }

    #[test]
    fn zero_reward_share_pays_no_compensation() {
        let config = LedgerConfig {
            dispute_reward_bps: 0,
            ..LedgerConfig::default()
        };
        let mut fx = Fixture::with_config(config);
        let tree = fx.reference_tree(EpochId(1));
        fx.commit(EpochId(1), tree.root()).unwrap();
        let id = fx
            .ledger
            .raise_dispute(fx.challenger, Fixture::wrong_reward(&tree, EpochId(1)))
            .unwrap();
        fx.ledger.resolve_dispute(fx.arbiter, id, upheld(107)).unwrap();
        assert_eq!(fx.ledger.settlement(EpochId(1)).unwrap().fee_reserve, dec(5));
        assert_eq!(fx.ledger.tokens().supply().total_compensation(), Decimal::ZERO);
    }

    #[test]
    fn resolution_after_window_then_finalize() {
        let (mut fx, id) = disputed();
        fx.ledger.advance(fx.ledger.config().dispute_window() + Duration::hours(1)).unwrap();
        assert!(matches!(
            fx.ledger.finalize_settlement(EpochId(1)),
            Err(LedgerError::UnresolvedDisputes { open: 1, .. })
        ));
        fx.ledger.resolve_dispute(fx.arbiter, id, upheld(107)).unwrap();
        fx.ledger.finalize_settlement(EpochId(1)).unwrap();
        let s = fx.ledger.settlement(EpochId(1)).unwrap();
        assert_eq!(s.state, SettlementState::Finalized);
        assert_eq!(s.totals.provider_reward().unwrap(), dec(107));
    }
}
