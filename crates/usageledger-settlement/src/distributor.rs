//! Payment Distributor: reward claims against finalized settlements.
//!
//! A provider proves its leaf against the committed root and is paid the
//! leaf amount, or the arbiter's corrected amount if the leaf was corrected.
//! The claim registry is written before the token credit; a failed credit
//! reverts the registry entry, so a claim either fully happens or leaves no
//! trace.

use rust_decimal::Decimal;
use usageledger_proof::{UsageLeaf, verify_inclusion};
use usageledger_types::{
    ClaimRecord, ClaimRequest, EntityId, EpochId, LedgerError, LedgerEvent, Result,
    SettlementState,
};

use crate::{
    ledger::SettlementLedger,
    token::{CreditKind, TokenLedger},
};

/// Result of one entry of a batch.
#[derive(Debug)]
pub struct ClaimOutcome {
    pub epoch_id: EpochId,
    pub entity: EntityId,
    pub result: Result<ClaimRecord>,
}

/// Per-entry results of [`SettlementLedger::batch_distribute`], in request
/// order.
#[derive(Debug, Default)]
pub struct BatchOutcome {
    pub outcomes: Vec<ClaimOutcome>,
}

impl BatchOutcome {
    pub fn succeeded(&self) -> impl Iterator<Item = &ClaimRecord> {
        self.outcomes.iter().filter_map(|o| o.result.as_ref().ok())
    }

    pub fn failed(&self) -> impl Iterator<Item = (&ClaimOutcome, &LedgerError)> {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().err().map(|e| (o, e)))
    }

    /// Sum of all successful payouts.
    #[must_use]
    pub fn total_paid(&self) -> Decimal {
        self.succeeded().map(|r| r.amount).sum()
    }
}

impl<L: TokenLedger> SettlementLedger<L> {
    /// Pay an entity its reward from a finalized settlement.
    ///
    /// # Errors
    /// - [`LedgerError::LedgerPaused`], [`LedgerError::UnknownEpoch`]
    /// - [`LedgerError::SettlementCancelled`], [`LedgerError::SettlementNotFinalized`]
    /// - [`LedgerError::InvalidAmount`] for a non-positive amount or payout
    /// - [`LedgerError::InvalidProof`] if the leaf is not under the root
    /// - [`LedgerError::AlreadyClaimed`] on a second claim by the entity
    /// - [`LedgerError::RewardPoolExhausted`] if the payout exceeds what is
    ///   left of the modality's provider reward
    pub fn claim_reward(&mut self, request: ClaimRequest) -> Result<ClaimRecord> {
        self.pause.check()?;
        let epoch_id = request.epoch_id;
        let settlement = self.settlement_ref(epoch_id)?;
        match settlement.state {
            SettlementState::Finalized => {}
            SettlementState::Cancelled => return Err(LedgerError::SettlementCancelled(epoch_id)),
            state @ (SettlementState::Open | SettlementState::Disputed) => {
                return Err(LedgerError::SettlementNotFinalized {
                    epoch: epoch_id,
                    state,
                });
            }
        }
        if request.amount <= Decimal::ZERO {
            return Err(LedgerError::InvalidAmount {
                reason: format!("claim amount must be positive, got {}", request.amount),
            });
        }

        let correction = settlement.latest_correction(&request.entity, request.modality);
        // A correction of a missing entry has no committed leaf to prove.
        let needs_proof = correction.is_none_or(|c| c.committed_amount.is_some());
        let payout = correction.map_or(request.amount, |c| c.corrected_amount);
        if needs_proof {
            let leaf = UsageLeaf {
                epoch_id,
                entity: request.entity,
                modality: request.modality,
                amount: request.amount,
            };
            if !verify_inclusion(
                &settlement.merkle_root,
                &leaf,
                &request.proof,
                self.config.max_proof_depth,
            ) {
                tracing::warn!(
                    epoch = %epoch_id,
                    entity = %request.entity,
                    modality = %request.modality,
                    proof_len = request.proof.len(),
                    "Claim proof rejected"
                );
                return Err(LedgerError::InvalidProof {
                    reason: format!(
                        "leaf for {} {} does not verify against root {}",
                        request.entity,
                        request.modality,
                        hex::encode(settlement.merkle_root)
                    ),
                });
            }
        }
        if payout <= Decimal::ZERO {
            return Err(LedgerError::InvalidAmount {
                reason: format!("nothing to claim for {} {}", request.entity, request.modality),
            });
        }
        if self.claims.is_claimed(epoch_id, &request.entity) {
            tracing::warn!(epoch = %epoch_id, entity = %request.entity, "Duplicate claim rejected");
            return Err(LedgerError::AlreadyClaimed {
                epoch: epoch_id,
                entity: request.entity,
            });
        }
        let remaining = settlement.remaining_reward(request.modality);
        if payout > remaining {
            return Err(LedgerError::RewardPoolExhausted {
                requested: payout,
                remaining,
            });
        }

        let record = ClaimRecord {
            epoch_id,
            entity: request.entity,
            modality: request.modality,
            amount: payout,
            claimed_at: self.now,
        };
        let event = self.events.seal(LedgerEvent::RewardClaimed {
            epoch_id,
            entity: request.entity,
            modality: request.modality,
            amount: payout,
            at: self.now,
        })?;

        self.claims.record(record.clone())?;
        if let Err(err) = self.tokens.credit(request.entity, payout, CreditKind::Reward) {
            self.claims.revert(epoch_id, request.entity);
            tracing::warn!(
                epoch = %epoch_id,
                entity = %request.entity,
                error = %err,
                "Reward credit failed, claim reverted"
            );
            return Err(err);
        }
        let settlement = self.settlement_mut(epoch_id)?;
        *settlement.distributed.entry(request.modality).or_default() += payout;
        self.events.push(event);

        tracing::info!(
            epoch = %epoch_id,
            entity = %request.entity,
            modality = %request.modality,
            amount = %payout,
            "Reward claimed"
        );
        Ok(record)
    }

    /// Process many claims in one call. Entries are independent: a failed
    /// entry is reported and the rest still run.
    ///
    /// # Errors
    /// Returns [`LedgerError::BatchTooLarge`], without processing anything,
    /// if the batch exceeds `max_batch_claims`.
    pub fn batch_distribute(&mut self, requests: Vec<ClaimRequest>) -> Result<BatchOutcome> {
        let limit = self.config.max_batch_claims;
        if requests.len() > limit {
            return Err(LedgerError::BatchTooLarge {
                size: requests.len(),
                limit,
            });
        }
        let outcomes: Vec<ClaimOutcome> = requests
            .into_iter()
            .map(|request| ClaimOutcome {
                epoch_id: request.epoch_id,
                entity: request.entity,
                result: self.claim_reward(request),
            })
            .collect();
        let batch = BatchOutcome { outcomes };
        tracing::info!(
            entries = batch.outcomes.len(),
            succeeded = batch.succeeded().count(),
            failed = batch.failed().count(),
            paid = %batch.total_paid(),
            "Batch distribution complete"
        );
        Ok(batch)
    }
}

#[cfg(test)]
mod tests {
    use usageledger_proof::{UsageTree, UsageTreeBuilder};
    use usageledger_types::{Modality, ModalityTotals, SettlementTotals, Verdict, test_keypair};

    use super::*;
    use crate::testing::{Fixture, dec};

    fn claim(tree: &UsageTree, entity: EntityId, modality: Modality) -> ClaimRequest {
        let (leaf, proof) = tree.inclusion_proof(entity, modality).unwrap();
        ClaimRequest {
            epoch_id: leaf.epoch_id,
            entity,
            modality,
            amount: leaf.amount,
            proof,
        }
    }

    fn finalized(fx: &mut Fixture, tree: &UsageTree) {
        let epoch = tree.leaves()[0].epoch_id;
        fx.commit(epoch, tree.root()).unwrap();
        let window = fx.ledger.config().dispute_window();
        fx.ledger.advance(window).unwrap();
        fx.ledger.finalize_settlement(epoch).unwrap();
    }

    #[test]
    fn claim_pays_exactly_once() {
        let mut fx = Fixture::new();
        let tree = fx.reference_tree(EpochId(1));
        finalized(&mut fx, &tree);
        let request = claim(&tree, fx.provider, Modality::Text);

        let record = fx.ledger.claim_reward(request.clone()).unwrap();
        assert_eq!(record.amount, dec(100));
        assert_eq!(fx.ledger.tokens().balance(fx.provider).available, dec(100));

        let err = fx.ledger.claim_reward(request).unwrap_err();
        assert!(matches!(err, LedgerError::AlreadyClaimed { .. }));
        assert_eq!(fx.ledger.tokens().balance(fx.provider).available, dec(100));
        let s = fx.ledger.settlement(EpochId(1)).unwrap();
        assert_eq!(s.remaining_reward(Modality::Text), Decimal::ZERO);
        fx.ledger.audit().unwrap();
    }

    #[test]
    fn claim_requires_finalized() {
        let mut fx = Fixture::new();
        let tree = fx.reference_tree(EpochId(1));
        fx.commit(EpochId(1), tree.root()).unwrap();
        let err = fx
            .ledger
            .claim_reward(claim(&tree, fx.provider, Modality::Text))
            .unwrap_err();
        assert!(matches!(
            err,
            LedgerError::SettlementNotFinalized { state: SettlementState::Open, .. }
        ));

        fx.ledger.cancel_settlement(fx.admin, EpochId(1), "void").unwrap();
        let err = fx
            .ledger
            .claim_reward(claim(&tree, fx.provider, Modality::Text))
            .unwrap_err();
        assert!(matches!(err, LedgerError::SettlementCancelled(_)));
    }

    #[test]
    fn inflated_amount_fails_proof() {
        let mut fx = Fixture::new();
        let tree = fx.reference_tree(EpochId(1));
        finalized(&mut fx, &tree);
        let mut request = claim(&tree, fx.provider, Modality::Text);
        request.amount = dec(101);
        let err = fx.ledger.claim_reward(request).unwrap_err();
        assert!(matches!(err, LedgerError::InvalidProof { .. }));
        assert!(fx.ledger.claim_record(EpochId(1), &fx.provider).is_none());
    }

    #[test]
    fn non_positive_amount_rejected() {
        let mut fx = Fixture::new();
        let tree = fx.reference_tree(EpochId(1));
        finalized(&mut fx, &tree);
        let mut request = claim(&tree, fx.provider, Modality::Text);
        request.amount = Decimal::ZERO;
        assert!(matches!(
            fx.ledger.claim_reward(request),
            Err(LedgerError::InvalidAmount { .. })
        ));
    }

    #[test]
    fn corrected_leaf_pays_corrected_amount() {
        let mut fx = Fixture::new();
        let tree = fx.reference_tree(EpochId(1));
        fx.commit(EpochId(1), tree.root()).unwrap();
        let id = fx
            .ledger
            .raise_dispute(fx.challenger, Fixture::wrong_reward(&tree, EpochId(1)))
            .unwrap();
        fx.ledger
            .resolve_dispute(
                fx.arbiter,
                id,
                Verdict::Upheld {
                    corrected_amount: dec(107),
                },
            )
            .unwrap();
        fx.ledger.advance(fx.ledger.config().dispute_window()).unwrap();
        fx.ledger.finalize_settlement(EpochId(1)).unwrap();

        // the proof is still over the committed 100
        let record = fx
            .ledger
            .claim_reward(claim(&tree, fx.provider, Modality::Text))
            .unwrap();
        assert_eq!(record.amount, dec(107));
        fx.ledger.audit().unwrap();
    }

    #[test]
    fn pool_cannot_be_overdrawn() {
        let mut fx = Fixture::new();
        let (_, other) = test_keypair(40);
        // leaves sum to 120 but the bucket only carries 100
        let tree = UsageTreeBuilder::new(EpochId(1))
            .leaf(fx.provider, Modality::Text, dec(70))
            .leaf(other, Modality::Text, dec(50))
            .build();
        finalized(&mut fx, &tree);
        fx.ledger
            .claim_reward(claim(&tree, fx.provider, Modality::Text))
            .unwrap();
        let err = fx
            .ledger
            .claim_reward(claim(&tree, other, Modality::Text))
            .unwrap_err();
        assert!(matches!(err, LedgerError::RewardPoolExhausted { .. }));
        assert_eq!(
            fx.ledger.settlement(EpochId(1)).unwrap().remaining_reward(Modality::Text),
            dec(30)
        );
    }

    #[test]
    fn batch_limit_rejects_whole_batch() {
        let config = usageledger_types::LedgerConfig {
            max_batch_claims: 1,
            ..usageledger_types::LedgerConfig::default()
        };
        let mut fx = Fixture::with_config(config);
        let tree = fx.reference_tree(EpochId(1));
        finalized(&mut fx, &tree);
        let request = claim(&tree, fx.provider, Modality::Text);
        let err = fx
            .ledger
            .batch_distribute(vec![request.clone(), request])
            .unwrap_err();
        assert!(matches!(err, LedgerError::BatchTooLarge { size: 2, limit: 1 }));
        assert!(fx.ledger.claims().is_empty());
    }

    #[test]
    fn batch_reports_each_entry() {
        let mut fx = Fixture::new();
        let (_, other) = test_keypair(41);
        let tree = UsageTreeBuilder::new(EpochId(1))
            .leaf(fx.provider, Modality::Text, dec(60))
            .leaf(other, Modality::Text, dec(40))
            .build();
        finalized(&mut fx, &tree);
        let first = claim(&tree, fx.provider, Modality::Text);
        let second = claim(&tree, other, Modality::Text);
        let batch = fx
            .ledger
            .batch_distribute(vec![first.clone(), second, first])
            .unwrap();
        assert_eq!(batch.succeeded().count(), 2);
        assert_eq!(batch.total_paid(), dec(100));
        let failures: Vec<_> = batch.failed().collect();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].0.entity, fx.provider);
        assert!(matches!(failures[0].1, LedgerError::AlreadyClaimed { .. }));
        fx.ledger.audit().unwrap();
    }

    #[test]
    fn claim_is_paused() {
        let mut fx = Fixture::new();
        let tree = fx.reference_tree(EpochId(1));
        finalized(&mut fx, &tree);
        fx.ledger.pause(fx.admin, "incident").unwrap();
        assert!(matches!(
            fx.ledger.claim_reward(claim(&tree, fx.provider, Modality::Text)),
            Err(LedgerError::LedgerPaused)
        ));
    }

    #[test]
    fn unrelated_bucket_is_untouched() {
        let mut fx = Fixture::new();
        let tree = fx.reference_tree(EpochId(1));
        finalized(&mut fx, &tree);
        fx.ledger
            .claim_reward(claim(&tree, fx.provider, Modality::Text))
            .unwrap();
        let s = fx.ledger.settlement(EpochId(1)).unwrap();
        assert_eq!(s.remaining_reward(Modality::Video), Decimal::ZERO);
        assert_eq!(
            s.totals,
            SettlementTotals::new().with_bucket(
                Modality::Text,
                ModalityTotals::new(105, dec(100), dec(5), dec(105)),
            )
        );
    }
}
