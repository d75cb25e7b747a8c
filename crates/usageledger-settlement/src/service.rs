//! Single-writer ledger service.
//!
//! One tokio task owns the [`SettlementLedger`] and applies commands in
//! arrival order, so concurrent callers are serialized without locks: of two
//! racing claims for the same `(epoch, entity)`, exactly one is paid.
//! Callers hold a cloneable [`LedgerHandle`] and get each answer back on a
//! oneshot channel.

use chrono::{DateTime, Utc};
use tokio::{
    sync::{mpsc, oneshot},
    task::JoinHandle,
};
use usageledger_types::{
    AccountId, BalanceEntry, ClaimRecord, ClaimRequest, Dispute, DisputeId, DisputeRequest,
    EpochId, EventRecord, FinalizeOutcome, LedgerError, PolicyVersion, PricingPolicy, Result,
    ServiceClass, Settlement, SignedCommitment, Verdict,
};

use crate::{distributor::BatchOutcome, ledger::SettlementLedger, token::TokenLedger};

/// Queue depth between handles and the ledger task.
pub const COMMAND_CHANNEL_CAPACITY: usize = 256;

/// A request for the ledger task. Each variant carries its reply channel.
#[derive(Debug)]
pub enum LedgerCommand {
    SetTime {
        now: DateTime<Utc>,
        reply: oneshot::Sender<Result<()>>,
    },
    SetPolicy {
        caller: AccountId,
        service_class: ServiceClass,
        policy: PricingPolicy,
        effective_at: DateTime<Utc>,
        reply: oneshot::Sender<Result<PolicyVersion>>,
    },
    Commit {
        caller: AccountId,
        signed: Box<SignedCommitment>,
        reply: oneshot::Sender<Result<EpochId>>,
    },
    RaiseDispute {
        challenger: AccountId,
        request: Box<DisputeRequest>,
        reply: oneshot::Sender<Result<DisputeId>>,
    },
    ResolveDispute {
        caller: AccountId,
        dispute_id: DisputeId,
        verdict: Verdict,
        reply: oneshot::Sender<Result<Dispute>>,
    },
    Finalize {
        epoch_id: EpochId,
        reply: oneshot::Sender<Result<FinalizeOutcome>>,
    },
    Cancel {
        caller: AccountId,
        epoch_id: EpochId,
        reason: String,
        reply: oneshot::Sender<Result<()>>,
    },
    Claim {
        request: ClaimRequest,
        reply: oneshot::Sender<Result<ClaimRecord>>,
    },
    BatchClaim {
        requests: Vec<ClaimRequest>,
        reply: oneshot::Sender<Result<BatchOutcome>>,
    },
    Pause {
        caller: AccountId,
        reason: String,
        reply: oneshot::Sender<Result<bool>>,
    },
    Unpause {
        caller: AccountId,
        reply: oneshot::Sender<Result<bool>>,
    },
    Settlement {
        epoch_id: EpochId,
        reply: oneshot::Sender<Option<Settlement>>,
    },
    Balance {
        account: AccountId,
        reply: oneshot::Sender<BalanceEntry>,
    },
    Events {
        from: u64,
        reply: oneshot::Sender<Vec<EventRecord>>,
    },
    Audit {
        reply: oneshot::Sender<Result<()>>,
    },
}

/// Spawns the ledger task.
pub struct LedgerService;

impl LedgerService {
    /// Move `ledger` into a new task. The task ends, handing the ledger back
    /// through the join handle, once every [`LedgerHandle`] is dropped.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn<L>(ledger: SettlementLedger<L>) -> (LedgerHandle, JoinHandle<SettlementLedger<L>>)
    where
        L: TokenLedger + Send + 'static,
    {
        let (tx, rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
        let task = tokio::spawn(run(ledger, rx));
        (LedgerHandle { tx }, task)
    }
}

async fn run<L: TokenLedger>(
    mut ledger: SettlementLedger<L>,
    mut rx: mpsc::Receiver<LedgerCommand>,
) -> SettlementLedger<L> {
    tracing::info!("Ledger service started");
    let mut processed: u64 = 0;
    while let Some(command) = rx.recv().await {
        apply(&mut ledger, command);
        processed += 1;
    }
    tracing::info!(processed, "Ledger service stopped");
    ledger
}

fn apply<L: TokenLedger>(ledger: &mut SettlementLedger<L>, command: LedgerCommand) {
    let delivered = match command {
        LedgerCommand::SetTime { now, reply } => reply.send(ledger.set_time(now)).is_ok(),
        LedgerCommand::SetPolicy {
            caller,
            service_class,
            policy,
            effective_at,
            reply,
        } => reply
            .send(ledger.set_policy(caller, service_class, policy, effective_at))
            .is_ok(),
        LedgerCommand::Commit {
            caller,
            signed,
            reply,
        } => reply.send(ledger.commit_settlement(caller, *signed)).is_ok(),
        LedgerCommand::RaiseDispute {
            challenger,
            request,
            reply,
        } => reply.send(ledger.raise_dispute(challenger, *request)).is_ok(),
        LedgerCommand::ResolveDispute {
            caller,
            dispute_id,
            verdict,
            reply,
        } => reply
            .send(ledger.resolve_dispute(caller, dispute_id, verdict))
            .is_ok(),
        LedgerCommand::Finalize { epoch_id, reply } => {
            reply.send(ledger.finalize_settlement(epoch_id)).is_ok()
        }
        LedgerCommand::Cancel {
            caller,
            epoch_id,
            reason,
            reply,
        } => reply
            .send(ledger.cancel_settlement(caller, epoch_id, &reason))
            .is_ok(),
        LedgerCommand::Claim { request, reply } => reply.send(ledger.claim_reward(request)).is_ok(),
        LedgerCommand::BatchClaim { requests, reply } => {
            reply.send(ledger.batch_distribute(requests)).is_ok()
        }
        LedgerCommand::Pause {
            caller,
            reason,
            reply,
        } => reply.send(ledger.pause(caller, &reason)).is_ok(),
        LedgerCommand::Unpause { caller, reply } => reply.send(ledger.unpause(caller)).is_ok(),
        LedgerCommand::Settlement { epoch_id, reply } => {
            reply.send(ledger.settlement(epoch_id).cloned()).is_ok()
        }
        LedgerCommand::Balance { account, reply } => {
            reply.send(ledger.tokens().balance(account)).is_ok()
        }
        LedgerCommand::Events { from, reply } => {
            reply.send(ledger.events().since(from).to_vec()).is_ok()
        }
        LedgerCommand::Audit { reply } => reply.send(ledger.audit()).is_ok(),
    };
    if !delivered {
        // The caller gave up waiting; the command has still been applied.
        tracing::debug!("Reply dropped by caller");
    }
}

/// Cloneable client of the ledger task.
#[derive(Debug, Clone)]
pub struct LedgerHandle {
    tx: mpsc::Sender<LedgerCommand>,
}

impl LedgerHandle {
    async fn request<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> LedgerCommand,
    ) -> Result<T> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(command(reply))
            .await
            .map_err(|_| LedgerError::ServiceUnavailable)?;
        rx.await.map_err(|_| LedgerError::ServiceUnavailable)
    }

    /// # Errors
    /// [`LedgerError::ServiceUnavailable`] or the ledger's own error.
    pub async fn set_time(&self, now: DateTime<Utc>) -> Result<()> {
        self.request(|reply| LedgerCommand::SetTime { now, reply })
            .await?
    }

    /// # Errors
    /// [`LedgerError::ServiceUnavailable`] or the ledger's own error.
    pub async fn set_policy(
        &self,
        caller: AccountId,
        service_class: ServiceClass,
        policy: PricingPolicy,
        effective_at: DateTime<Utc>,
    ) -> Result<PolicyVersion> {
        self.request(|reply| LedgerCommand::SetPolicy {
            caller,
            service_class,
            policy,
            effective_at,
            reply,
        })
        .await?
    }

    /// # Errors
    /// [`LedgerError::ServiceUnavailable`] or the ledger's own error.
    pub async fn commit_settlement(
        &self,
        caller: AccountId,
        signed: SignedCommitment,
    ) -> Result<EpochId> {
        self.request(|reply| LedgerCommand::Commit {
            caller,
            signed: Box::new(signed),
            reply,
        })
        .await?
    }

    /// # Errors
    /// [`LedgerError::ServiceUnavailable`] or the ledger's own error.
    pub async fn raise_dispute(
        &self,
        challenger: AccountId,
        request: DisputeRequest,
    ) -> Result<DisputeId> {
        self.request(|reply| LedgerCommand::RaiseDispute {
            challenger,
            request: Box::new(request),
            reply,
        })
        .await?
    }

    /// # Errors
    /// [`LedgerError::ServiceUnavailable`] or the ledger's own error.
    pub async fn resolve_dispute(
        &self,
        caller: AccountId,
        dispute_id: DisputeId,
        verdict: Verdict,
    ) -> Result<Dispute> {
        self.request(|reply| LedgerCommand::ResolveDispute {
            caller,
            dispute_id,
            verdict,
            reply,
        })
        .await?
    }

    /// # Errors
    /// [`LedgerError::ServiceUnavailable`] or the ledger's own error.
    pub async fn finalize_settlement(&self, epoch_id: EpochId) -> Result<FinalizeOutcome> {
        self.request(|reply| LedgerCommand::Finalize { epoch_id, reply })
            .await?
    }

    /// # Errors
    /// [`LedgerError::ServiceUnavailable`] or the ledger's own error.
    pub async fn cancel_settlement(
        &self,
        caller: AccountId,
        epoch_id: EpochId,
        reason: impl Into<String>,
    ) -> Result<()> {
        let reason = reason.into();
        self.request(|reply| LedgerCommand::Cancel {
            caller,
            epoch_id,
            reason,
            reply,
        })
        .await?
    }

    /// # Errors
    /// [`LedgerError::ServiceUnavailable`] or the ledger's own error.
    pub async fn claim_reward(&self, request: ClaimRequest) -> Result<ClaimRecord> {
        self.request(|reply| LedgerCommand::Claim { request, reply })
            .await?
    }

    /// # Errors
    /// [`LedgerError::ServiceUnavailable`] or [`LedgerError::BatchTooLarge`].
    pub async fn batch_distribute(&self, requests: Vec<ClaimRequest>) -> Result<BatchOutcome> {
        self.request(|reply| LedgerCommand::BatchClaim { requests, reply })
            .await?
    }

    /// # Errors
    /// [`LedgerError::ServiceUnavailable`] or the ledger's own error.
    pub async fn pause(&self, caller: AccountId, reason: impl Into<String>) -> Result<bool> {
        let reason = reason.into();
        self.request(|reply| LedgerCommand::Pause {
            caller,
            reason,
            reply,
        })
        .await?
    }

    /// # Errors
    /// [`LedgerError::ServiceUnavailable`] or the ledger's own error.
    pub async fn unpause(&self, caller: AccountId) -> Result<bool> {
        self.request(|reply| LedgerCommand::Unpause { caller, reply })
            .await?
    }

    /// # Errors
    /// [`LedgerError::ServiceUnavailable`].
    pub async fn settlement(&self, epoch_id: EpochId) -> Result<Option<Settlement>> {
        self.request(|reply| LedgerCommand::Settlement { epoch_id, reply })
            .await
    }

    /// # Errors
    /// [`LedgerError::ServiceUnavailable`].
    pub async fn balance(&self, account: AccountId) -> Result<BalanceEntry> {
        self.request(|reply| LedgerCommand::Balance { account, reply })
            .await
    }

    /// Event records with `sequence >= from`.
    ///
    /// # Errors
    /// [`LedgerError::ServiceUnavailable`].
    pub async fn events(&self, from: u64) -> Result<Vec<EventRecord>> {
        self.request(|reply| LedgerCommand::Events { from, reply })
            .await
    }

    /// # Errors
    /// [`LedgerError::ServiceUnavailable`] or the audit failure.
    pub async fn audit(&self) -> Result<()> {
        self.request(|reply| LedgerCommand::Audit { reply }).await?
    }
}
