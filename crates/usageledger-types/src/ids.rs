//! Identifiers used throughout UsageLedger.
//!
//! Accounts are raw ed25519 public keys. Dispute identifiers are UUIDs
//! derived deterministically from ledger state so that every replica of the
//! state machine assigns the same ID to the same dispute.

use std::fmt;

use ed25519_dalek::VerifyingKey;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{LedgerError, Result};

// ---------------------------------------------------------------------------
// EpochId
// ---------------------------------------------------------------------------

/// Monotonically increasing identifier of a settlement batching period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct EpochId(pub u64);

impl fmt::Display for EpochId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "epoch:{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// AccountId
// ---------------------------------------------------------------------------

/// A ledger account: the raw ed25519 public key (32 bytes).
///
/// Providers, challengers, and role holders (committer, arbiter, admin) are
/// all accounts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct AccountId(pub [u8; 32]);

impl AccountId {
    #[must_use]
    pub fn from_verifying_key(key: &VerifyingKey) -> Self {
        Self(key.to_bytes())
    }

    /// Decode the account bytes back into an ed25519 verifying key.
    ///
    /// # Errors
    /// Returns [`LedgerError::InvalidSignature`] if the bytes are not a
    /// valid curve point.
    pub fn verifying_key(&self) -> Result<VerifyingKey> {
        VerifyingKey::from_bytes(&self.0).map_err(|e| LedgerError::InvalidSignature {
            reason: format!("account {self} is not an ed25519 key: {e}"),
        })
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    #[must_use]
    pub fn short(&self) -> String {
        hex::encode(&self.0[..4])
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "acct:{}", hex::encode(&self.0[..8]))
    }
}

/// An entity that receives rewards. Same key space as every other account.
pub type EntityId = AccountId;

// ---------------------------------------------------------------------------
// DisputeId
// ---------------------------------------------------------------------------

/// Identifier of a raised dispute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct DisputeId(pub Uuid);

impl DisputeId {
    /// Deterministic `DisputeId` from the disputed epoch and the ledger-wide
    /// dispute sequence number.
    #[must_use]
    pub fn deterministic(epoch_id: EpochId, sequence: u64) -> Self {
        use sha2::{Digest, Sha256};
        let mut hasher = Sha256::new();
        hasher.update(b"usageledger:dispute_id:v1:");
        hasher.update(epoch_id.0.to_le_bytes());
        hasher.update(sequence.to_le_bytes());
        let hash = hasher.finalize();
        let mut bytes = [0u8; 16];
        bytes.copy_from_slice(&hash[..16]);
        Self(Uuid::from_bytes(bytes))
    }
}

impl fmt::Display for DisputeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "dispute:{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// ServiceClass
// ---------------------------------------------------------------------------

/// A category of priced service (e.g. `text`, `image`, `video`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct ServiceClass(pub String);

impl ServiceClass {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ServiceClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Deterministic keypair for tests. **Never use in production.**
#[cfg(any(test, feature = "test-helpers"))]
#[must_use]
pub fn test_keypair(seed: u8) -> (ed25519_dalek::SigningKey, AccountId) {
    let signing = ed25519_dalek::SigningKey::from_bytes(&[seed; 32]);
    let account = AccountId::from_verifying_key(&signing.verifying_key());
    (signing, account)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
