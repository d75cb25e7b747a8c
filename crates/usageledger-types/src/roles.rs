//! Capability roles checked by privileged ledger operations.

use serde::{Deserialize, Serialize};

/// A capability held by an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub enum Role {
    /// May commit settlements (the off-chain aggregator).
    Committer,
    /// May resolve disputes.
    Arbiter,
    /// May set pricing policies, grant/revoke roles, cancel settlements,
    /// and pause the ledger.
    Admin,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Committer => write!(f, "COMMITTER"),
            Self::Arbiter => write!(f, "ARBITER"),
            Self::Admin => write!(f, "ADMIN"),
        }
    }
}
