//! Role-based access control.
//!
//! Each privileged operation names the [`Role`] it needs and the caller is
//! checked against the grant table. The genesis admin is installed at
//! construction; the last admin can never be revoked, so administration is
//! never locked out.

use std::collections::{BTreeSet, HashMap};

use usageledger_types::{AccountId, LedgerError, Result, Role};

#[derive(Debug, Clone)]
pub struct AccessControl {
    grants: HashMap<Role, BTreeSet<AccountId>>,
}

impl AccessControl {
    #[must_use]
    pub fn new(genesis_admin: AccountId) -> Self {
        let mut grants = HashMap::new();
        grants.insert(Role::Admin, BTreeSet::from([genesis_admin]));
        Self { grants }
    }

    #[must_use]
    pub fn has_role(&self, account: &AccountId, role: Role) -> bool {
        self.grants
            .get(&role)
            .is_some_and(|holders| holders.contains(account))
    }

    /// # Errors
    /// Returns [`LedgerError::Unauthorized`] if `caller` lacks `role`.
    pub fn require(&self, caller: &AccountId, role: Role) -> Result<()> {
        if self.has_role(caller, role) {
            Ok(())
        } else {
            tracing::warn!(caller = %caller, required = %role, "Unauthorized call rejected");
            Err(LedgerError::Unauthorized {
                caller: *caller,
                required: role,
            })
        }
    }

    /// Returns `false` if the account already held the role.
    pub fn grant(&mut self, account: AccountId, role: Role) -> bool {
        self.grants.entry(role).or_default().insert(account)
    }

    /// Returns `false` if the account did not hold the role.
    ///
    /// # Errors
    /// Returns [`LedgerError::InvalidTransition`] when revoking the last
    /// admin.
    pub fn revoke(&mut self, account: &AccountId, role: Role) -> Result<bool> {
        let Some(holders) = self.grants.get_mut(&role) else {
            return Ok(false);
        };
        if role == Role::Admin && holders.len() == 1 && holders.contains(account) {
            return Err(LedgerError::InvalidTransition {
                reason: "cannot revoke the last admin".into(),
            });
        }
        Ok(holders.remove(account))
    }

    /// Holders of a role, in key order.
    pub fn holders(&self, role: Role) -> impl Iterator<Item = &AccountId> {
        self.grants.get(&role).into_iter().flatten()
    }
}
