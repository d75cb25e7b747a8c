//! Emergency pause switch.
//!
//! While paused, the value-moving entry points (commit, dispute, finalize,
//! claim) are blocked. Arbitration and administration keep working so that
//! pending disputes can still be settled and the pause can be lifted.

use chrono::{DateTime, Utc};
use usageledger_types::{AccountId, LedgerError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PauseState {
    Running,
    Paused {
        by: AccountId,
        reason: String,
        since: DateTime<Utc>,
    },
}

#[derive(Debug, Clone)]
pub struct PauseSwitch {
    state: PauseState,
}

impl PauseSwitch {
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: PauseState::Running,
        }
    }

    #[must_use]
    pub fn state(&self) -> &PauseState {
        &self.state
    }

    #[must_use]
    pub fn is_paused(&self) -> bool {
        matches!(self.state, PauseState::Paused { .. })
    }

    /// Returns `false` if already paused (the original pause is kept).
    pub fn pause(&mut self, by: AccountId, reason: String, at: DateTime<Utc>) -> bool {
        if self.is_paused() {
            return false;
        }
        self.state = PauseState::Paused {
            by,
            reason,
            since: at,
        };
        true
    }

    /// Returns `false` if not paused.
    pub fn resume(&mut self) -> bool {
        let was_paused = self.is_paused();
        self.state = PauseState::Running;
        was_paused
    }

    /// Guard a value-moving call.
    ///
    /// # Errors
    /// Returns [`LedgerError::LedgerPaused`] while paused.
    pub fn check(&self) -> Result<()> {
        if self.is_paused() {
            Err(LedgerError::LedgerPaused)
        } else {
            Ok(())
        }
    }
}

impl Default for PauseSwitch {
    fn default() -> Self {
        Self::new()
    }
}
