//! Active (account, charge point) selection
//!
//! Every selection change bumps the epoch. Results tagged with an older epoch
//! belong to a superseded identity and are dropped on arrival.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Operator-selected account and charge point
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionIdentity {
    pub account_id: String,
    pub charge_point_id: String,
}

impl SessionIdentity {
    pub fn new(account_id: impl Into<String>, charge_point_id: impl Into<String>) -> Self {
        Self {
            account_id: account_id.into(),
            charge_point_id: charge_point_id.into(),
        }
    }
}

impl fmt::Display for SessionIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.account_id, self.charge_point_id)
    }
}

/// Holds the current identity and its generation counter
#[derive(Debug, Default)]
pub struct IdentitySelector {
    current: Option<SessionIdentity>,
    epoch: u64,
}

impl IdentitySelector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<&SessionIdentity> {
        self.current.as_ref()
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Select a new identity. Returns the new epoch, or `None` when the
    /// selection is unchanged and nothing needs rebuilding.
    pub fn select(&mut self, identity: SessionIdentity) -> Option<u64> {
        if self.current.as_ref() == Some(&identity) {
            return None;
        }
        self.current = Some(identity);
        self.epoch += 1;
        Some(self.epoch)
    }

    /// Drop the selection; returns the new epoch if there was one
    pub fn clear(&mut self) -> Option<u64> {
        self.current.take()?;
        self.epoch += 1;
        Some(self.epoch)
    }

    pub fn is_current(&self, epoch: u64) -> bool {
        epoch == self.epoch
    }
}
