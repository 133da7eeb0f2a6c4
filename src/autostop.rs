//! Auto-stop on exhausted funds
//!
//! The latch is set before the stop command is even issued, so at most one
//! command is ever in flight per identity. A failed command does not re-arm
//! it; the backend enforces its own cutoff.

use crate::status::StatusValue;
use serde::{Deserialize, Serialize};

/// Set at most once per identity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutoStopLatch {
    sent: bool,
}

impl AutoStopLatch {
    pub fn sent(self) -> bool {
        self.sent
    }
}

/// Stop command to issue
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StopRequest {
    pub reason: String,
}

#[derive(Debug, Clone)]
pub struct AutoStopTrigger {
    latch: AutoStopLatch,
    exhausted_balance: f64,
    reason: String,
}

impl AutoStopTrigger {
    pub fn new(exhausted_balance: f64, reason: impl Into<String>) -> Self {
        Self {
            latch: AutoStopLatch::default(),
            exhausted_balance,
            reason: reason.into(),
        }
    }

    pub fn latch(&self) -> AutoStopLatch {
        self.latch
    }

    /// Take over a latch that was already set for the same charge point.
    /// A clear latch never un-sets this one.
    pub fn inherit(&mut self, latch: AutoStopLatch) {
        self.latch.sent |= latch.sent;
    }

    /// Check one tick. Only armed while charging with the latch clear, and
    /// only once a balance has been read; either the displayed or the raw
    /// balance reaching the threshold fires it.
    pub fn evaluate(
        &mut self,
        status: StatusValue,
        display_balance: f64,
        raw_balance: Option<f64>,
    ) -> Option<StopRequest> {
        if self.latch.sent || !status.is_charging() {
            return None;
        }
        let raw = raw_balance?;
        if display_balance > self.exhausted_balance && raw > self.exhausted_balance {
            return None;
        }

        self.latch.sent = true;
        Some(StopRequest {
            reason: self.reason.clone(),
        })
    }
}
