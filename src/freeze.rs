//! Balance freeze around session end
//!
//! When a session stops, the backend settles the deduction some time later.
//! Until then the live feeds keep moving (cost may still rise, the balance
//! has not dropped yet) and the displayed balance would bounce. On the
//! Charging → not-Charging edge the controller captures cost and balance
//! and serves those until a fresh balance read shows the deduction posted.

use crate::status::StatusValue;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Balance shown to the operator, never negative
pub fn clamp_balance(baseline: f64, cost: f64) -> f64 {
    let v = baseline - cost;
    if v.is_finite() { v.max(0.0) } else { 0.0 }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum FreezeState {
    Live,
    Frozen {
        frozen_cost: f64,
        frozen_raw_balance: f64,
    },
}

/// One-shot message raised when a session stops
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopNotice {
    /// Funds ran out, or the auto-stop already fired
    BalanceExhausted,
    SessionStopped,
}

impl StopNotice {
    pub fn message(self) -> &'static str {
        match self {
            Self::BalanceExhausted => "stopped: balance exhausted",
            Self::SessionStopped => "session stopped",
        }
    }
}

impl fmt::Display for StopNotice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

#[derive(Debug, Clone)]
pub struct FreezeController {
    state: FreezeState,
    settlement_epsilon: f64,
    exhausted_balance: f64,
}

impl FreezeController {
    pub fn new(settlement_epsilon: f64, exhausted_balance: f64) -> Self {
        Self {
            state: FreezeState::Live,
            settlement_epsilon,
            exhausted_balance,
        }
    }

    pub fn state(&self) -> FreezeState {
        self.state
    }

    pub fn is_frozen(&self) -> bool {
        matches!(self.state, FreezeState::Frozen { .. })
    }

    /// Balance to display given the live inputs
    pub fn display_balance(&self, raw_balance: Option<f64>, live_cost: f64) -> f64 {
        match self.state {
            FreezeState::Live => clamp_balance(raw_balance.unwrap_or(0.0), live_cost),
            FreezeState::Frozen {
                frozen_cost,
                frozen_raw_balance,
            } => clamp_balance(frozen_raw_balance, frozen_cost),
        }
    }

    /// Feed one canonical status step. Freezes on the Charging → not-Charging
    /// edge only and returns the stop notice for that edge.
    ///
    /// The notice is `BalanceExhausted` whenever the auto-stop latch is set or
    /// the balance shown just before the edge was already exhausted; any
    /// other stop is reported neutrally. Without a balance reading there is
    /// nothing to hold steady, so no freeze is taken.
    pub fn on_status(
        &mut self,
        previous: StatusValue,
        current: StatusValue,
        live_cost: f64,
        raw_balance: Option<f64>,
        auto_stop_sent: bool,
    ) -> Option<StopNotice> {
        if !(previous.is_charging() && !current.is_charging()) {
            return None;
        }

        let exhausted = raw_balance.is_some()
            && self.display_balance(raw_balance, live_cost) <= self.exhausted_balance;
        let notice = if auto_stop_sent || exhausted {
            StopNotice::BalanceExhausted
        } else {
            StopNotice::SessionStopped
        };

        if let Some(raw) = raw_balance {
            self.state = FreezeState::Frozen {
                frozen_cost: live_cost,
                frozen_raw_balance: raw,
            };
        }
        Some(notice)
    }

    /// Feed a freshly fetched balance. Unfreezes once it has dropped below
    /// the frozen baseline by more than the settlement epsilon; returns true
    /// on that transition.
    pub fn on_fresh_balance(&mut self, fresh: f64) -> bool {
        match self.state {
            FreezeState::Frozen {
                frozen_raw_balance, ..
            } if fresh < frozen_raw_balance - self.settlement_epsilon => {
                self.state = FreezeState::Live;
                true
            }
            _ => false,
        }
    }
}
