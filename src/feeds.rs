//! Periodically refreshed backend values
//!
//! Telemetry, price and balance are sticky: a failed read keeps the last
//! good value so the display does not flicker on transient errors. Status
//! samples are deliberately not handled here; see [`crate::status`].

pub mod balance;
pub mod pricing;
pub mod telemetry;

pub use balance::BalanceFeed;
pub use pricing::{PriceQuote, PricingFeed};
pub use telemetry::{TelemetryFeed, TelemetrySample, resolve_session_energy};

use crate::error::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Read health of one feed, as exposed in the snapshot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedHealth {
    pub last_success: Option<DateTime<Utc>>,
    pub consecutive_failures: u32,
}

/// Health of every sticky feed of the selected identity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedHealthReport {
    pub telemetry: FeedHealth,
    pub pricing: FeedHealth,
    pub balance: FeedHealth,
}

/// Last successful value of a feed plus failure bookkeeping
#[derive(Debug, Clone, Serialize)]
pub struct Sticky<T> {
    value: Option<T>,
    last_success: Option<DateTime<Utc>>,
    consecutive_failures: u32,
}

impl<T> Default for Sticky<T> {
    fn default() -> Self {
        Self {
            value: None,
            last_success: None,
            consecutive_failures: 0,
        }
    }
}

impl<T> Sticky<T> {
    /// Seed a value that counts as present but was never fetched
    pub fn seeded(value: T) -> Self {
        Self {
            value: Some(value),
            ..Self::default()
        }
    }

    pub fn get(&self) -> Option<&T> {
        self.value.as_ref()
    }

    pub fn health(&self) -> FeedHealth {
        FeedHealth {
            last_success: self.last_success,
            consecutive_failures: self.consecutive_failures,
        }
    }

    /// Replace on success, retain on failure. Returns the fresh value when
    /// the read succeeded.
    pub fn apply(&mut self, result: Result<T>) -> Option<&T> {
        match result {
            Ok(v) => {
                self.value = Some(v);
                self.last_success = Some(Utc::now());
                self.consecutive_failures = 0;
                self.value.as_ref()
            }
            Err(_) => {
                self.consecutive_failures = self.consecutive_failures.saturating_add(1);
                None
            }
        }
    }
}
