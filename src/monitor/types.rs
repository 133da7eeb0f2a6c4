use crate::backend::{PricePayload, SessionEnergyPayload, TelemetryPayload};
use crate::error::Result;
use crate::feeds::{FeedHealthReport, PriceQuote, TelemetrySample};
use crate::freeze::StopNotice;
use crate::identity::SessionIdentity;
use crate::status::{StatusSample, StatusValue};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Commands accepted by the monitor from external components (web, main)
#[derive(Debug, Clone)]
pub enum MonitorCommand {
    SetIdentity(SessionIdentity),
    ClearIdentity,
    AcknowledgeNotice,
    Shutdown,
}

/// Result of one poll, as produced by a feed task
#[derive(Debug)]
pub enum FeedPayload {
    /// Failed reads arrive as an `Unknown` sample without timestamp
    Status(StatusSample),
    Telemetry {
        telemetry: Result<TelemetryPayload>,
        energy: Result<SessionEnergyPayload>,
    },
    Price(Result<PricePayload>),
    Balance(Result<f64>),
}

/// Poll result tagged with the identity generation it was issued under
#[derive(Debug)]
pub struct FeedUpdate {
    pub epoch: u64,
    pub payload: FeedPayload,
}

/// Committed state published after every change
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MonitorSnapshot {
    pub identity: Option<SessionIdentity>,
    pub epoch: u64,
    pub canonical_status: StatusValue,
    pub log_sample: Option<StatusSample>,
    pub cache_sample: Option<StatusSample>,
    pub telemetry: Option<TelemetrySample>,
    pub price: Option<PriceQuote>,
    pub raw_balance: Option<f64>,
    pub live_cost: f64,
    pub display_balance: f64,
    pub frozen: bool,
    pub auto_stop_sent: bool,
    pub notice: Option<StopNotice>,
    pub feed_health: FeedHealthReport,
    /// Reconciliation ticks since the identity was selected
    pub reconcile_ticks: u64,
    /// Late results from superseded identities dropped so far
    pub stale_discards: u64,
    pub updated_at: Option<DateTime<Utc>>,
}
