//! Presentation of a monitor snapshot
//!
//! Read-only: nothing here feeds back into the monitor.

use crate::monitor::MonitorSnapshot;
use crate::status::StatusValue;
use serde::{Deserialize, Serialize};

/// Operator-facing label for each canonical status
pub fn status_label(status: StatusValue) -> &'static str {
    match status {
        StatusValue::Available => "Available",
        StatusValue::Preparing => "Preparing",
        StatusValue::Charging => "Charging",
        StatusValue::SuspendedEV => "Suspended by vehicle",
        StatusValue::SuspendedEVSE => "Suspended by charger",
        StatusValue::Finishing => "Finishing",
        StatusValue::Faulted => "Faulted",
        StatusValue::Unavailable => "Unavailable",
        StatusValue::Unknown => "Unknown",
    }
}

/// Fixed-precision rendering; non-finite values render as 0
fn fixed(value: f64, decimals: usize) -> String {
    let v = if value.is_finite() { value } else { 0.0 };
    format!("{:.*}", decimals, v)
}

/// Formatted fields ready for a UI
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisplayView {
    pub charge_point_id: Option<String>,
    pub account_id: Option<String>,
    pub status: StatusValue,
    pub status_label: String,
    /// 3 decimals
    pub balance: String,
    /// 2 decimals
    pub cost: String,
    /// 4 decimals
    pub energy_kwh: String,
    /// 2 decimals
    pub power_kw: String,
    /// 1 decimal
    pub voltage_v: String,
    /// 2 decimals
    pub current_a: String,
    pub currency_symbol: String,
    pub price_label: String,
    pub price_is_fallback: bool,
    pub frozen: bool,
    pub auto_stop_sent: bool,
    pub notice: Option<String>,
}

impl DisplayView {
    pub fn project(snapshot: &MonitorSnapshot, currency_symbol: &str) -> Self {
        let telemetry = snapshot.telemetry.unwrap_or_default();
        let (price_label, price_is_fallback) = snapshot
            .price
            .as_ref()
            .map_or(("-".to_string(), false), |q| {
                let label = if q.label.is_empty() {
                    "-".to_string()
                } else {
                    q.label.clone()
                };
                (label, q.is_fallback)
            });

        Self {
            charge_point_id: snapshot.identity.as_ref().map(|i| i.charge_point_id.clone()),
            account_id: snapshot.identity.as_ref().map(|i| i.account_id.clone()),
            status: snapshot.canonical_status,
            status_label: status_label(snapshot.canonical_status).to_string(),
            balance: fixed(snapshot.display_balance, 3),
            cost: fixed(snapshot.live_cost, 2),
            energy_kwh: fixed(telemetry.session_energy_kwh, 4),
            power_kw: fixed(telemetry.power_kw, 2),
            voltage_v: fixed(telemetry.voltage_v, 1),
            current_a: fixed(telemetry.current_a, 2),
            currency_symbol: currency_symbol.to_string(),
            price_label,
            price_is_fallback,
            frozen: snapshot.frozen,
            auto_stop_sent: snapshot.auto_stop_sent,
            notice: snapshot.notice.map(|n| n.message().to_string()),
        }
    }
}
