use super::{FeedHealth, Sticky};
use crate::backend::{SessionEnergyPayload, TelemetryPayload};
use crate::error::{ChargewatchError, Result};
use serde::{Deserialize, Serialize};

/// Latest electrical readings for the session
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TelemetrySample {
    pub power_kw: f64,
    pub voltage_v: f64,
    pub current_a: f64,
    pub session_energy_kwh: f64,
}

/// First present of: dedicated session energy, cumulative total energy,
/// the telemetry energy counter.
pub fn resolve_session_energy(
    session: Option<&SessionEnergyPayload>,
    telemetry: Option<&TelemetryPayload>,
) -> Option<f64> {
    session
        .and_then(|s| s.session_energy_kwh)
        .or_else(|| session.and_then(|s| s.total_energy_kwh))
        .or_else(|| telemetry.and_then(|t| t.energy_kwh))
}

fn finite_or_zero(v: f64) -> f64 {
    if v.is_finite() { v } else { 0.0 }
}

/// Telemetry and session energy, fetched together on one cadence
#[derive(Debug, Clone, Default)]
pub struct TelemetryFeed {
    sample: Sticky<TelemetrySample>,
}

impl TelemetryFeed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sample(&self) -> Option<&TelemetrySample> {
        self.sample.get()
    }

    pub fn health(&self) -> FeedHealth {
        self.sample.health()
    }

    /// Session energy, 0 before the first successful read
    pub fn session_energy_kwh(&self) -> f64 {
        self.sample.get().map_or(0.0, |s| s.session_energy_kwh)
    }

    /// Fold one poll round into the stored sample.
    ///
    /// Both reads failing keeps the previous sample untouched. When one read
    /// failed and the other carries no energy figure, the previous energy is
    /// kept rather than dropping the cost to zero.
    pub fn apply(
        &mut self,
        telemetry: Result<TelemetryPayload>,
        energy: Result<SessionEnergyPayload>,
    ) -> bool {
        if telemetry.is_err() && energy.is_err() {
            self.sample
                .apply(Err(ChargewatchError::api("telemetry and energy reads failed")));
            return false;
        }

        let previous = self.sample.get().copied().unwrap_or_default();
        let resolved = resolve_session_energy(energy.as_ref().ok(), telemetry.as_ref().ok());
        let session_energy_kwh = match resolved {
            Some(kwh) => finite_or_zero(kwh).max(0.0),
            // Only two clean reads without any energy field mean zero
            None if telemetry.is_ok() && energy.is_ok() => 0.0,
            None => previous.session_energy_kwh,
        };

        let next = match telemetry {
            Ok(t) => TelemetrySample {
                power_kw: finite_or_zero(t.power_kw),
                voltage_v: finite_or_zero(t.voltage_v),
                current_a: finite_or_zero(t.current_a),
                session_energy_kwh,
            },
            Err(_) => TelemetrySample {
                session_energy_kwh,
                ..previous
            },
        };
        self.sample.apply(Ok(next));
        true
    }
}
