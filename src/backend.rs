//! Charging backend client
//!
//! The monitor only consumes the backend through [`ChargingBackend`], so the
//! runtime can be driven by the HTTP client in production and by scripted
//! fakes in tests.

pub mod http;
pub mod types;

pub use http::HttpBackend;
pub use types::{PricePayload, SessionEnergyPayload, StatusPayload, TelemetryPayload};

use crate::error::Result;

/// Services consumed by the monitor
#[async_trait::async_trait]
pub trait ChargingBackend: Send + Sync {
    async fn status_by_log(&self, charge_point_id: &str) -> Result<StatusPayload>;

    async fn status_by_cache(&self, charge_point_id: &str) -> Result<StatusPayload>;

    async fn live_telemetry(&self, charge_point_id: &str) -> Result<TelemetryPayload>;

    async fn session_energy(&self, charge_point_id: &str) -> Result<SessionEnergyPayload>;

    async fn current_price(&self) -> Result<PricePayload>;

    async fn account_balance(&self, account_id: &str) -> Result<f64>;

    /// Ask the backend to end the session. Fire-and-forget from the
    /// monitor's point of view; the result is only logged.
    async fn stop_session(&self, charge_point_id: &str, reason: &str) -> Result<()>;
}
