//! Configuration management for ChargeWatch
//!
//! This module handles loading, validation, and management of the monitor
//! configuration from YAML files.

use crate::error::{ChargewatchError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

mod defaults;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// Charging backend connection and endpoint layout
    pub backend: BackendConfig,

    /// Poll and reconciliation cadences
    pub intervals: IntervalsConfig,

    /// Balance and settlement thresholds
    pub thresholds: ThresholdsConfig,

    /// Price fallback and presentation
    pub pricing: PricingConfig,

    /// Identity selected at startup (optional)
    pub identity: IdentityConfig,

    /// Logging configuration
    pub logging: LoggingConfig,

    /// Web server binding configuration
    pub web: WebConfig,
}

/// Charging backend endpoints
///
/// Paths are templates; `{charge_point_id}` and `{account_id}` are
/// substituted per request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Base URL, e.g. `https://backend.example.com`
    pub base_url: String,

    /// Deadline applied to every backend request
    pub request_timeout_ms: u64,

    pub status_log_path: String,
    pub status_cache_path: String,
    pub telemetry_path: String,
    pub session_energy_path: String,
    pub price_path: String,
    pub balance_path: String,
    pub stop_path: String,
}

/// Poll cadences in milliseconds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IntervalsConfig {
    pub status_log_ms: u64,
    pub status_cache_ms: u64,
    /// Canonical status recomputation tick
    pub reconcile_ms: u64,
    /// Telemetry and session energy share one poller
    pub telemetry_ms: u64,
    pub pricing_ms: u64,
    pub balance_ms: u64,
}

/// Balance thresholds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ThresholdsConfig {
    /// Balance at or below this value counts as exhausted
    pub exhausted_balance: f64,

    /// Minimum drop below the frozen balance that proves settlement posted
    pub settlement_epsilon: f64,

    /// Reason code sent with the auto-stop command
    pub stop_reason: String,
}

/// Pricing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PricingConfig {
    /// Rate used until the first successful price fetch
    pub default_price_per_kwh: Option<f64>,

    /// Label shown with the default rate
    pub default_label: String,

    /// Currency symbol
    pub currency_symbol: String,
}

/// Initial identity
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct IdentityConfig {
    pub account_id: Option<String>,
    pub charge_point_id: Option<String>,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    pub level: String,

    /// Console-specific level override
    pub console_level: Option<String>,

    /// File-specific level override
    pub file_level: Option<String>,

    /// Log directory or file path
    pub file: String,

    /// Number of rotated files to keep
    pub backup_count: u32,

    /// Whether to log to console
    pub console_output: bool,

    /// Whether to use JSON format
    pub json_format: bool,
}

/// Web server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebConfig {
    pub enabled: bool,

    /// Bind address
    pub host: String,

    /// TCP port
    pub port: u16,
}

impl IntervalsConfig {
    pub fn status_log(&self) -> Duration {
        Duration::from_millis(self.status_log_ms)
    }

    pub fn status_cache(&self) -> Duration {
        Duration::from_millis(self.status_cache_ms)
    }

    pub fn reconcile(&self) -> Duration {
        Duration::from_millis(self.reconcile_ms)
    }

    pub fn telemetry(&self) -> Duration {
        Duration::from_millis(self.telemetry_ms)
    }

    pub fn pricing(&self) -> Duration {
        Duration::from_millis(self.pricing_ms)
    }

    pub fn balance(&self) -> Duration {
        Duration::from_millis(self.balance_ms)
    }
}

impl BackendConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl Config {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from the first location that exists
    pub fn load() -> Result<Self> {
        if let Some(path) = std::env::var_os("CHARGEWATCH_CONFIG") {
            return Self::from_file(path);
        }

        let default_paths = ["chargewatch.yaml", "/etc/chargewatch/config.yaml"];
        for path in &default_paths {
            if Path::new(path).exists() {
                return Self::from_file(path);
            }
        }

        Ok(Config::default())
    }

    /// Save configuration to a YAML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.backend.base_url.trim().is_empty() {
            return Err(ChargewatchError::validation(
                "backend.base_url",
                "Base URL cannot be empty",
            ));
        }

        if self.backend.request_timeout_ms == 0 {
            return Err(ChargewatchError::validation(
                "backend.request_timeout_ms",
                "Must be greater than 0",
            ));
        }

        let intervals = [
            ("intervals.status_log_ms", self.intervals.status_log_ms),
            ("intervals.status_cache_ms", self.intervals.status_cache_ms),
            ("intervals.reconcile_ms", self.intervals.reconcile_ms),
            ("intervals.telemetry_ms", self.intervals.telemetry_ms),
            ("intervals.pricing_ms", self.intervals.pricing_ms),
            ("intervals.balance_ms", self.intervals.balance_ms),
        ];
        for (field, value) in intervals {
            if value == 0 {
                return Err(ChargewatchError::validation(field, "Must be greater than 0"));
            }
        }

        let exhausted = self.thresholds.exhausted_balance;
        if !exhausted.is_finite() || exhausted < 0.0 {
            return Err(ChargewatchError::validation(
                "thresholds.exhausted_balance",
                "Must be non-negative",
            ));
        }

        let epsilon = self.thresholds.settlement_epsilon;
        if !epsilon.is_finite() || epsilon < 0.0 {
            return Err(ChargewatchError::validation(
                "thresholds.settlement_epsilon",
                "Must be non-negative",
            ));
        }

        if self.thresholds.stop_reason.trim().is_empty() {
            return Err(ChargewatchError::validation(
                "thresholds.stop_reason",
                "Reason code cannot be empty",
            ));
        }

        if let Some(price) = self.pricing.default_price_per_kwh
            && !(price.is_finite() && price >= 0.0)
        {
            return Err(ChargewatchError::validation(
                "pricing.default_price_per_kwh",
                "Must be a finite, non-negative rate",
            ));
        }

        // Half-specified identities are a configuration mistake, not a default
        if self.identity.account_id.is_some() != self.identity.charge_point_id.is_some() {
            return Err(ChargewatchError::validation(
                "identity",
                "account_id and charge_point_id must be set together",
            ));
        }
        let ids = [
            ("identity.account_id", &self.identity.account_id),
            ("identity.charge_point_id", &self.identity.charge_point_id),
        ];
        for (field, id) in ids {
            if id.as_deref().is_some_and(|v| v.trim().is_empty()) {
                return Err(ChargewatchError::validation(field, "Cannot be blank"));
            }
        }

        Ok(())
    }
}
