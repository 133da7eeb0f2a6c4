use super::*;

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8080".to_string(),
            request_timeout_ms: 4000,
            status_log_path: "/api/chargepoints/{charge_point_id}/status/log".to_string(),
            status_cache_path: "/api/chargepoints/{charge_point_id}/status/cache".to_string(),
            telemetry_path: "/api/chargepoints/{charge_point_id}/telemetry".to_string(),
            session_energy_path: "/api/chargepoints/{charge_point_id}/session/energy".to_string(),
            price_path: "/api/pricing/current".to_string(),
            balance_path: "/api/accounts/{account_id}/balance".to_string(),
            stop_path: "/api/chargepoints/{charge_point_id}/stop".to_string(),
        }
    }
}

impl Default for IntervalsConfig {
    fn default() -> Self {
        Self {
            status_log_ms: 5000,
            status_cache_ms: 3000,
            reconcile_ms: 2000,
            telemetry_ms: 1000,
            pricing_ms: 60_000,
            balance_ms: 5000,
        }
    }
}

impl Default for ThresholdsConfig {
    fn default() -> Self {
        Self {
            exhausted_balance: 0.001,
            settlement_epsilon: 0.01,
            stop_reason: "balance_exhausted".to_string(),
        }
    }
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            default_price_per_kwh: None,
            default_label: "default".to_string(),
            currency_symbol: "€".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "INFO".to_string(),
            console_level: None,
            file_level: None,
            file: "/tmp/chargewatch.log".to_string(),
            backup_count: 5,
            console_output: true,
            json_format: false,
        }
    }
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: "127.0.0.1".to_string(),
            port: 8090,
        }
    }
}
