use super::ChargingBackend;
use super::types::{
    PricePayload, SessionEnergyPayload, StatusPayload, StopRequestBody, TelemetryPayload,
    decode_balance, decode_price, decode_session_energy, decode_status, decode_telemetry,
};
use crate::config::BackendConfig;
use crate::error::{ChargewatchError, Result};
use crate::logging::{StructuredLogger, get_logger};
use reqwest::Url;
use reqwest::header::{ACCEPT, USER_AGENT};

/// REST client for the charging backend
pub struct HttpBackend {
    client: reqwest::Client,
    config: BackendConfig,
    logger: StructuredLogger,
}

impl HttpBackend {
    pub fn new(config: BackendConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()?;
        Ok(Self {
            client,
            config,
            logger: get_logger("backend"),
        })
    }

    /// Expand a path template against the base URL. Ids are pushed as
    /// percent-encoded path segments, so `/`, `?` or `#` inside an id can
    /// never reach another endpoint.
    fn url(
        &self,
        template: &str,
        charge_point_id: Option<&str>,
        account_id: Option<&str>,
    ) -> Result<Url> {
        let mut url = Url::parse(self.config.base_url.trim_end_matches('/'))
            .map_err(|e| ChargewatchError::config(format!("Invalid backend base_url: {}", e)))?;
        {
            let mut segments = url.path_segments_mut().map_err(|_| {
                ChargewatchError::config("Backend base_url cannot carry a path")
            })?;
            segments.pop_if_empty();
            for segment in template.split('/').filter(|s| !s.is_empty()) {
                let mut expanded = segment.to_string();
                if let Some(cp) = charge_point_id {
                    expanded = expanded.replace("{charge_point_id}", cp);
                }
                if let Some(acc) = account_id {
                    expanded = expanded.replace("{account_id}", acc);
                }
                segments.push(&expanded);
            }
        }
        Ok(url)
    }

    async fn get_json(&self, url: Url) -> Result<serde_json::Value> {
        let resp = self
            .client
            .get(url.clone())
            .header(ACCEPT, "application/json")
            .header(USER_AGENT, concat!("chargewatch/", env!("CARGO_PKG_VERSION")))
            .send()
            .await?;

        if !resp.status().is_success() {
            self.logger
                .debug(&format!("GET {} returned {}", url, resp.status()));
            return Err(ChargewatchError::api(format!(
                "GET {} returned {}",
                url,
                resp.status()
            )));
        }

        Ok(resp.json::<serde_json::Value>().await?)
    }
}

#[async_trait::async_trait]
impl ChargingBackend for HttpBackend {
    async fn status_by_log(&self, charge_point_id: &str) -> Result<StatusPayload> {
        let url = self.url(&self.config.status_log_path, Some(charge_point_id), None)?;
        Ok(decode_status(&self.get_json(url).await?))
    }

    async fn status_by_cache(&self, charge_point_id: &str) -> Result<StatusPayload> {
        let url = self.url(&self.config.status_cache_path, Some(charge_point_id), None)?;
        Ok(decode_status(&self.get_json(url).await?))
    }

    async fn live_telemetry(&self, charge_point_id: &str) -> Result<TelemetryPayload> {
        let url = self.url(&self.config.telemetry_path, Some(charge_point_id), None)?;
        decode_telemetry(&self.get_json(url).await?)
    }

    async fn session_energy(&self, charge_point_id: &str) -> Result<SessionEnergyPayload> {
        let url = self.url(&self.config.session_energy_path, Some(charge_point_id), None)?;
        decode_session_energy(&self.get_json(url).await?)
    }

    async fn current_price(&self) -> Result<PricePayload> {
        let url = self.url(&self.config.price_path, None, None)?;
        decode_price(&self.get_json(url).await?)
    }

    async fn account_balance(&self, account_id: &str) -> Result<f64> {
        let url = self.url(&self.config.balance_path, None, Some(account_id))?;
        decode_balance(&self.get_json(url).await?)
    }

    async fn stop_session(&self, charge_point_id: &str, reason: &str) -> Result<()> {
        let url = self.url(&self.config.stop_path, Some(charge_point_id), None)?;
        let resp = self
            .client
            .post(url)
            .header(ACCEPT, "application/json")
            .json(&StopRequestBody {
                reason: reason.to_string(),
            })
            .send()
            .await?;

        if resp.status().is_success() {
            Ok(())
        } else {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            Err(ChargewatchError::api(format!(
                "stop-session returned {}: {}",
                status,
                body.trim()
            )))
        }
    }
}
