//! Backend payloads and their lenient decoding
//!
//! Backends disagree on shape: some wrap bodies in `{"data": ...}`, some
//! return bare strings or numbers, and numbers sometimes arrive as strings.
//! Decoders here accept all of those and never panic; a payload that
//! cannot yield the one value a feed needs becomes an `Api` error so the
//! feed can fall back to its sticky value.

use crate::error::{ChargewatchError, Result};
use crate::status::StatusValue;
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Epoch values above this are milliseconds
const EPOCH_MILLIS_THRESHOLD: f64 = 1e12;

/// `status-by-log` / `status-by-cache` response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusPayload {
    pub status: StatusValue,
    pub timestamp: Option<DateTime<Utc>>,
}

/// `live-telemetry` response
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TelemetryPayload {
    pub power_kw: f64,
    pub voltage_v: f64,
    pub current_a: f64,
    /// Instantaneous energy counter, when the charger exposes one
    pub energy_kwh: Option<f64>,
}

/// `session-energy` response
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionEnergyPayload {
    pub session_energy_kwh: Option<f64>,
    pub total_energy_kwh: Option<f64>,
}

/// `current-price` response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricePayload {
    pub price: f64,
    pub label: Option<String>,
    pub fallback: bool,
}

/// Body of `stop-session`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StopRequestBody {
    pub reason: String,
}

fn unwrap_envelope(value: &Value) -> &Value {
    match value.get("data") {
        Some(inner) if !inner.is_null() => inner,
        _ => value,
    }
}

/// First non-null field among `keys`
fn field<'a>(value: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    let obj = value.as_object()?;
    keys.iter()
        .filter_map(|k| obj.get(*k))
        .find(|v| !v.is_null())
}

/// Finite number from a JSON number or numeric string
pub fn decode_number(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    n.is_finite().then_some(n)
}

/// RFC 3339 string, or epoch seconds/milliseconds as number or string
pub fn decode_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    if let Value::String(s) = value
        && let Ok(dt) = DateTime::parse_from_rfc3339(s.trim())
    {
        return Some(dt.with_timezone(&Utc));
    }
    let n = decode_number(value)?;
    if n >= EPOCH_MILLIS_THRESHOLD {
        Utc.timestamp_millis_opt(n as i64).single()
    } else {
        Utc.timestamp_opt(n as i64, 0).single()
    }
}

/// Status from `{status, timestamp?}` or a bare string. Never fails:
/// anything unreadable is `Unknown` without a timestamp.
pub fn decode_status(value: &Value) -> StatusPayload {
    let value = unwrap_envelope(value);
    if let Value::String(s) = value {
        return StatusPayload {
            status: StatusValue::from_token(s),
            timestamp: None,
        };
    }
    let status = field(value, &["status", "state"])
        .and_then(Value::as_str)
        .map_or(StatusValue::Unknown, StatusValue::from_token);
    let timestamp = field(value, &["timestamp", "updatedAt", "updated_at", "time"])
        .and_then(decode_timestamp);
    StatusPayload { status, timestamp }
}

/// Telemetry fields default to 0 when absent or non-finite
pub fn decode_telemetry(value: &Value) -> Result<TelemetryPayload> {
    let value = unwrap_envelope(value);
    if !value.is_object() {
        return Err(ChargewatchError::api("telemetry payload is not an object"));
    }
    let num = |keys: &[&str]| field(value, keys).and_then(decode_number);
    Ok(TelemetryPayload {
        power_kw: num(&["power", "powerKw", "power_kw"]).unwrap_or(0.0),
        voltage_v: num(&["voltage", "voltageV", "voltage_v"]).unwrap_or(0.0),
        current_a: num(&["current", "currentA", "current_a"]).unwrap_or(0.0),
        energy_kwh: num(&["energy", "energyKWh", "energy_kwh"]),
    })
}

pub fn decode_session_energy(value: &Value) -> Result<SessionEnergyPayload> {
    let value = unwrap_envelope(value);
    if !value.is_object() {
        return Err(ChargewatchError::api("session energy payload is not an object"));
    }
    let num = |keys: &[&str]| field(value, keys).and_then(decode_number);
    Ok(SessionEnergyPayload {
        session_energy_kwh: num(&["sessionEnergyKWh", "sessionEnergyKwh", "session_energy_kwh"]),
        total_energy_kwh: num(&["totalEnergyKWh", "totalEnergyKwh", "total_energy_kwh"]),
    })
}

pub fn decode_price(value: &Value) -> Result<PricePayload> {
    let value = unwrap_envelope(value);
    let price = field(value, &["price", "pricePerKWh", "price_per_kwh"])
        .and_then(decode_number)
        .ok_or_else(|| ChargewatchError::api("price payload has no usable price"))?;
    let label = field(value, &["label", "name"])
        .and_then(Value::as_str)
        .map(str::to_string);
    let fallback = field(value, &["fallback", "isFallback", "is_fallback"])
        .and_then(Value::as_bool)
        .unwrap_or(false);
    Ok(PricePayload {
        price,
        label,
        fallback,
    })
}

/// Balance from `{balance}` or a bare number
pub fn decode_balance(value: &Value) -> Result<f64> {
    let value = unwrap_envelope(value);
    decode_number(value)
        .or_else(|| field(value, &["balance", "amount"]).and_then(decode_number))
        .ok_or_else(|| ChargewatchError::api("balance payload has no usable balance"))
}
