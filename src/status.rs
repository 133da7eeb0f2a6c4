//! Charge point status reconciliation
//!
//! Two backends report the charge point status independently: a persistent
//! log and a volatile cache. Neither is authoritative. [`reconcile`] merges
//! the latest sample from each into one canonical value and holds no
//! history of its own, so it can be exercised without any timers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Charge point status as reported by the backend (OCPP connector states)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum StatusValue {
    Available,
    Preparing,
    Charging,
    SuspendedEV,
    SuspendedEVSE,
    Finishing,
    Faulted,
    Unavailable,
    #[default]
    Unknown,
}

/// Localized spellings of "unknown" seen in backend payloads
const UNKNOWN_TOKENS: &[&str] = &[
    "unknown",
    "未知",
    "desconocido",
    "desconhecido",
    "inconnu",
    "unbekannt",
    "sconosciuto",
    "onbekend",
    "nieznany",
    "不明",
];

impl StatusValue {
    /// Normalize a raw status token. Matching ignores case, whitespace,
    /// `_` and `-`; anything unrecognised is `Unknown`.
    pub fn from_token(raw: &str) -> Self {
        let trimmed = raw.trim();
        let lowered = trimmed.to_lowercase();
        if UNKNOWN_TOKENS.contains(&lowered.as_str()) {
            return Self::Unknown;
        }

        let compact: String = lowered
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '_' && *c != '-')
            .collect();
        match compact.as_str() {
            "available" => Self::Available,
            "preparing" => Self::Preparing,
            "charging" => Self::Charging,
            "suspendedev" => Self::SuspendedEV,
            "suspendedevse" => Self::SuspendedEVSE,
            "finishing" => Self::Finishing,
            "faulted" => Self::Faulted,
            "unavailable" => Self::Unavailable,
            _ => Self::Unknown,
        }
    }

    pub fn is_known(self) -> bool {
        self != Self::Unknown
    }

    pub fn is_charging(self) -> bool {
        self == Self::Charging
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Available => "Available",
            Self::Preparing => "Preparing",
            Self::Charging => "Charging",
            Self::SuspendedEV => "SuspendedEV",
            Self::SuspendedEVSE => "SuspendedEVSE",
            Self::Finishing => "Finishing",
            Self::Faulted => "Faulted",
            Self::Unavailable => "Unavailable",
            Self::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for StatusValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which backend produced a sample
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StatusSource {
    /// Persistent status log
    Log,
    /// Volatile status cache
    Cache,
}

/// One status observation from one source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusSample {
    pub source: StatusSource,
    pub value: StatusValue,
    /// Server-side timestamp, when the backend supplied one
    pub observed_at: Option<DateTime<Utc>>,
}

impl StatusSample {
    pub fn new(source: StatusSource, value: StatusValue, observed_at: Option<DateTime<Utc>>) -> Self {
        Self {
            source,
            value,
            observed_at,
        }
    }

    /// Placeholder for a failed or missing read
    pub fn unknown(source: StatusSource) -> Self {
        Self::new(source, StatusValue::Unknown, None)
    }
}

/// Merge the latest log and cache samples into the canonical status.
///
/// Precedence:
/// 1. a known value beats `Unknown`
/// 2. both timestamped: the later wins, ties go to the cache
/// 3. otherwise log=Available with cache=Charging yields Charging, since the
///    cache sees sessions before the log records them
/// 4. otherwise the log wins
pub fn reconcile(log: &StatusSample, cache: &StatusSample) -> StatusValue {
    match (log.value.is_known(), cache.value.is_known()) {
        (false, false) => return StatusValue::Unknown,
        (true, false) => return log.value,
        (false, true) => return cache.value,
        (true, true) => {}
    }

    if let (Some(log_ts), Some(cache_ts)) = (log.observed_at, cache.observed_at) {
        return if log_ts > cache_ts {
            log.value
        } else {
            cache.value
        };
    }

    if log.value == StatusValue::Available && cache.value == StatusValue::Charging {
        return StatusValue::Charging;
    }

    log.value
}

/// Latest sample per source
#[derive(Debug, Clone)]
pub struct StatusReconciler {
    log: StatusSample,
    cache: StatusSample,
}

impl Default for StatusReconciler {
    fn default() -> Self {
        Self {
            log: StatusSample::unknown(StatusSource::Log),
            cache: StatusSample::unknown(StatusSource::Cache),
        }
    }
}

impl StatusReconciler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the latest sample for the sample's source
    pub fn observe(&mut self, sample: StatusSample) {
        match sample.source {
            StatusSource::Log => self.log = sample,
            StatusSource::Cache => self.cache = sample,
        }
    }

    pub fn log_sample(&self) -> &StatusSample {
        &self.log
    }

    pub fn cache_sample(&self) -> &StatusSample {
        &self.cache
    }

    pub fn canonical(&self) -> StatusValue {
        reconcile(&self.log, &self.cache)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> Option<DateTime<Utc>> {
        Utc.timestamp_opt(secs, 0).single()
    }

    fn log(value: StatusValue, ts: Option<DateTime<Utc>>) -> StatusSample {
        StatusSample::new(StatusSource::Log, value, ts)
    }

    fn cache(value: StatusValue, ts: Option<DateTime<Utc>>) -> StatusSample {
        StatusSample::new(StatusSource::Cache, value, ts)
    }

    #[test]
    fn token_normalization() {
        assert_eq!(StatusValue::from_token("Charging"), StatusValue::Charging);
        assert_eq!(StatusValue::from_token(" charging "), StatusValue::Charging);
        assert_eq!(StatusValue::from_token("SUSPENDED_EV"), StatusValue::SuspendedEV);
        assert_eq!(StatusValue::from_token("suspended-evse"), StatusValue::SuspendedEVSE);
        assert_eq!(StatusValue::from_token("未知"), StatusValue::Unknown);
        assert_eq!(StatusValue::from_token("Desconocido"), StatusValue::Unknown);
        assert_eq!(StatusValue::from_token(""), StatusValue::Unknown);
        assert_eq!(StatusValue::from_token("Reserved"), StatusValue::Unknown);
        for placeholder in ["n/a", "NA", "none", "null", "-"] {
            assert_eq!(StatusValue::from_token(placeholder), StatusValue::Unknown);
        }
    }

    #[test]
    fn known_beats_unknown() {
        let l = log(StatusValue::Unknown, at(100));
        let c = cache(StatusValue::Preparing, None);
        assert_eq!(reconcile(&l, &c), StatusValue::Preparing);

        let l = log(StatusValue::Finishing, None);
        let c = cache(StatusValue::Unknown, at(100));
        assert_eq!(reconcile(&l, &c), StatusValue::Finishing);
    }

    #[test]
    fn both_unknown_is_unknown() {
        let l = StatusSample::unknown(StatusSource::Log);
        let c = StatusSample::unknown(StatusSource::Cache);
        assert_eq!(reconcile(&l, &c), StatusValue::Unknown);
    }

    #[test]
    fn later_timestamp_wins() {
        let l = log(StatusValue::Charging, at(10));
        let c = cache(StatusValue::Available, at(5));
        assert_eq!(reconcile(&l, &c), StatusValue::Charging);

        let l = log(StatusValue::Charging, at(5));
        let c = cache(StatusValue::Finishing, at(10));
        assert_eq!(reconcile(&l, &c), StatusValue::Finishing);
    }

    #[test]
    fn timestamp_tie_favors_cache() {
        let l = log(StatusValue::Charging, at(7));
        let c = cache(StatusValue::SuspendedEV, at(7));
        assert_eq!(reconcile(&l, &c), StatusValue::SuspendedEV);
    }

    #[test]
    fn untimestamped_available_vs_charging_prefers_charging() {
        let l = log(StatusValue::Available, None);
        let c = cache(StatusValue::Charging, None);
        assert_eq!(reconcile(&l, &c), StatusValue::Charging);
    }

    #[test]
    fn untimestamped_disagreement_falls_back_to_log() {
        let l = log(StatusValue::Charging, None);
        let c = cache(StatusValue::Available, None);
        assert_eq!(reconcile(&l, &c), StatusValue::Charging);

        let l = log(StatusValue::Finishing, None);
        let c = cache(StatusValue::Charging, None);
        assert_eq!(reconcile(&l, &c), StatusValue::Finishing);

        // one-sided timestamp cannot order the samples
        let l = log(StatusValue::Faulted, at(1));
        let c = cache(StatusValue::Charging, None);
        assert_eq!(reconcile(&l, &c), StatusValue::Faulted);
    }

    #[test]
    fn reconciler_keeps_only_latest_per_source() {
        let mut r = StatusReconciler::new();
        assert_eq!(r.canonical(), StatusValue::Unknown);

        r.observe(log(StatusValue::Charging, None));
        r.observe(log(StatusValue::Finishing, None));
        assert_eq!(r.canonical(), StatusValue::Finishing);
        assert_eq!(r.log_sample().value, StatusValue::Finishing);

        // a failed read replaces the prior sample rather than sticking
        r.observe(StatusSample::unknown(StatusSource::Log));
        r.observe(cache(StatusValue::Available, None));
        assert_eq!(r.canonical(), StatusValue::Available);
    }

    #[test]
    fn repeating_a_sample_is_idempotent() {
        let mut r = StatusReconciler::new();
        r.observe(log(StatusValue::Available, None));
        r.observe(cache(StatusValue::Charging, None));
        let first = r.canonical();
        for _ in 0..5 {
            r.observe(cache(StatusValue::Charging, None));
            assert_eq!(r.canonical(), first);
        }
    }
}
