use chargewatch::backend::{
    ChargingBackend, PricePayload, SessionEnergyPayload, StatusPayload, TelemetryPayload,
};
use chargewatch::config::Config;
use chargewatch::error::{ChargewatchError, Result};
use chargewatch::freeze::StopNotice;
use chargewatch::identity::SessionIdentity;
use chargewatch::monitor::{Monitor, MonitorHandle, MonitorSnapshot};
use chargewatch::status::StatusValue;
use chrono::{TimeZone, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Default)]
struct Script {
    log_status: HashMap<String, StatusPayload>,
    cache_status: HashMap<String, StatusPayload>,
    energy_kwh: f64,
    price: f64,
    balances: HashMap<String, f64>,
    balance_delay: HashMap<String, Duration>,
    status_delay: Option<Duration>,
    stop_fails: bool,
    stop_calls: Vec<(String, String)>,
    calls: usize,
}

#[derive(Default)]
struct ScriptedBackend {
    script: Mutex<Script>,
}

impl ScriptedBackend {
    fn edit(&self, f: impl FnOnce(&mut Script)) {
        f(&mut self.script.lock().unwrap());
    }

    fn set_status(&self, cp: &str, status: StatusValue) {
        self.edit(|s| {
            let payload = StatusPayload {
                status,
                timestamp: None,
            };
            s.log_status.insert(cp.to_string(), payload.clone());
            s.cache_status.insert(cp.to_string(), payload);
        });
    }

    fn stop_calls(&self) -> Vec<(String, String)> {
        self.script.lock().unwrap().stop_calls.clone()
    }

    fn calls(&self) -> usize {
        self.script.lock().unwrap().calls
    }
}

fn unknown() -> StatusPayload {
    StatusPayload {
        status: StatusValue::Unknown,
        timestamp: None,
    }
}

#[async_trait::async_trait]
impl ChargingBackend for ScriptedBackend {
    async fn status_by_log(&self, cp: &str) -> Result<StatusPayload> {
        let (delay, status) = {
            let mut s = self.script.lock().unwrap();
            s.calls += 1;
            (s.status_delay, s.log_status.get(cp).cloned())
        };
        if let Some(d) = delay {
            tokio::time::sleep(d).await;
        }
        Ok(status.unwrap_or_else(unknown))
    }

    async fn status_by_cache(&self, cp: &str) -> Result<StatusPayload> {
        let (delay, status) = {
            let mut s = self.script.lock().unwrap();
            s.calls += 1;
            (s.status_delay, s.cache_status.get(cp).cloned())
        };
        if let Some(d) = delay {
            tokio::time::sleep(d).await;
        }
        Ok(status.unwrap_or_else(unknown))
    }

    async fn live_telemetry(&self, _cp: &str) -> Result<TelemetryPayload> {
        let mut s = self.script.lock().unwrap();
        s.calls += 1;
        Ok(TelemetryPayload {
            power_kw: 7.2,
            voltage_v: 230.0,
            current_a: 31.3,
            energy_kwh: None,
        })
    }

    async fn session_energy(&self, _cp: &str) -> Result<SessionEnergyPayload> {
        let mut s = self.script.lock().unwrap();
        s.calls += 1;
        Ok(SessionEnergyPayload {
            session_energy_kwh: Some(s.energy_kwh),
            total_energy_kwh: None,
        })
    }

    async fn current_price(&self) -> Result<PricePayload> {
        let mut s = self.script.lock().unwrap();
        s.calls += 1;
        Ok(PricePayload {
            price: s.price,
            label: Some("flat".to_string()),
            fallback: false,
        })
    }

    async fn account_balance(&self, account_id: &str) -> Result<f64> {
        let (delay, balance) = {
            let mut s = self.script.lock().unwrap();
            s.calls += 1;
            (
                s.balance_delay.get(account_id).copied(),
                s.balances.get(account_id).copied(),
            )
        };
        if let Some(d) = delay {
            tokio::time::sleep(d).await;
        }
        balance.ok_or_else(|| ChargewatchError::api("no balance"))
    }

    async fn stop_session(&self, cp: &str, reason: &str) -> Result<()> {
        let mut s = self.script.lock().unwrap();
        s.stop_calls.push((cp.to_string(), reason.to_string()));
        if s.stop_fails {
            return Err(ChargewatchError::api("stop-session returned 502"));
        }
        Ok(())
    }
}

fn fast_config() -> Config {
    let mut cfg = Config::default();
    cfg.intervals.status_log_ms = 50;
    cfg.intervals.status_cache_ms = 40;
    cfg.intervals.reconcile_ms = 20;
    cfg.intervals.telemetry_ms = 20;
    cfg.intervals.pricing_ms = 100;
    cfg.intervals.balance_ms = 50;
    cfg.backend.request_timeout_ms = 200;
    cfg
}

async fn wait_for(
    handle: &MonitorHandle,
    pred: impl Fn(&MonitorSnapshot) -> bool,
) -> Arc<MonitorSnapshot> {
    let mut rx = handle.subscribe();
    tokio::time::timeout(Duration::from_secs(60), async {
        loop {
            let snap = rx.borrow_and_update().clone();
            if pred(&snap) {
                return snap;
            }
            rx.changed().await.expect("monitor stopped");
        }
    })
    .await
    .expect("condition not reached")
}

fn is_cp(snap: &MonitorSnapshot, cp: &str) -> bool {
    snap.identity
        .as_ref()
        .is_some_and(|i| i.charge_point_id == cp)
}

#[tokio::test(start_paused = true)]
async fn auto_stop_fires_once_and_reports_exhaustion() {
    let backend = Arc::new(ScriptedBackend::default());
    backend.set_status("CP-1", StatusValue::Charging);
    backend.edit(|s| {
        s.price = 1.0;
        s.energy_kwh = 19.9995;
        s.balances.insert("acc-1".to_string(), 20.0);
    });

    let (handle, _task) = Monitor::spawn(fast_config(), backend.clone());
    handle
        .set_identity(SessionIdentity::new("acc-1", "CP-1"))
        .unwrap();

    wait_for(&handle, |s| s.auto_stop_sent).await;
    // many more qualifying ticks
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(
        backend.stop_calls(),
        vec![("CP-1".to_string(), "balance_exhausted".to_string())]
    );

    backend.set_status("CP-1", StatusValue::Finishing);
    let snap = wait_for(&handle, |s| s.notice.is_some()).await;
    assert_eq!(snap.notice, Some(StopNotice::BalanceExhausted));
    assert_eq!(snap.canonical_status, StatusValue::Finishing);

    handle.acknowledge_notice().unwrap();
    wait_for(&handle, |s| s.notice.is_none()).await;
    assert_eq!(backend.stop_calls().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn identity_switch_rearms_auto_stop() {
    let backend = Arc::new(ScriptedBackend::default());
    backend.set_status("CP-1", StatusValue::Charging);
    backend.set_status("CP-2", StatusValue::Charging);
    backend.edit(|s| {
        s.price = 1.0;
        s.energy_kwh = 0.0;
        s.balances.insert("acc-1".to_string(), 0.0);
        s.balances.insert("acc-2".to_string(), 0.0005);
    });

    let (handle, _task) = Monitor::spawn(fast_config(), backend.clone());
    handle
        .set_identity(SessionIdentity::new("acc-1", "CP-1"))
        .unwrap();
    let first = wait_for(&handle, |s| s.auto_stop_sent).await;
    assert!(is_cp(&first, "CP-1"));

    handle
        .set_identity(SessionIdentity::new("acc-2", "CP-2"))
        .unwrap();
    let switched = wait_for(&handle, |s| is_cp(s, "CP-2")).await;
    assert!(switched.epoch > first.epoch);
    assert!(!switched.auto_stop_sent);
    assert!(switched.notice.is_none());

    wait_for(&handle, |s| is_cp(s, "CP-2") && s.auto_stop_sent).await;
    tokio::time::sleep(Duration::from_secs(2)).await;
    let calls = backend.stop_calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[1].0, "CP-2");
}

#[tokio::test(start_paused = true)]
async fn late_results_from_previous_identity_are_discarded() {
    let backend = Arc::new(ScriptedBackend::default());
    backend.edit(|s| {
        s.price = 1.0;
        s.balances.insert("acc-1".to_string(), 500.0);
        s.balance_delay
            .insert("acc-1".to_string(), Duration::from_secs(3));
        s.balances.insert("acc-2".to_string(), 7.0);
    });

    let (handle, _task) = Monitor::spawn(fast_config(), backend.clone());
    handle
        .set_identity(SessionIdentity::new("acc-1", "CP-1"))
        .unwrap();
    // let the slow balance request get in flight
    tokio::time::sleep(Duration::from_millis(100)).await;
    handle
        .set_identity(SessionIdentity::new("acc-2", "CP-2"))
        .unwrap();

    let snap = wait_for(&handle, |s| s.stale_discards >= 1).await;
    assert!(is_cp(&snap, "CP-2"));
    assert_ne!(snap.raw_balance, Some(500.0));

    tokio::time::sleep(Duration::from_secs(5)).await;
    let snap = handle.current();
    assert!(is_cp(&snap, "CP-2"));
    assert_eq!(snap.raw_balance, Some(7.0));
}

#[tokio::test(start_paused = true)]
async fn balance_freezes_until_settlement() {
    let backend = Arc::new(ScriptedBackend::default());
    backend.set_status("CP-1", StatusValue::Charging);
    backend.edit(|s| {
        s.price = 1.0;
        s.energy_kwh = 40.0;
        s.balances.insert("acc-1".to_string(), 100.0);
    });

    let mut cfg = fast_config();
    cfg.identity.account_id = Some("acc-1".to_string());
    cfg.identity.charge_point_id = Some("CP-1".to_string());
    let (handle, _task) = Monitor::spawn(cfg, backend.clone());

    wait_for(&handle, |s| {
        s.canonical_status == StatusValue::Charging && (s.display_balance - 60.0).abs() < 1e-9
    })
    .await;

    backend.set_status("CP-1", StatusValue::Finishing);
    let snap = wait_for(&handle, |s| s.frozen).await;
    assert_eq!(snap.notice, Some(StopNotice::SessionStopped));
    assert!((snap.display_balance - 60.0).abs() < 1e-9);

    // post-stop energy creep before settlement
    backend.edit(|s| s.energy_kwh = 43.0);
    tokio::time::sleep(Duration::from_secs(3)).await;
    let snap = handle.current();
    assert!(snap.frozen);
    assert!((snap.display_balance - 60.0).abs() < 1e-9);

    backend.edit(|s| {
        s.balances.insert("acc-1".to_string(), 55.0);
    });
    let snap = wait_for(&handle, |s| !s.frozen).await;
    assert!((snap.display_balance - 12.0).abs() < 1e-9);
}

#[tokio::test(start_paused = true)]
async fn newer_log_timestamp_wins_disagreement() {
    let backend = Arc::new(ScriptedBackend::default());
    backend.edit(|s| {
        s.log_status.insert(
            "CP-1".to_string(),
            StatusPayload {
                status: StatusValue::Finishing,
                timestamp: Utc.timestamp_opt(1_700_000_100, 0).single(),
            },
        );
        s.cache_status.insert(
            "CP-1".to_string(),
            StatusPayload {
                status: StatusValue::Charging,
                timestamp: Utc.timestamp_opt(1_700_000_000, 0).single(),
            },
        );
    });

    let (handle, _task) = Monitor::spawn(fast_config(), backend.clone());
    handle
        .set_identity(SessionIdentity::new("acc-1", "CP-1"))
        .unwrap();
    wait_for(&handle, |s| {
        let known = |sample: &Option<chargewatch::status::StatusSample>| {
            sample.as_ref().is_some_and(|x| x.value.is_known())
        };
        known(&s.log_sample) && known(&s.cache_sample)
    })
    .await;
    // let a reconciliation tick see both samples
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(handle.current().canonical_status, StatusValue::Finishing);
}

#[tokio::test(start_paused = true)]
async fn no_polling_without_identity() {
    let backend = Arc::new(ScriptedBackend::default());
    let (handle, _task) = Monitor::spawn(fast_config(), backend.clone());

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(backend.calls(), 0);
    assert!(handle.current().identity.is_none());

    handle
        .set_identity(SessionIdentity::new("acc-1", "CP-1"))
        .unwrap();
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert!(backend.calls() > 0);

    handle.clear_identity().unwrap();
    wait_for(&handle, |s| s.identity.is_none()).await;
    tokio::time::sleep(Duration::from_millis(500)).await;
    let settled = backend.calls();
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(backend.calls(), settled);
}

#[tokio::test(start_paused = true)]
async fn shutdown_ends_the_actor() {
    let backend = Arc::new(ScriptedBackend::default());
    let (handle, task) = Monitor::spawn(fast_config(), backend);
    handle.shutdown().unwrap();
    let res = tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .unwrap()
        .unwrap();
    assert!(res.is_ok());
    assert!(handle.set_identity(SessionIdentity::new("a", "b")).is_err());
}

#[tokio::test(start_paused = true)]
async fn switching_account_on_same_charge_point_keeps_latch() {
    let backend = Arc::new(ScriptedBackend::default());
    backend.set_status("CP-1", StatusValue::Charging);
    backend.edit(|s| {
        s.price = 1.0;
        s.balances.insert("acc-1".to_string(), 0.0);
        s.balances.insert("acc-2".to_string(), 0.0);
    });

    let (handle, _task) = Monitor::spawn(fast_config(), backend.clone());
    handle
        .set_identity(SessionIdentity::new("acc-1", "CP-1"))
        .unwrap();
    let first = wait_for(&handle, |s| s.auto_stop_sent).await;

    handle
        .set_identity(SessionIdentity::new("acc-2", "CP-1"))
        .unwrap();
    let switched = wait_for(&handle, |s| s.epoch > first.epoch).await;
    assert!(switched.auto_stop_sent);

    tokio::time::sleep(Duration::from_secs(3)).await;
    assert_eq!(backend.stop_calls().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn hung_requests_time_out() {
    let backend = Arc::new(ScriptedBackend::default());
    backend.set_status("CP-1", StatusValue::Charging);
    backend.edit(|s| {
        s.price = 1.0;
        s.balances.insert("acc-1".to_string(), 50.0);
    });

    let (handle, _task) = Monitor::spawn(fast_config(), backend.clone());
    handle
        .set_identity(SessionIdentity::new("acc-1", "CP-1"))
        .unwrap();
    wait_for(&handle, |s| {
        s.canonical_status == StatusValue::Charging && s.raw_balance == Some(50.0)
    })
    .await;

    // Both feeds now hang far beyond the request timeout
    backend.edit(|s| {
        s.balances.insert("acc-1".to_string(), 99.0);
        s.balance_delay
            .insert("acc-1".to_string(), Duration::from_secs(30));
        s.status_delay = Some(Duration::from_secs(30));
    });
    let started = tokio::time::Instant::now();
    let snap = wait_for(&handle, |s| {
        s.canonical_status == StatusValue::Unknown
            && s.feed_health.balance.consecutive_failures >= 2
    })
    .await;
    assert!(started.elapsed() < Duration::from_secs(30));
    assert_eq!(snap.raw_balance, Some(50.0));
    assert!(snap.log_sample.as_ref().is_some_and(|x| !x.value.is_known()));
    assert!(snap.cache_sample.as_ref().is_some_and(|x| !x.value.is_known()));
}

#[tokio::test(start_paused = true)]
async fn failed_stop_command_is_not_retried() {
    let backend = Arc::new(ScriptedBackend::default());
    backend.set_status("CP-1", StatusValue::Charging);
    backend.edit(|s| {
        s.price = 1.0;
        s.stop_fails = true;
        s.balances.insert("acc-1".to_string(), 0.0);
    });

    let (handle, _task) = Monitor::spawn(fast_config(), backend.clone());
    handle
        .set_identity(SessionIdentity::new("acc-1", "CP-1"))
        .unwrap();
    wait_for(&handle, |s| s.auto_stop_sent).await;

    // still charging with an exhausted balance on every later tick
    tokio::time::sleep(Duration::from_secs(5)).await;
    let snap = handle.current();
    assert_eq!(snap.canonical_status, StatusValue::Charging);
    assert!(snap.auto_stop_sent);
    assert!(snap.reconcile_ticks > 100);
    assert_eq!(backend.stop_calls().len(), 1);
}
