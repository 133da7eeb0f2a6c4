use chargewatch::config::Config;
use std::fs;

#[test]
fn save_and_load_yaml_roundtrip() {
    let tmp_dir = tempfile::tempdir().unwrap();
    let path = tmp_dir.path().join("config.yaml");

    let mut cfg = Config::default();
    cfg.backend.base_url = "http://10.0.0.5:9000".to_string();
    cfg.identity.account_id = Some("acc-7".to_string());
    cfg.identity.charge_point_id = Some("CP-7".to_string());
    cfg.pricing.default_price_per_kwh = Some(0.31);
    cfg.logging.file = path.with_extension("log").to_string_lossy().to_string();

    cfg.save_to_file(&path).unwrap();
    let loaded = Config::from_file(&path).unwrap();

    assert_eq!(loaded.backend.base_url, "http://10.0.0.5:9000");
    assert_eq!(loaded.identity.charge_point_id.as_deref(), Some("CP-7"));
    assert_eq!(loaded.pricing.default_price_per_kwh, Some(0.31));
    assert_eq!(loaded.logging.file, cfg.logging.file);
    assert!(loaded.validate().is_ok());
}

#[test]
fn partial_yaml_fills_defaults() {
    let tmp = tempfile::NamedTempFile::new().unwrap();
    fs::write(
        tmp.path(),
        "thresholds:\n  exhausted_balance: 0.05\nintervals:\n  balance_ms: 2500\n",
    )
    .unwrap();
    let cfg = Config::from_file(tmp.path()).unwrap();
    assert_eq!(cfg.thresholds.exhausted_balance, 0.05);
    assert_eq!(cfg.thresholds.stop_reason, "balance_exhausted");
    assert_eq!(cfg.intervals.balance_ms, 2500);
    assert_eq!(cfg.intervals.reconcile_ms, Config::default().intervals.reconcile_ms);
}

#[test]
fn config_validation_errors() {
    let mut cfg = Config::default();
    cfg.backend.base_url.clear();
    assert!(cfg.validate().is_err());

    cfg = Config::default();
    cfg.backend.request_timeout_ms = 0;
    assert!(cfg.validate().is_err());

    cfg = Config::default();
    cfg.intervals.reconcile_ms = 0;
    assert!(cfg.validate().is_err());

    cfg = Config::default();
    cfg.thresholds.exhausted_balance = -1.0;
    assert!(cfg.validate().is_err());

    cfg = Config::default();
    cfg.thresholds.settlement_epsilon = f64::NAN;
    assert!(cfg.validate().is_err());

    cfg = Config::default();
    cfg.thresholds.stop_reason = "  ".to_string();
    assert!(cfg.validate().is_err());

    cfg = Config::default();
    cfg.pricing.default_price_per_kwh = Some(f64::INFINITY);
    assert!(cfg.validate().is_err());

    cfg = Config::default();
    cfg.identity.account_id = Some("acc-1".to_string());
    assert!(cfg.validate().is_err());
}

#[test]
fn blank_identity_ids_are_rejected() {
    let mut cfg = Config::default();
    cfg.identity.account_id = Some(String::new());
    cfg.identity.charge_point_id = Some("CP-1".to_string());
    let err = cfg.validate().unwrap_err();
    assert!(err.to_string().contains("identity.account_id"));

    cfg.identity.account_id = Some("acc-1".to_string());
    cfg.identity.charge_point_id = Some("   ".to_string());
    let err = cfg.validate().unwrap_err();
    assert!(err.to_string().contains("identity.charge_point_id"));

    cfg.identity.charge_point_id = Some("CP-1".to_string());
    assert!(cfg.validate().is_ok());
}

#[test]
fn from_file_with_invalid_yaml_fails() {
    let tmp = tempfile::NamedTempFile::new().unwrap();
    fs::write(tmp.path(), "backend: [unterminated").unwrap();
    assert!(Config::from_file(tmp.path()).is_err());
}

#[test]
fn missing_file_is_an_io_error() {
    let err = Config::from_file("/definitely/not/here.yaml").unwrap_err();
    assert!(matches!(err, chargewatch::ChargewatchError::Io { .. }));
}
