//! # ChargeWatch - real-time charging session monitor
//!
//! Watches one charge point for one account, reconciles the charge point
//! status reported by two independent backends, derives live cost and the
//! displayed balance, freezes that balance across the stop-to-settlement
//! window, and stops the session automatically when funds run out.
//!
//! ## Architecture
//!
//! - `config`: YAML configuration with defaults and validation
//! - `logging`: Structured logging and tracing
//! - `backend`: Charging backend trait and HTTP client
//! - `status`: Status reconciliation between the log and cache sources
//! - `feeds`: Sticky telemetry, pricing and balance feeds
//! - `billing`, `freeze`, `autostop`: Cost, balance freeze and auto-stop
//! - `session`: Per-identity state, rebuilt on every identity switch
//! - `monitor`: Single-owner actor, feed pollers and snapshot publication
//! - `display`: Formatting of snapshots for operators
//! - `web`: HTTP API and server-sent events

pub mod autostop;
pub mod backend;
pub mod billing;
pub mod config;
pub mod display;
pub mod error;
pub mod feeds;
pub mod freeze;
pub mod identity;
pub mod logging;
pub mod monitor;
pub mod session;
pub mod status;
pub mod web;

// Re-export commonly used types
pub use config::Config;
pub use error::{ChargewatchError, Result};
pub use monitor::{Monitor, MonitorHandle, MonitorSnapshot};
