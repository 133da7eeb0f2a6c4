//! Per-identity monitor state
//!
//! Everything that belongs to one (account, charge point) selection lives in
//! [`SessionState`]. Switching identity replaces the whole value; nothing is
//! carried over or patched field by field.

use crate::autostop::{AutoStopLatch, AutoStopTrigger, StopRequest};
use crate::backend::{PricePayload, SessionEnergyPayload, TelemetryPayload};
use crate::billing::live_cost;
use crate::config::Config;
use crate::error::{ChargewatchError, Result};
use crate::feeds::{BalanceFeed, FeedHealthReport, PricingFeed, TelemetryFeed};
use crate::freeze::{FreezeController, StopNotice};
use crate::identity::SessionIdentity;
use crate::logging::{LogContext, StructuredLogger, get_logger_with_context};
use crate::monitor::MonitorSnapshot;
use crate::status::{StatusReconciler, StatusSample, StatusValue};

/// What a reconciliation tick produced
#[derive(Debug, Clone, PartialEq)]
pub struct TickOutcome {
    pub status: StatusValue,
    pub notice: Option<StopNotice>,
    pub stop: Option<StopRequest>,
}

pub struct SessionState {
    identity: SessionIdentity,
    epoch: u64,
    reconciler: StatusReconciler,
    canonical: StatusValue,
    telemetry: TelemetryFeed,
    pricing: PricingFeed,
    balance: BalanceFeed,
    freeze: FreezeController,
    auto_stop: AutoStopTrigger,
    notice: Option<StopNotice>,
    ticks: u64,
    logger: StructuredLogger,
}

impl SessionState {
    pub fn new(identity: SessionIdentity, epoch: u64, config: &Config) -> Self {
        let logger = get_logger_with_context(
            LogContext::new("session")
                .with_charge_point(identity.charge_point_id.clone())
                .with_account(identity.account_id.clone())
                .with_epoch(epoch),
        );
        let thresholds = &config.thresholds;
        Self {
            identity,
            epoch,
            reconciler: StatusReconciler::new(),
            canonical: StatusValue::Unknown,
            telemetry: TelemetryFeed::new(),
            pricing: PricingFeed::new(&config.pricing),
            balance: BalanceFeed::new(),
            freeze: FreezeController::new(
                thresholds.settlement_epsilon,
                thresholds.exhausted_balance,
            ),
            auto_stop: AutoStopTrigger::new(
                thresholds.exhausted_balance,
                thresholds.stop_reason.clone(),
            ),
            notice: None,
            ticks: 0,
            logger,
        }
    }

    pub fn identity(&self) -> &SessionIdentity {
        &self.identity
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn canonical_status(&self) -> StatusValue {
        self.canonical
    }

    pub fn notice(&self) -> Option<StopNotice> {
        self.notice
    }

    pub fn auto_stop_sent(&self) -> bool {
        self.auto_stop.latch().sent()
    }

    pub fn auto_stop_latch(&self) -> AutoStopLatch {
        self.auto_stop.latch()
    }

    /// The latch belongs to the charge point: switching only the account
    /// must not re-arm it.
    pub fn inherit_auto_stop_latch(&mut self, latch: AutoStopLatch) {
        self.auto_stop.inherit(latch);
    }

    pub fn is_frozen(&self) -> bool {
        self.freeze.is_frozen()
    }

    pub fn observe_status(&mut self, sample: StatusSample) {
        self.reconciler.observe(sample);
    }

    /// Transient failures are routine; anything else is worth a warning
    fn log_failed_read(&self, feed: &str, err: &ChargewatchError) {
        let msg = format!("{} read failed ({}); keeping last value", feed, err);
        if err.is_transient() {
            self.logger.debug(&msg);
        } else {
            self.logger.warn(&msg);
        }
    }

    pub fn apply_telemetry(
        &mut self,
        telemetry: Result<TelemetryPayload>,
        energy: Result<SessionEnergyPayload>,
    ) {
        if let Err(e) = &telemetry {
            self.log_failed_read("Telemetry", e);
        }
        if let Err(e) = &energy {
            self.log_failed_read("Session energy", e);
        }
        self.telemetry.apply(telemetry, energy);
    }

    pub fn apply_price(&mut self, result: Result<PricePayload>) {
        if let Err(e) = &result {
            self.log_failed_read("Price", e);
        }
        self.pricing.apply(result);
    }

    /// A fresh balance is also the settlement signal for a frozen display
    pub fn apply_balance(&mut self, result: Result<f64>) {
        if let Err(e) = &result {
            self.log_failed_read("Balance", e);
        }
        if let Some(fresh) = self.balance.apply(result)
            && self.freeze.on_fresh_balance(fresh)
        {
            self.logger.info(&format!(
                "Settlement observed (balance {:.3}); display back to live",
                fresh
            ));
        }
    }

    pub fn feed_health(&self) -> FeedHealthReport {
        FeedHealthReport {
            telemetry: self.telemetry.health(),
            pricing: self.pricing.health(),
            balance: self.balance.health(),
        }
    }

    pub fn live_cost(&self) -> f64 {
        live_cost(
            self.telemetry.session_energy_kwh(),
            self.pricing.price_per_kwh(),
        )
    }

    pub fn display_balance(&self) -> f64 {
        self.freeze
            .display_balance(self.balance.raw(), self.live_cost())
    }

    /// Recompute the canonical status, run the freeze edge detector, then
    /// give the auto-stop trigger its chance.
    pub fn tick(&mut self) -> TickOutcome {
        self.ticks = self.ticks.saturating_add(1);
        let previous = self.canonical;
        let current = self.reconciler.canonical();
        let cost = self.live_cost();
        let raw = self.balance.raw();

        let notice = self
            .freeze
            .on_status(previous, current, cost, raw, self.auto_stop_sent());
        if let Some(n) = notice {
            self.logger.info(&format!(
                "Status {} -> {}: {} (display frozen: {})",
                previous,
                current,
                n,
                self.freeze.is_frozen()
            ));
            self.notice = Some(n);
        } else if previous != current {
            self.logger
                .debug(&format!("Status {} -> {}", previous, current));
        }
        self.canonical = current;

        let display = self.freeze.display_balance(raw, cost);
        let stop = self.auto_stop.evaluate(current, display, raw);
        if let Some(ref req) = stop {
            self.logger.warn(&format!(
                "Balance exhausted while charging (display {:.3}, raw {:.3}); requesting stop ({})",
                display,
                raw.unwrap_or(0.0),
                req.reason
            ));
        }

        TickOutcome {
            status: current,
            notice,
            stop,
        }
    }

    pub fn acknowledge_notice(&mut self) -> Option<StopNotice> {
        self.notice.take()
    }

    pub fn snapshot(&self) -> MonitorSnapshot {
        MonitorSnapshot {
            identity: Some(self.identity.clone()),
            epoch: self.epoch,
            canonical_status: self.canonical,
            log_sample: Some(self.reconciler.log_sample().clone()),
            cache_sample: Some(self.reconciler.cache_sample().clone()),
            telemetry: self.telemetry.sample().copied(),
            price: self.pricing.quote().cloned(),
            raw_balance: self.balance.raw(),
            live_cost: self.live_cost(),
            display_balance: self.display_balance(),
            frozen: self.freeze.is_frozen(),
            auto_stop_sent: self.auto_stop_sent(),
            notice: self.notice,
            feed_health: self.feed_health(),
            reconcile_ticks: self.ticks,
            stale_discards: 0,
            updated_at: Some(chrono::Utc::now()),
        }
    }
}
