use super::pollers::{self, PollerContext};
use super::types::{FeedPayload, FeedUpdate, MonitorCommand, MonitorSnapshot};
use crate::autostop::StopRequest;
use crate::error::Result;
use crate::identity::SessionIdentity;
use crate::session::SessionState;
use std::sync::Arc;
use tokio::time::{MissedTickBehavior, interval};

impl super::Monitor {
    /// Run the actor until shutdown or until every handle is dropped
    pub async fn run(&mut self) -> Result<()> {
        self.logger.info("Starting charging session monitor");

        if let (Some(account), Some(cp)) = (
            self.config.identity.account_id.clone(),
            self.config.identity.charge_point_id.clone(),
        ) {
            self.switch_identity(Some(SessionIdentity::new(account, cp)));
        }

        let mut reconcile = interval(self.config.intervals.reconcile());
        reconcile.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = reconcile.tick() => {
                    self.reconcile_tick();
                }
                Some(update) = self.feed_rx.recv() => {
                    self.apply_feed(update);
                }
                cmd = self.commands_rx.recv() => {
                    match cmd {
                        Some(MonitorCommand::Shutdown) | None => {
                            self.logger.info("Shutdown requested");
                            break;
                        }
                        Some(cmd) => self.handle_command(cmd),
                    }
                }
            }
        }

        // Let pollers wind down
        self.switch_identity(None);
        self.logger.info("Monitor stopped");
        Ok(())
    }

    pub(crate) fn handle_command(&mut self, cmd: MonitorCommand) {
        match cmd {
            MonitorCommand::SetIdentity(identity) => self.switch_identity(Some(identity)),
            MonitorCommand::ClearIdentity => self.switch_identity(None),
            MonitorCommand::AcknowledgeNotice => {
                if let Some(session) = self.session.as_mut()
                    && let Some(notice) = session.acknowledge_notice()
                {
                    self.logger.debug(&format!("Notice acknowledged: {}", notice));
                    self.publish();
                }
            }
            MonitorCommand::Shutdown => {}
        }
    }

    /// Replace all per-identity state and restart the pollers. Pollers of the
    /// previous epoch see the epoch move and exit after their current call.
    fn switch_identity(&mut self, identity: Option<SessionIdentity>) {
        let epoch = match identity {
            Some(id) => self.selector.select(id),
            None => self.selector.clear(),
        };
        let Some(epoch) = epoch else {
            return;
        };

        let carried = self
            .session
            .as_ref()
            .map(|s| (s.identity().charge_point_id.clone(), s.auto_stop_latch()));
        self.session = self.selector.current().cloned().map(|id| {
            let same_charge_point = carried
                .as_ref()
                .is_some_and(|(cp, _)| *cp == id.charge_point_id);
            let mut session = SessionState::new(id, epoch, &self.config);
            if same_charge_point && let Some((_, latch)) = carried {
                session.inherit_auto_stop_latch(latch);
            }
            session
        });
        self.epoch_tx.send_replace(epoch);

        match self.selector.current() {
            Some(identity) => {
                self.logger
                    .info(&format!("Monitoring {} (epoch {})", identity, epoch));
                let ctx = PollerContext {
                    backend: self.backend.clone(),
                    identity: identity.clone(),
                    epoch,
                    feed_tx: self.feed_tx.clone(),
                    epoch_rx: self.epoch_tx.subscribe(),
                    request_timeout: self.config.backend.request_timeout(),
                };
                // Handles are not kept: pollers stop on their own via the epoch
                let _ = pollers::spawn_all(ctx, &self.config);
            }
            None => self
                .logger
                .info(&format!("Identity cleared (epoch {})", epoch)),
        }
        self.publish();
    }

    pub(crate) fn apply_feed(&mut self, update: FeedUpdate) {
        let current = self.selector.epoch();
        let session = match self.session.as_mut() {
            Some(s) if update.epoch == current => s,
            _ => {
                self.stale_discards = self.stale_discards.saturating_add(1);
                self.logger.debug(&format!(
                    "Discarding result from epoch {} (current {})",
                    update.epoch, current
                ));
                return;
            }
        };

        match update.payload {
            FeedPayload::Status(sample) => session.observe_status(sample),
            FeedPayload::Telemetry { telemetry, energy } => {
                session.apply_telemetry(telemetry, energy)
            }
            FeedPayload::Price(result) => session.apply_price(result),
            FeedPayload::Balance(result) => session.apply_balance(result),
        }
        self.publish();
    }

    pub(crate) fn reconcile_tick(&mut self) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        let outcome = session.tick();
        if let Some(stop) = outcome.stop {
            self.issue_stop(stop);
        }
        self.publish();
    }

    /// Send the stop command without waiting on it
    fn issue_stop(&self, stop: StopRequest) {
        let Some(identity) = self.selector.current().cloned() else {
            return;
        };
        let backend = self.backend.clone();
        let limit = self.config.backend.request_timeout();
        let logger = crate::logging::get_logger_with_context(
            crate::logging::LogContext::new("autostop")
                .with_charge_point(identity.charge_point_id.clone())
                .with_account(identity.account_id.clone())
                .with_epoch(self.selector.epoch()),
        );
        tokio::spawn(async move {
            let res = tokio::time::timeout(
                limit,
                backend.stop_session(&identity.charge_point_id, &stop.reason),
            )
            .await;
            match res {
                Ok(Ok(())) => logger.info("Stop command accepted"),
                Ok(Err(e)) => logger.error(&format!("Stop command failed: {}", e)),
                Err(_) => logger.error("Stop command timed out"),
            }
        });
    }

    fn publish(&self) {
        let mut snapshot = match self.session.as_ref() {
            Some(session) => session.snapshot(),
            None => MonitorSnapshot {
                epoch: self.selector.epoch(),
                updated_at: Some(chrono::Utc::now()),
                ..MonitorSnapshot::default()
            },
        };
        snapshot.stale_discards = self.stale_discards;
        self.snapshot_tx.send_replace(Arc::new(snapshot));
    }
}
