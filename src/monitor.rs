//! Monitor actor
//!
//! A single task owns all session state. Feed pollers push tagged results
//! over a channel, external components send [`MonitorCommand`]s, and every
//! committed change is published as an immutable [`MonitorSnapshot`] on a
//! `watch` channel. Readers never see a half-applied update.

mod pollers;
mod runtime;
pub mod types;

pub use types::{FeedPayload, FeedUpdate, MonitorCommand, MonitorSnapshot};

use crate::backend::ChargingBackend;
use crate::config::Config;
use crate::error::{ChargewatchError, Result};
use crate::identity::{IdentitySelector, SessionIdentity};
use crate::logging::StructuredLogger;
use crate::session::SessionState;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

pub struct Monitor {
    config: Config,
    backend: Arc<dyn ChargingBackend>,
    selector: IdentitySelector,
    session: Option<SessionState>,
    logger: StructuredLogger,
    commands_rx: mpsc::UnboundedReceiver<MonitorCommand>,
    feed_tx: mpsc::UnboundedSender<FeedUpdate>,
    feed_rx: mpsc::UnboundedReceiver<FeedUpdate>,
    epoch_tx: watch::Sender<u64>,
    snapshot_tx: watch::Sender<Arc<MonitorSnapshot>>,
    stale_discards: u64,
}

/// Cloneable front door to a running monitor
#[derive(Clone)]
pub struct MonitorHandle {
    commands_tx: mpsc::UnboundedSender<MonitorCommand>,
    snapshot_rx: watch::Receiver<Arc<MonitorSnapshot>>,
}

impl MonitorHandle {
    fn send(&self, cmd: MonitorCommand) -> Result<()> {
        self.commands_tx
            .send(cmd)
            .map_err(|_| ChargewatchError::generic("Monitor is not running"))
    }

    pub fn set_identity(&self, identity: SessionIdentity) -> Result<()> {
        self.send(MonitorCommand::SetIdentity(identity))
    }

    pub fn clear_identity(&self) -> Result<()> {
        self.send(MonitorCommand::ClearIdentity)
    }

    pub fn acknowledge_notice(&self) -> Result<()> {
        self.send(MonitorCommand::AcknowledgeNotice)
    }

    pub fn shutdown(&self) -> Result<()> {
        self.send(MonitorCommand::Shutdown)
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<MonitorSnapshot>> {
        self.snapshot_rx.clone()
    }

    /// Latest committed snapshot
    pub fn current(&self) -> Arc<MonitorSnapshot> {
        self.snapshot_rx.borrow().clone()
    }
}

impl Monitor {
    /// Create the actor and its handle without starting it
    pub fn new(config: Config, backend: Arc<dyn ChargingBackend>) -> (Self, MonitorHandle) {
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (feed_tx, feed_rx) = mpsc::unbounded_channel();
        let (epoch_tx, _) = watch::channel(0u64);
        let (snapshot_tx, snapshot_rx) = watch::channel(Arc::new(MonitorSnapshot::default()));

        let monitor = Self {
            config,
            backend,
            selector: IdentitySelector::new(),
            session: None,
            logger: crate::logging::get_logger("monitor"),
            commands_rx,
            feed_tx,
            feed_rx,
            epoch_tx,
            snapshot_tx,
            stale_discards: 0,
        };
        let handle = MonitorHandle {
            commands_tx,
            snapshot_rx,
        };
        (monitor, handle)
    }

    /// Start the actor on the current runtime
    pub fn spawn(
        config: Config,
        backend: Arc<dyn ChargingBackend>,
    ) -> (MonitorHandle, JoinHandle<Result<()>>) {
        let (mut monitor, handle) = Self::new(config, backend);
        let task = tokio::spawn(async move { monitor.run().await });
        (handle, task)
    }
}
