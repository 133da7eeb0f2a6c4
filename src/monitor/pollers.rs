use super::types::{FeedPayload, FeedUpdate};
use crate::backend::{ChargingBackend, StatusPayload};
use crate::config::Config;
use crate::error::Result;
use crate::identity::SessionIdentity;
use crate::status::{StatusSample, StatusSource};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};

/// Everything a poller needs, fixed at the epoch it was started for
#[derive(Clone)]
pub(super) struct PollerContext {
    pub backend: Arc<dyn ChargingBackend>,
    pub identity: SessionIdentity,
    pub epoch: u64,
    pub feed_tx: mpsc::UnboundedSender<FeedUpdate>,
    pub epoch_rx: watch::Receiver<u64>,
    pub request_timeout: Duration,
}

async fn with_timeout<T>(limit: Duration, fut: impl Future<Output = Result<T>>) -> Result<T> {
    tokio::time::timeout(limit, fut).await?
}

fn status_sample(source: StatusSource, result: Result<StatusPayload>) -> StatusSample {
    match result {
        Ok(payload) => StatusSample::new(source, payload.status, payload.timestamp),
        Err(_) => StatusSample::unknown(source),
    }
}

/// Poll `fetch` every `period` until the epoch moves on. A request already
/// in flight is allowed to finish; its result is dropped by the actor.
fn spawn_poller<F, Fut>(
    name: &'static str,
    ctx: PollerContext,
    period: Duration,
    fetch: F,
) -> JoinHandle<()>
where
    F: Fn(Arc<dyn ChargingBackend>, SessionIdentity, Duration) -> Fut + Send + 'static,
    Fut: Future<Output = FeedPayload> + Send + 'static,
{
    let PollerContext {
        backend,
        identity,
        epoch,
        feed_tx,
        mut epoch_rx,
        request_timeout,
    } = ctx;

    tokio::spawn(async move {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                changed = epoch_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
            if *epoch_rx.borrow() != epoch {
                break;
            }

            let payload = fetch(backend.clone(), identity.clone(), request_timeout).await;
            if feed_tx.send(FeedUpdate { epoch, payload }).is_err() {
                break;
            }
        }
        tracing::debug!("{} poller for epoch {} stopped", name, epoch);
    })
}

/// Start one poller per feed for the given identity
pub(super) fn spawn_all(ctx: PollerContext, config: &Config) -> Vec<JoinHandle<()>> {
    let intervals = &config.intervals;
    vec![
        spawn_poller(
            "status-log",
            ctx.clone(),
            intervals.status_log(),
            |backend, identity, limit| async move {
                let res = with_timeout(limit, backend.status_by_log(&identity.charge_point_id)).await;
                FeedPayload::Status(status_sample(StatusSource::Log, res))
            },
        ),
        spawn_poller(
            "status-cache",
            ctx.clone(),
            intervals.status_cache(),
            |backend, identity, limit| async move {
                let res =
                    with_timeout(limit, backend.status_by_cache(&identity.charge_point_id)).await;
                FeedPayload::Status(status_sample(StatusSource::Cache, res))
            },
        ),
        spawn_poller(
            "telemetry",
            ctx.clone(),
            intervals.telemetry(),
            |backend, identity, limit| async move {
                let cp = identity.charge_point_id.as_str();
                let (telemetry, energy) = tokio::join!(
                    with_timeout(limit, backend.live_telemetry(cp)),
                    with_timeout(limit, backend.session_energy(cp)),
                );
                FeedPayload::Telemetry { telemetry, energy }
            },
        ),
        spawn_poller(
            "pricing",
            ctx.clone(),
            intervals.pricing(),
            |backend, _identity, limit| async move {
                FeedPayload::Price(with_timeout(limit, backend.current_price()).await)
            },
        ),
        spawn_poller(
            "balance",
            ctx,
            intervals.balance(),
            |backend, identity, limit| async move {
                FeedPayload::Balance(
                    with_timeout(limit, backend.account_balance(&identity.account_id)).await,
                )
            },
        ),
    ]
}
