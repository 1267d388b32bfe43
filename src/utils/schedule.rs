//! Periodic background tasks

use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Spawn a task that runs `cycle` immediately and then every `period` until
/// `cancel` fires. Cycles never overlap.
pub fn spawn_periodic<F, Fut>(
    name: &'static str,
    period: Duration,
    cancel: CancellationToken,
    mut cycle: F,
) -> JoinHandle<()>
where
    F: FnMut(CancellationToken) -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        info!("Starting {} every {:?}", name, period);
        let mut ticker = interval(period.max(Duration::from_millis(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    tokio::select! {
                        _ = cycle(cancel.clone()) => {}
                        _ = cancel.cancelled() => break,
                    }
                }
                _ = cancel.cancelled() => break,
            }
        }

        info!("{} stopped", name);
    })
}
