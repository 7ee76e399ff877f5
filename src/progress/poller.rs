use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Re-runs `fetch` every `period` while `visible` reads `true`, pushing
/// each result into `sink`.
///
/// The task ends on its own when the view reports hidden, when the
/// visibility handle is dropped, or when nobody listens on `sink` anymore.
/// Fetch failures are logged and the next tick tries again.
pub fn spawn_poller<T, E, F, Fut>(
    period: Duration,
    mut visible: watch::Receiver<bool>,
    mut fetch: F,
    sink: mpsc::Sender<T>,
) -> JoinHandle<()>
where
    T: Send + 'static,
    E: Display + Send + 'static,
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<T, E>> + Send,
{
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // the first tick completes immediately
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if !*visible.borrow() {
                        break;
                    }
                    match fetch().await {
                        Ok(value) => {
                            if sink.send(value).await.is_err() {
                                break;
                            }
                        }
                        Err(e) => tracing::warn!(error = %e, "poll failed"),
                    }
                }
                changed = visible.changed() => {
                    if changed.is_err() || !*visible.borrow() {
                        break;
                    }
                }
                _ = sink.closed() => break,
            }
        }
        tracing::debug!("poller stopped");
    })
}
