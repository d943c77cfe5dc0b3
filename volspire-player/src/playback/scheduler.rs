//! Periodic timers for the pipeline
//!
//! A [`Ticker`] runs a callback on a fixed period from its own tokio task.
//! Dropping or cancelling the ticker stops the task; the callback is not
//! invoked again once [`Ticker::cancel`] has returned on a current-thread
//! runtime. On a multi-threaded runtime a tick may already be in flight, so
//! receivers must still be able to tell a late tick from a live one.

use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

pub struct Ticker {
    name: &'static str,
    token: CancellationToken,
    task: JoinHandle<()>,
}

impl Ticker {
    /// Start ticking every `period`, first tick one period from now
    ///
    /// The ticker stops by itself when `on_tick` returns false.
    pub fn spawn<F>(name: &'static str, period: Duration, mut on_tick: F) -> Self
    where
        F: FnMut() -> bool + Send + 'static,
    {
        let token = CancellationToken::new();
        let cancelled = token.clone();

        let task = tokio::spawn(async move {
            let mut interval = interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;
                    _ = cancelled.cancelled() => break,
                    _ = interval.tick() => {
                        if !on_tick() {
                            trace!("{} ticker receiver gone", name);
                            break;
                        }
                    }
                }
            }
        });

        debug!("Started {} ticker ({:?})", name, period);
        Self { name, token, task }
    }

    pub fn cancel(&self) {
        if !self.token.is_cancelled() {
            debug!("Stopping {} ticker", self.name);
            self.token.cancel();
        }
    }

    #[cfg(test)]
    pub(crate) fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for Ticker {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn counting_ticker(period_ms: u64) -> (Ticker, Arc<AtomicUsize>) {
        let count = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&count);
        let ticker = Ticker::spawn("test", Duration::from_millis(period_ms), move || {
            counter.fetch_add(1, Ordering::SeqCst);
            true
        });
        (ticker, count)
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticks_on_period() {
        let (_ticker, count) = counting_ticker(100);

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(count.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_stops_ticks() {
        let (ticker, count) = counting_ticker(100);
        tokio::time::sleep(Duration::from_millis(250)).await;
        assert_eq!(count.load(Ordering::SeqCst), 2);

        ticker.cancel();
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(count.load(Ordering::SeqCst), 2);
        assert!(ticker.is_finished());
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_stops_ticks() {
        let (ticker, count) = counting_ticker(100);
        drop(ticker);
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_callback_can_end_ticker() {
        let count = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&count);
        let ticker = Ticker::spawn("once", Duration::from_millis(10), move || {
            counter.fetch_add(1, Ordering::SeqCst);
            false
        });

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(ticker.is_finished());
    }
}
