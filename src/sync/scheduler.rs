//! Timers for the sync loops.
//!
//! Both run on `tokio::time`, so tests can drive them with a paused clock.
//! Dropping either one cancels it, including a pending debounced action.

use std::future::Future;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};

/// Runs an action after its input has been quiet for a while.
pub struct Debouncer {
    pokes: mpsc::UnboundedSender<()>,
    task: JoinHandle<()>,
}

impl Debouncer {
    /// Every [`poke`](Self::poke) restarts an `idle` timer; `action` runs
    /// once the timer elapses. Pokes that arrive while `action` is running
    /// start the next round.
    pub fn spawn<F, Fut>(idle: Duration, mut action: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (pokes, mut rx) = mpsc::unbounded_channel::<()>();
        let task = tokio::spawn(async move {
            while rx.recv().await.is_some() {
                loop {
                    match time::timeout(idle, rx.recv()).await {
                        Ok(Some(())) => continue,
                        Ok(None) => return,
                        Err(_) => break,
                    }
                }
                action().await;
            }
        });
        Self { pokes, task }
    }

    #[cfg(test)]
    pub fn poke(&self) {
        // The receiver only goes away with the task itself.
        let _ = self.pokes.send(());
    }

    /// A handle other tasks can use to poke this debouncer.
    pub fn poker(&self) -> Poker {
        Poker(self.pokes.clone())
    }

    pub fn cancel(&self) {
        self.task.abort();
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[derive(Clone)]
pub struct Poker(mpsc::UnboundedSender<()>);

impl Poker {
    pub fn poke(&self) {
        let _ = self.0.send(());
    }
}

/// Runs an action on a fixed period, first after one full period.
pub struct Ticker {
    task: JoinHandle<()>,
}

impl Ticker {
    pub fn spawn<F, Fut>(period: Duration, mut action: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let task = tokio::spawn(async move {
            let mut interval = time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                action().await;
            }
        });
        Self { task }
    }

    pub fn cancel(&self) {
        self.task.abort();
    }
}

impl Drop for Ticker {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn counter() -> (Arc<AtomicUsize>, impl FnMut() -> std::future::Ready<()> + Send + 'static) {
        let count = Arc::new(AtomicUsize::new(0));
        let inner = count.clone();
        let action = move || {
            inner.fetch_add(1, Ordering::SeqCst);
            std::future::ready(())
        };
        (count, action)
    }

    #[tokio::test(start_paused = true)]
    async fn test_debouncer_coalesces_bursts() {
        let (count, action) = counter();
        let debouncer = Debouncer::spawn(Duration::from_millis(1000), action);

        for _ in 0..5 {
            debouncer.poke();
            time::sleep(Duration::from_millis(300)).await;
        }
        assert_eq!(count.load(Ordering::SeqCst), 0);

        time::sleep(Duration::from_millis(800)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);

        debouncer.poke();
        time::sleep(Duration::from_millis(1100)).await;
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_drops_pending_action() {
        let (count, action) = counter();
        let debouncer = Debouncer::spawn(Duration::from_millis(1000), action);

        debouncer.poke();
        time::sleep(Duration::from_millis(100)).await;
        debouncer.cancel();
        time::sleep(Duration::from_secs(5)).await;

        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticker_period() {
        let (count, action) = counter();
        let ticker = Ticker::spawn(Duration::from_secs(10), action);

        time::sleep(Duration::from_secs(5)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);
        time::sleep(Duration::from_secs(26)).await;
        assert_eq!(count.load(Ordering::SeqCst), 3);

        drop(ticker);
        time::sleep(Duration::from_secs(30)).await;
        assert_eq!(count.load(Ordering::SeqCst), 3);
    }
}
