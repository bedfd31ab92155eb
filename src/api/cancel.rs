//! User-interrupt plumbing for the blocking waits (retry backoff,
//! rate-limit waits, batch pacing).

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// Cloneable cancellation flag. Once triggered it stays triggered.
#[derive(Debug, Clone)]
pub struct CancelSignal {
    tx: Arc<watch::Sender<bool>>,
}

impl Default for CancelSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelSignal {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    /// Forward Ctrl-C into this signal. Must be called inside a runtime.
    pub fn install_ctrl_c(&self) {
        let signal = self.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("interrupt received; stopping after the current exchange");
                signal.trigger();
            }
        });
    }

    /// Sleep for `duration` unless cancelled first. Returns `false` when
    /// the wait was cut short.
    pub async fn sleep(&self, duration: Duration) -> bool {
        let mut rx = self.tx.subscribe();
        if *rx.borrow_and_update() {
            return false;
        }
        let sleep = tokio::time::sleep(duration);
        tokio::pin!(sleep);
        tokio::select! {
            _ = &mut sleep => true,
            _ = rx.wait_for(|cancelled| *cancelled) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::Instant;

    #[tokio::test(start_paused = true)]
    async fn sleep_runs_to_completion_without_signal() {
        let signal = CancelSignal::new();
        let started = Instant::now();
        assert!(signal.sleep(Duration::from_secs(3)).await);
        assert_eq!(started.elapsed(), Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn trigger_cuts_sleep_short() {
        let signal = CancelSignal::new();
        let remote = signal.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            remote.trigger();
        });
        let started = Instant::now();
        assert!(!signal.sleep(Duration::from_secs(30)).await);
        assert!(started.elapsed() < Duration::from_secs(2));
        assert!(signal.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn already_cancelled_returns_immediately() {
        let signal = CancelSignal::new();
        signal.trigger();
        let started = Instant::now();
        assert!(!signal.sleep(Duration::from_secs(5)).await);
        assert_eq!(started.elapsed(), Duration::ZERO);
    }
}
