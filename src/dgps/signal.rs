// src/dgps/signal.rs
//! Single-slot "new fix available" signal

use tokio::sync::Notify;

/// Coalescing wake-up: raising twice before the consumer waits still
/// produces one wake-up. The consumer re-reads the latest snapshot, so the
/// skipped fixes are simply superseded.
pub struct FixSignal {
    notify: Notify,
}

impl FixSignal {
    pub fn new() -> Self {
        Self {
            notify: Notify::new(),
        }
    }

    pub fn raise(&self) {
        self.notify.notify_one();
    }

    /// Wait until the signal is raised, then clear it
    pub async fn wait(&self) {
        self.notify.notified().await;
    }
}

impl Default for FixSignal {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_pending_raise_wakes_immediately() {
        let signal = FixSignal::new();
        signal.raise();
        tokio::time::timeout(Duration::from_millis(100), signal.wait())
            .await
            .expect("stored permit");
    }

    #[tokio::test]
    async fn test_raises_coalesce() {
        let signal = FixSignal::new();
        signal.raise();
        signal.raise();
        signal.raise();

        signal.wait().await;
        let second = tokio::time::timeout(Duration::from_millis(50), signal.wait()).await;
        assert!(second.is_err(), "three raises must coalesce into one wake-up");
    }
}
