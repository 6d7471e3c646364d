//! Simulated latency readout
//!
//! The dashboard shows a "stream latency" figure next to the live feed.
//! There is no real end-to-end latency measurement on this surface, so the
//! readout is a cosmetic simulation: a fresh value in milliseconds on a
//! fixed cadence, published over a watch channel.

use std::time::Duration;

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Publishes a simulated latency value on a fixed cadence
///
/// # Examples
///
/// ```rust,no_run
/// use std::time::Duration;
/// use sitewatch_client_core::latency::LatencyMonitor;
///
/// # async fn example() {
/// let monitor = LatencyMonitor::spawn(Duration::from_millis(1500));
/// let mut readout = monitor.subscribe();
/// println!("latency: {} ms", *readout.borrow());
/// # }
/// ```
pub struct LatencyMonitor {
    latency_tx: watch::Sender<u32>,
    task: JoinHandle<()>,
}

impl LatencyMonitor {
    /// Start publishing simulated values at the given cadence
    pub fn spawn(interval: Duration) -> Self {
        // Initial readout before the first tick lands.
        let (latency_tx, _latency_rx) = watch::channel(14);
        let tx = latency_tx.clone();
        let task = tokio::spawn(async move {
            let mut rng = SmallRng::from_entropy();
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if tx.send(rng.gen_range(1..=20)).is_err() {
                    break;
                }
            }
        });
        Self { latency_tx, task }
    }

    /// Subscribe to the latency readout in milliseconds
    pub fn subscribe(&self) -> watch::Receiver<u32> {
        self.latency_tx.subscribe()
    }

    /// Stop publishing
    pub fn shutdown(&self) {
        self.task.abort();
    }
}

impl Drop for LatencyMonitor {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn publishes_values_in_range_on_each_tick() {
        let monitor = LatencyMonitor::spawn(Duration::from_millis(1500));
        let mut readout = monitor.subscribe();
        assert_eq!(*readout.borrow(), 14);

        for _ in 0..3 {
            tokio::time::advance(Duration::from_millis(1500)).await;
            readout.changed().await.unwrap();
            let value = *readout.borrow();
            assert!((1..=20).contains(&value), "value {} out of range", value);
        }
    }
}
