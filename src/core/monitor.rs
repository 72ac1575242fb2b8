use super::client::Client;
use super::health::HealthStatus;
use super::pool::WeightedPool;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::{self, MissedTickBehavior};

/// Periodically probes every endpoint and logs what it finds
pub struct StatusMonitor<C> {
    pool: Arc<WeightedPool<C>>,
    interval: Duration,
}

impl<C: Client> StatusMonitor<C> {
    pub fn new(pool: Arc<WeightedPool<C>>, interval: Duration) -> Self {
        Self { pool, interval }
    }

    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(
            "Status monitor starting: {} endpoints every {:?}",
            self.pool.len(),
            self.interval
        );

        let mut ticker = time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.check_all().await;
                }
                _ = shutdown.recv() => {
                    tracing::info!("Status monitor received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }

    /// One round of probes, logged per endpoint
    pub async fn check_all(&self) -> BTreeMap<usize, HealthStatus> {
        let report = self.pool.status_all().await;
        for (index, status) in &report {
            let address = self
                .pool
                .get_client(Some(*index))
                .map(|c| c.address())
                .unwrap_or("?");
            if status.valid {
                tracing::info!("Endpoint {} ({}) healthy: {}", index, address, status.message);
            } else {
                tracing::warn!("Endpoint {} ({}) unhealthy: {}", index, address, status.message);
            }
        }
        report
    }
}
