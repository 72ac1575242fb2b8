use super::client::{Client, RedisClient};
use super::health::{probe, HealthStatus};
use super::rotation::RotationTable;
use crate::config::{Config, EndpointConfig, ProbeConfig};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::Instant;

/// Spreads callers across replicas in weighted turns, skipping unhealthy ones.
///
/// Clients and the rotation table are fixed at construction and read without
/// locks. The only mutable state is the turn counter, advanced with a single
/// atomic increment per attempt. Concurrent callers may interleave their laps,
/// so fairness holds over time rather than per call.
#[derive(Debug)]
pub struct WeightedPool<C = RedisClient> {
    clients: Vec<C>,
    rotation: RotationTable,
    turn: AtomicU64,
    probe_timeout: Duration,
}

impl<C> Default for WeightedPool<C> {
    /// A pool with no endpoints. Selection fails, status is empty.
    fn default() -> Self {
        Self {
            clients: Vec::new(),
            rotation: RotationTable::default(),
            turn: AtomicU64::new(0),
            probe_timeout: ProbeConfig::default().timeout(),
        }
    }
}

impl WeightedPool<RedisClient> {
    /// Build one Redis client per endpoint, in order. Must run inside a tokio runtime.
    pub fn from_endpoints(
        endpoints: &[EndpointConfig],
        probe: &ProbeConfig,
    ) -> Result<Self, PoolError> {
        if endpoints.is_empty() {
            return Err(PoolError::Configuration(
                "at least one endpoint is required".to_string(),
            ));
        }
        for endpoint in endpoints {
            endpoint
                .validate()
                .map_err(|e| PoolError::Configuration(e.to_string()))?;
        }

        let clients = endpoints.iter().map(RedisClient::from_config).collect();
        let weights: Vec<u8> = endpoints.iter().map(|e| e.weight).collect();

        let pool = Self::new(clients, &weights)?.with_probe_timeout(probe.timeout());
        tracing::info!(
            "Weighted pool ready: {} endpoints, {} turns per lap",
            pool.len(),
            pool.rotation.len()
        );
        Ok(pool)
    }

    pub fn from_config(config: &Config) -> Result<Self, PoolError> {
        Self::from_endpoints(&config.endpoints, &config.probe)
    }
}

impl<C: Client> WeightedPool<C> {
    /// Pair each client with its weight. Fails on an empty list, a count
    /// mismatch, or a zero weight.
    pub fn new(clients: Vec<C>, weights: &[u8]) -> Result<Self, PoolError> {
        if clients.is_empty() {
            return Err(PoolError::Configuration(
                "at least one endpoint is required".to_string(),
            ));
        }
        if clients.len() != weights.len() {
            return Err(PoolError::Configuration(format!(
                "{} clients but {} weights",
                clients.len(),
                weights.len()
            )));
        }
        if let Some(index) = weights.iter().position(|&w| w == 0) {
            return Err(PoolError::Configuration(format!(
                "endpoint {} has weight 0, must be at least 1",
                index
            )));
        }

        Ok(Self {
            clients,
            rotation: RotationTable::from_weights(weights.iter().copied()),
            turn: AtomicU64::new(0),
            probe_timeout: ProbeConfig::default().timeout(),
        })
    }

    pub fn with_probe_timeout(mut self, probe_timeout: Duration) -> Self {
        self.probe_timeout = probe_timeout;
        self
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    pub fn clients(&self) -> &[C] {
        &self.clients
    }

    pub fn rotation(&self) -> &RotationTable {
        &self.rotation
    }

    pub fn probe_timeout(&self) -> Duration {
        self.probe_timeout
    }

    /// Worst case for one selection: a probe timeout per turn in a lap
    fn lap_budget(&self) -> Duration {
        let turns = u32::try_from(self.rotation.len()).unwrap_or(u32::MAX);
        self.probe_timeout.saturating_mul(turns)
    }

    /// Take the next healthy turn and return its backend index
    pub async fn select_turn(&self) -> Result<usize, PoolError> {
        self.select_turn_until(Instant::now() + self.lap_budget())
            .await
    }

    /// Like [`select_turn`](Self::select_turn), with one deadline shared by
    /// every probe in the attempt.
    ///
    /// At most one lap of probes is made, however far concurrent callers
    /// move the counter in the meantime.
    pub async fn select_turn_until(&self, deadline: Instant) -> Result<usize, PoolError> {
        let lap = self.rotation.len();
        if lap == 0 {
            return Err(PoolError::Configuration(
                "pool has no endpoints configured".to_string(),
            ));
        }

        for probed in 0..lap {
            if probed > 0 && Instant::now() >= deadline {
                tracing::error!(
                    "Selection deadline passed after {} of {} probes",
                    probed,
                    lap
                );
                return Err(PoolError::NoHealthyBackend { probed });
            }

            let turn = self.turn.fetch_add(1, Ordering::Relaxed).wrapping_add(1);
            let index = self.rotation.backend_at(turn).ok_or_else(|| {
                PoolError::Configuration("pool has no endpoints configured".to_string())
            })?;

            let client = &self.clients[index];
            let status = probe(client, deadline, self.probe_timeout).await;
            if status.valid {
                return Ok(index);
            }

            tracing::warn!(
                "Endpoint {} ({}) is unhealthy, skipping: {}",
                index,
                client.address(),
                status.message
            );
        }

        tracing::error!("All {} turns probed, no healthy endpoint", lap);
        Err(PoolError::NoHealthyBackend { probed: lap })
    }

    /// Client for the next healthy turn
    pub async fn select_client(&self) -> Result<&C, PoolError> {
        let index = self.select_turn().await?;
        Ok(&self.clients[index])
    }

    pub async fn select_client_until(&self, deadline: Instant) -> Result<&C, PoolError> {
        let index = self.select_turn_until(deadline).await?;
        Ok(&self.clients[index])
    }

    /// Direct access by backend index, bypassing rotation. `None` means 0.
    pub fn get_client(&self, index: Option<usize>) -> Result<&C, PoolError> {
        if self.clients.is_empty() {
            return Err(PoolError::Configuration(
                "pool has no endpoints configured".to_string(),
            ));
        }
        let index = index.unwrap_or(0);
        self.clients.get(index).ok_or(PoolError::InvalidIndex {
            index,
            len: self.clients.len(),
        })
    }

    /// Probe one backend by index
    pub async fn status(&self, index: usize) -> Result<HealthStatus, PoolError> {
        let client = self.get_client(Some(index))?;
        Ok(probe(client, Instant::now() + self.probe_timeout, self.probe_timeout).await)
    }

    /// Probe every backend concurrently. Empty for a pool with no endpoints.
    pub async fn status_all(&self) -> BTreeMap<usize, HealthStatus> {
        let deadline = Instant::now() + self.probe_timeout;
        let probes = self.clients.iter().enumerate().map(|(index, client)| async move {
            (index, probe(client, deadline, self.probe_timeout).await)
        });

        futures::future::join_all(probes).await.into_iter().collect()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    #[error("Configuration error: {0}")]
    Configuration(String),
    #[error("No healthy backend after probing {probed} turns")]
    NoHealthyBackend { probed: usize },
    #[error("Backend index {index} out of range (pool has {len})")]
    InvalidIndex { index: usize, len: usize },
}
