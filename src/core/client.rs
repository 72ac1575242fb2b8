use crate::config::EndpointConfig;
use crate::core::connection_pool::{
    ConnectionError, ConnectionPoolBuilder, PooledRedisConnection, RedisPool,
};
use crate::core::resp::RespError;
use crate::core::stats::{AtomicPoolStats, PoolStats};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::time::Instant;

/// A handle to one backend endpoint, as seen by the weighted pool
#[async_trait]
pub trait Client: Send + Sync {
    /// Address this client talks to
    fn address(&self) -> &str;

    /// One liveness round trip, abandoned once `deadline` passes
    async fn ping(&self, deadline: Instant) -> Result<(), ClientError>;

    /// Current connection-pool counters
    fn pool_stats(&self) -> PoolStats;
}

/// Redis endpoint client backed by a bb8 connection pool
#[derive(Debug)]
pub struct RedisClient {
    address: String,
    pool: RedisPool,
    stats: Arc<AtomicPoolStats>,
}

impl RedisClient {
    /// Build the client for one endpoint. Nothing is dialed until first use.
    pub fn from_config(config: &EndpointConfig) -> Self {
        let stats = Arc::new(AtomicPoolStats::new());
        let pool = ConnectionPoolBuilder::build_pool(
            config.connect_options(),
            &config.connection_pool_or_default(),
            Arc::clone(&stats),
        );

        Self {
            address: config.address(),
            pool,
            stats,
        }
    }

    /// Check a connection out of the pool for issuing commands
    pub async fn get(&self) -> Result<PooledRedisConnection<'_>, ClientError> {
        let had_idle = self.pool.state().idle_connections > 0;
        match self.pool.get().await {
            Ok(conn) => {
                self.stats.record_checkout(had_idle);
                Ok(conn)
            }
            Err(bb8::RunError::User(e)) => Err(ClientError::Connection(e)),
            Err(bb8::RunError::TimedOut) => {
                self.stats.record_timeout();
                Err(ClientError::CheckoutTimedOut(self.address.clone()))
            }
        }
    }
}

#[async_trait]
impl Client for RedisClient {
    fn address(&self) -> &str {
        &self.address
    }

    async fn ping(&self, deadline: Instant) -> Result<(), ClientError> {
        let round_trip = async {
            let mut conn = self.get().await?;
            conn.ping().await.map_err(ClientError::from)
        };

        match tokio::time::timeout_at(deadline, round_trip).await {
            Ok(result) => result,
            Err(_) => {
                self.stats.record_timeout();
                Err(ClientError::DeadlineExceeded(self.address.clone()))
            }
        }
    }

    fn pool_stats(&self) -> PoolStats {
        let state = self.pool.state();
        self.stats
            .snapshot(state.connections, state.idle_connections)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("{0}")]
    Connection(#[from] ConnectionError),
    #[error("Timed out waiting for a connection to {0}")]
    CheckoutTimedOut(String),
    #[error("Deadline exceeded talking to {0}")]
    DeadlineExceeded(String),
    #[error("Command failed: {0}")]
    Command(#[from] RespError),
}
