use crate::config::{ConnectOptions, ConnectionPoolConfig};
use crate::core::resp::{self, RespError};
use crate::core::stats::AtomicPoolStats;
use async_trait::async_trait;
use bb8::{Pool, PooledConnection};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;

/// A dialed, authenticated connection to one Redis endpoint
#[derive(Debug)]
pub struct RedisConnection {
    stream: TcpStream,
    broken: bool,
}

impl RedisConnection {
    pub fn new(stream: TcpStream) -> Self {
        Self {
            stream,
            broken: false,
        }
    }

    /// Raw stream for callers issuing their own commands
    pub fn stream_mut(&mut self) -> &mut TcpStream {
        &mut self.stream
    }

    /// Flag the connection so the pool drops it instead of reusing it
    pub fn mark_broken(&mut self) {
        self.broken = true;
    }

    pub fn is_broken(&self) -> bool {
        self.broken
    }

    pub async fn ping(&mut self) -> Result<(), RespError> {
        // Stays set if the caller abandons the round trip mid-flight
        self.broken = true;
        resp::ping(&mut self.stream).await?;
        self.broken = false;
        Ok(())
    }
}

/// Connection manager for bb8 that dials and authenticates Redis connections
#[derive(Debug, Clone)]
pub struct RedisConnectionManager {
    options: ConnectOptions,
    stats: Arc<AtomicPoolStats>,
}

impl RedisConnectionManager {
    pub fn new(options: ConnectOptions, stats: Arc<AtomicPoolStats>) -> Self {
        Self { options, stats }
    }

    pub fn options(&self) -> &ConnectOptions {
        &self.options
    }

    async fn handshake(&self, stream: &mut TcpStream) -> Result<(), ConnectionError> {
        let options = &self.options;
        if !options.password.is_empty() {
            let result = if options.username.is_empty() {
                resp::expect_ok(stream, &[b"AUTH", options.password.as_bytes()]).await
            } else {
                resp::expect_ok(
                    stream,
                    &[
                        b"AUTH",
                        options.username.as_bytes(),
                        options.password.as_bytes(),
                    ],
                )
                .await
            };
            result.map_err(|e| ConnectionError::HandshakeFailed(format!("AUTH: {}", e)))?;
        }

        if options.db != 0 {
            let db = options.db.to_string();
            resp::expect_ok(stream, &[b"SELECT", db.as_bytes()])
                .await
                .map_err(|e| ConnectionError::HandshakeFailed(format!("SELECT {}: {}", db, e)))?;
        }

        Ok(())
    }
}

#[async_trait]
impl bb8::ManageConnection for RedisConnectionManager {
    type Connection = RedisConnection;
    type Error = ConnectionError;

    async fn connect(&self) -> Result<Self::Connection, Self::Error> {
        let dial = TcpStream::connect(&self.options.addr);
        let mut stream = match tokio::time::timeout(self.options.dial_timeout, dial).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => return Err(ConnectionError::ConnectionFailed(e.to_string())),
            Err(_) => {
                return Err(ConnectionError::ConnectionFailed(format!(
                    "Connection to {} timed out after {:?}",
                    self.options.addr, self.options.dial_timeout
                )))
            }
        };

        configure_socket(&stream, self.options.keep_alive);
        self.handshake(&mut stream).await?;

        tracing::debug!("Connected to redis endpoint {}", self.options.addr);
        Ok(RedisConnection::new(stream))
    }

    async fn is_valid(&self, conn: &mut Self::Connection) -> Result<(), Self::Error> {
        conn.ping()
            .await
            .map_err(|_| ConnectionError::ConnectionInvalid)
    }

    fn has_broken(&self, conn: &mut Self::Connection) -> bool {
        if conn.is_broken() {
            self.stats.record_stale();
            tracing::debug!("Dropping broken connection to {}", self.options.addr);
            return true;
        }
        false
    }
}

/// Apply keep-alive and no-delay, best effort
fn configure_socket(stream: &TcpStream, keep_alive: Duration) {
    let _ = stream.set_nodelay(true);

    let socket_ref = socket2::SockRef::from(stream);
    let keepalive = socket2::TcpKeepalive::new().with_time(keep_alive);
    if let Err(e) = socket_ref.set_tcp_keepalive(&keepalive) {
        tracing::debug!("Failed to set TCP keep-alive: {}", e);
    }
}

/// Type alias for our connection pool
pub type RedisPool = Pool<RedisConnectionManager>;

/// Type alias for a pooled connection borrowed from a [`RedisPool`]
pub type PooledRedisConnection<'a> = PooledConnection<'a, RedisConnectionManager>;

/// Builder for creating connection pools
pub struct ConnectionPoolBuilder;

impl ConnectionPoolBuilder {
    /// Create a pool without dialing anything yet.
    ///
    /// Endpoints that are down at startup still get a pool; they simply fail
    /// their probes until they come back. Must run inside a tokio runtime.
    pub fn build_pool(
        options: ConnectOptions,
        config: &ConnectionPoolConfig,
        stats: Arc<AtomicPoolStats>,
    ) -> RedisPool {
        let checkout_timeout = options.dial_timeout;
        let manager = RedisConnectionManager::new(options, stats);

        Pool::builder()
            .max_size(config.max_connections)
            .min_idle(if config.min_idle > 0 {
                Some(config.min_idle)
            } else {
                None
            })
            .connection_timeout(checkout_timeout)
            .idle_timeout(Some(Duration::from_secs(config.idle_timeout_secs)))
            .max_lifetime(Some(Duration::from_secs(config.max_lifetime_secs)))
            // Probes ping explicitly, no need to ping twice per checkout
            .test_on_check_out(false)
            .build_unchecked(manager)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),
    #[error("Handshake failed: {0}")]
    HandshakeFailed(String),
    #[error("Connection is invalid")]
    ConnectionInvalid,
}
