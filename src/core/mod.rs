pub mod client;
pub mod connection_pool;
pub mod health;
pub mod monitor;
pub mod pool;
pub mod resp;
pub mod rotation;
pub mod stats;

// Re-export core types
pub use client::{Client, ClientError, RedisClient};
pub use connection_pool::{ConnectionPoolBuilder, RedisConnection, RedisPool};
pub use health::{probe, HealthStatus};
pub use monitor::StatusMonitor;
pub use pool::{PoolError, WeightedPool};
pub use rotation::RotationTable;
pub use stats::{AtomicPoolStats, PoolStats};
