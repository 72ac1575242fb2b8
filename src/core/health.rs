use crate::core::client::Client;
use crate::core::stats::PoolStats;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::Instant;

/// Result of one probe. Recomputed on every call, never cached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub valid: bool,
    pub message: String,
    pub stats: PoolStats,
}

/// Ping `client` and snapshot its pool counters.
///
/// The round trip is bounded by whichever comes first: `deadline`, or
/// `probe_timeout` from now. Transport failures come back as
/// `valid: false` with the error text as the message.
pub async fn probe<C: Client + ?Sized>(
    client: &C,
    deadline: Instant,
    probe_timeout: Duration,
) -> HealthStatus {
    let bound = deadline.min(Instant::now() + probe_timeout);
    let result = client.ping(bound).await;
    let stats = client.pool_stats();

    match result {
        Ok(()) => HealthStatus {
            valid: true,
            message: stats.to_string(),
            stats,
        },
        Err(e) => {
            tracing::debug!("Probe of {} failed: {}", client.address(), e);
            HealthStatus {
                valid: false,
                message: e.to_string(),
                stats,
            }
        }
    }
}
