//! Integration test helpers and scenarios
//!
//! - Mock Redis endpoints with switchable failure modes
//! - Scenarios exercising the weighted pool end to end over TCP


// Re-export commonly used helpers
pub use helpers::mock_redis::{MockRedis, MockRedisBuilder, ResponseMode};
