//! Suspension points and throttling delays.

use std::time::Duration;

use async_trait::async_trait;

/// Upper bound on a single 429 backoff.
pub const MAX_THROTTLE_DELAY_SECS: u64 = 300;

/// Delay before re-issuing a throttled request: `min(300, 2^attempt)` seconds,
/// where `attempt` is the number of physical calls made so far.
pub fn throttle_delay(attempt: u32) -> Duration {
    let secs = 2u64
        .checked_pow(attempt)
        .unwrap_or(u64::MAX)
        .min(MAX_THROTTLE_DELAY_SECS);
    Duration::from_secs(secs)
}

/// Parse a `Retry-After` header given in whole seconds.
pub fn parse_retry_after(value: &str) -> Option<Duration> {
    value.trim().parse::<u64>().ok().map(Duration::from_secs)
}

/// Suspends the calling task. Never blocks a worker thread.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}
