//! Bounded retry policy for upstream calls.

use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;

/// HTTP statuses worth another attempt.
pub const RETRYABLE_STATUSES: [u16; 5] = [429, 500, 502, 503, 504];

/// Retry budget and backoff shape.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Upper bound on a computed backoff delay.
    pub max_backoff: Duration,
    /// Upper bound on a delay requested through `Retry-After`.
    pub max_retry_after: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            max_backoff: Duration::from_secs(10),
            max_retry_after: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    /// Returns whether a status should be retried.
    pub fn is_retryable(status: u16) -> bool {
        RETRYABLE_STATUSES.contains(&status)
    }

    /// Delay before the retry that follows failed attempt `attempt` (0-based).
    ///
    /// A numeric `Retry-After` value wins, capped at `max_retry_after`;
    /// otherwise jittered exponential backoff is used.
    pub fn delay(&self, attempt: u32, retry_after: Option<&str>) -> Duration {
        retry_after
            .and_then(parse_retry_after)
            .map(|d| d.min(self.max_retry_after))
            .unwrap_or_else(|| self.backoff(attempt))
    }

    /// `(0.2 + U[0, 0.4)) * 2^attempt` seconds, capped at `max_backoff`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let jitter = rand::thread_rng().gen_range(0.0..0.4);
        self.backoff_with_jitter(attempt, jitter)
    }

    /// Backoff with a caller-supplied jitter in `[0, 0.4)`.
    pub fn backoff_with_jitter(&self, attempt: u32, jitter: f64) -> Duration {
        let factor = 2f64.powi(attempt.min(30) as i32);
        let secs = (0.2 + jitter) * factor;
        Duration::from_secs_f64(secs).min(self.max_backoff)
    }
}

/// Parses a `Retry-After` header given in seconds. Negative values become 0,
/// values too large for a `Duration` saturate to `Duration::MAX`.
///
/// HTTP-date values are not supported and yield `None`.
pub fn parse_retry_after(raw: &str) -> Option<Duration> {
    let secs: f64 = raw.trim().parse().ok()?;
    if !secs.is_finite() {
        return None;
    }
    Some(Duration::try_from_secs_f64(secs.max(0.0)).unwrap_or(Duration::MAX))
}

/// Waits between attempts. Injected so tests can skip real delays.
#[async_trait]
pub trait Sleeper: Send + Sync {
    /// Suspends the current call for `duration`.
    async fn sleep(&self, duration: Duration);
}

/// Sleeper backed by the tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}
