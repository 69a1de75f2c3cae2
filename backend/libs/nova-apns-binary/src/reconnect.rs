/// Reconnect delay policies for the push connection.
use rand::Rng;
use std::time::Duration;

/// Decides how long the send loop waits before opening the next connection.
///
/// `attempt` counts consecutive reconnects since the last successful
/// connection, starting at 0.
pub trait ReconnectPolicy: Send + Sync {
    fn delay(&self, attempt: u32) -> Duration;
}

/// Reconnect straight away. This is the gateway client's historical
/// behaviour; against an unreachable gateway it retries as fast as connects
/// fail.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoBackoff;

impl ReconnectPolicy for NoBackoff {
    fn delay(&self, _attempt: u32) -> Duration {
        Duration::ZERO
    }
}

/// Exponential backoff with optional jitter.
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    /// Delay before the first reconnect
    pub initial_backoff: Duration,
    /// Upper bound for any single delay
    pub max_backoff: Duration,
    /// Growth factor per attempt
    pub backoff_multiplier: f64,
    /// Add random jitter to each delay (±30%)
    pub jitter: bool,
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self {
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(10),
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }
}

impl ReconnectPolicy for ExponentialBackoff {
    fn delay(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let base_ms = (self.initial_backoff.as_millis() as f64
            * self.backoff_multiplier.powi(exponent))
        .min(self.max_backoff.as_millis() as f64);

        apply_jitter(Duration::from_millis(base_ms as u64), self.jitter)
    }
}

fn apply_jitter(base: Duration, jitter: bool) -> Duration {
    if jitter && !base.is_zero() {
        let mut rng = rand::thread_rng();
        let jitter_factor = 1.0 + rng.gen_range(-0.3..0.3);
        Duration::from_millis((base.as_millis() as f64 * jitter_factor) as u64)
    } else {
        base
    }
}
