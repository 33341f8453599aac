//! Retry policy and delays between attempts.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use morph_core::RetryConfig;
use rand::Rng;

/// Delay before retry number `retry` (1 for the first retry).
pub trait Backoff: Send + Sync {
    fn delay(&self, retry: u32) -> Duration;
}

/// Retry immediately.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoBackoff;

impl Backoff for NoBackoff {
    fn delay(&self, _retry: u32) -> Duration {
        Duration::ZERO
    }
}

/// Doubling delay capped at `max`, optionally randomized within `[0, delay]`.
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    pub base: Duration,
    pub max: Duration,
    pub jitter: bool,
}

impl ExponentialBackoff {
    /// The delay before jitter is applied.
    pub fn ceiling(&self, retry: u32) -> Duration {
        let factor = 1u32.checked_shl(retry.saturating_sub(1)).unwrap_or(u32::MAX);
        self.base.saturating_mul(factor).min(self.max)
    }
}

impl Backoff for ExponentialBackoff {
    fn delay(&self, retry: u32) -> Duration {
        let ceiling = self.ceiling(retry);
        if !self.jitter || ceiling.is_zero() {
            return ceiling;
        }
        let millis = ceiling.as_millis() as u64;
        Duration::from_millis(rand::thread_rng().gen_range(0..=millis))
    }
}

/// How many attempts to make and how long to wait between them.
#[derive(Clone)]
pub struct RetryPolicy {
    /// Total attempts, the first one included.
    pub max_attempts: u32,
    pub backoff: Arc<dyn Backoff>,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff: impl Backoff + 'static) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff: Arc::new(backoff),
        }
    }

    /// Retry without waiting.
    pub fn immediate(max_attempts: u32) -> Self {
        Self::new(max_attempts, NoBackoff)
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(
            config.max_attempts,
            ExponentialBackoff {
                base: Duration::from_millis(config.base_delay_ms),
                max: Duration::from_millis(config.max_delay_ms),
                jitter: config.jitter,
            },
        )
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

impl fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_attempts", &self.max_attempts)
            .finish_non_exhaustive()
    }
}
