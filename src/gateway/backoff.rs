//! Opt-in transport retry with exponential backoff and jitter.
//!
//! The pipeline's observable contract is a single attempt per stage, so the
//! default is [`BackoffConfig::none()`]. Deployments talking to rate-limited
//! cloud APIs can switch to [`BackoffConfig::standard()`].

use std::time::Duration;

/// Configuration for transport-level retry with exponential backoff and jitter.
///
/// # Example
///
/// ```
/// use medilens::gateway::BackoffConfig;
///
/// let none = BackoffConfig::none();
/// assert_eq!(none.max_retries, 0);
///
/// let standard = BackoffConfig::standard();
/// assert_eq!(standard.max_retries, 3);
/// ```
#[derive(Debug, Clone)]
pub struct BackoffConfig {
    /// Maximum number of transport retries. Default: 0 (no retry).
    pub max_retries: u32,

    /// Initial delay before first retry.
    pub initial_delay: Duration,

    /// Multiplier applied to delay after each retry.
    pub multiplier: f64,

    /// Maximum delay between retries.
    pub max_delay: Duration,

    /// Jitter strategy.
    pub jitter: JitterStrategy,

    /// HTTP status codes that trigger retry.
    pub retryable_statuses: Vec<u16>,

    /// Whether to sleep for the provider's `Retry-After` instead of the computed delay.
    pub respect_retry_after: bool,
}

/// Jitter strategy to spread out concurrent retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JitterStrategy {
    /// Delay is exactly the calculated value.
    None,

    /// Random value in `[0, calculated_delay]`.
    Full,

    /// `calculated_delay/2 + random in [0, calculated_delay/2]`.
    Equal,
}

impl BackoffConfig {
    /// No transport retry: every call is a single attempt.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::standard()
        }
    }

    /// Cloud API defaults: 3 retries, 1s initial, 2x multiplier, 60s cap,
    /// full jitter, retries 429/5xx, respects Retry-After.
    pub fn standard() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_secs(1),
            multiplier: 2.0,
            max_delay: Duration::from_secs(60),
            jitter: JitterStrategy::Full,
            retryable_statuses: vec![429, 500, 502, 503, 504],
            respect_retry_after: true,
        }
    }

    /// Calculate the delay for attempt N (0-indexed).
    ///
    /// The base delay is `initial_delay * multiplier^attempt`, capped at
    /// `max_delay`, then jittered.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base = self.initial_delay.as_secs_f64() * self.multiplier.powi(attempt as i32);
        let capped = base.min(self.max_delay.as_secs_f64());

        let jittered = match self.jitter {
            JitterStrategy::None => capped,
            JitterStrategy::Full => fastrand::f64() * capped,
            JitterStrategy::Equal => capped / 2.0 + fastrand::f64() * (capped / 2.0),
        };

        Duration::from_secs_f64(jittered)
    }
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self::none()
    }
}
