use crate::errors::MailboxError;
use std::thread;
use std::time::Duration;

/// Configuration for bounded waiting with exponential backoff
///
/// Default values suit a low-latency hand-off:
/// - 20 attempts with 100µs base delay
/// - Exponential backoff capped at 2ms
/// - Total worst-case wait: ~33ms
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryConfig {
    /// Maximum number of retries before giving up with `Timeout`
    pub max_attempts: u32,
    /// Initial delay between retries (doubles each attempt)
    pub base_delay: Duration,
    /// Maximum delay cap (backoff won't exceed this)
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 20,
            base_delay: Duration::from_micros(100),
            max_delay: Duration::from_millis(2),
        }
    }
}

impl RetryConfig {
    /// Calculate delay for a given attempt using exponential backoff
    pub(crate) fn delay_for_attempt(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(2u32.saturating_pow(attempt))
            .min(self.max_delay)
    }
}

/// How long lock acquisition and blocking `put`/`get` keep retrying.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum WaitPolicy {
    /// Yield the processor and retry forever.
    #[default]
    Unbounded,
    /// Back off exponentially and fail with `Timeout` after `max_attempts`.
    Bounded(RetryConfig),
}

impl WaitPolicy {
    /// Wait before retry number `attempt` (0-based).
    pub(crate) fn pause(&self, attempt: u32) -> Result<(), MailboxError> {
        match self {
            WaitPolicy::Unbounded => {
                thread::yield_now();
                Ok(())
            }
            WaitPolicy::Bounded(config) => {
                if attempt >= config.max_attempts {
                    return Err(MailboxError::Timeout { attempts: attempt });
                }
                thread::sleep(config.delay_for_attempt(attempt));
                Ok(())
            }
        }
    }
}
