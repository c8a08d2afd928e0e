//! Bounded retry state machine for GitHub API calls.
//!
//! Each call owns a [`RetryState`]. After every failed attempt that is worth
//! retrying, the caller reports it with [`RetryState::on_failure`] and gets
//! back either a delay to wait or an instruction to give up. The state tracks
//! the attempt count and the total time already spent waiting, so every
//! decision is bounded twice: by `max_attempts` and by `max_total_wait`.
//!
//! - Rate-limited attempts wait exactly as long as GitHub asked.
//! - Transient failures wait with exponential backoff (default 0.5s, 1s).
//!
//! Failures that retrying cannot fix never reach this module.

use std::time::Duration;

/// Configuration for bounded retry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first one.
    pub max_attempts: u32,

    /// Delay before the first transient retry.
    pub initial_delay: Duration,

    /// Maximum delay between transient retries (cap for exponential growth).
    pub max_delay: Duration,

    /// Multiplier for exponential backoff (typically 2.0).
    pub backoff_multiplier: f64,

    /// Upper bound on the total time spent waiting within one call.
    pub max_total_wait: Duration,
}

impl RetryConfig {
    /// Default retry configuration for proxied GitHub calls.
    ///
    /// - 3 attempts
    /// - transient delays of 0.5s then 1s
    /// - at most 30s of waiting per call, including rate-limit waits
    pub const DEFAULT: Self = Self {
        max_attempts: 3,
        initial_delay: Duration::from_millis(500),
        max_delay: Duration::from_secs(8),
        backoff_multiplier: 2.0,
        max_total_wait: Duration::from_secs(30),
    };

    /// Configuration that never retries.
    pub const NO_RETRY: Self = Self {
        max_attempts: 1,
        ..Self::DEFAULT
    };

    /// Creates a new retry configuration.
    pub fn new(
        max_attempts: u32,
        initial_delay: Duration,
        max_delay: Duration,
        backoff_multiplier: f64,
        max_total_wait: Duration,
    ) -> Self {
        Self {
            max_attempts,
            initial_delay,
            max_delay,
            backoff_multiplier,
            max_total_wait,
        }
    }

    /// Computes the backoff delay for the given retry (0-indexed).
    ///
    /// The delay grows exponentially: `initial_delay * backoff_multiplier^retry`,
    /// capped at `max_delay`.
    pub fn delay_for_attempt(&self, retry: u32) -> Duration {
        let multiplier = self.backoff_multiplier.powi(retry as i32);
        let delay_secs = self.initial_delay.as_secs_f64() * multiplier;
        let capped_secs = delay_secs.min(self.max_delay.as_secs_f64());
        Duration::from_secs_f64(capped_secs)
    }

    /// Returns an iterator over the transient backoff delays.
    pub fn delays(&self) -> impl Iterator<Item = Duration> + '_ {
        (0..self.max_attempts.saturating_sub(1)).map(|retry| self.delay_for_attempt(retry))
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// A failed attempt that may succeed if repeated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryableFailure {
    /// GitHub throttled the call and asked us to wait.
    RateLimited { retry_after: Duration },

    /// A network failure or server error that did not apply the request.
    Transient,
}

/// What to do after a retryable failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Wait this long, then try again.
    RetryAfter(Duration),

    /// Stop and report the last failure.
    GiveUp(GiveUpReason),
}

/// Why the state machine stopped retrying.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GiveUpReason {
    /// `max_attempts` attempts have been made.
    AttemptsExhausted,

    /// The next wait would push the call past `max_total_wait`.
    WaitBudgetExceeded,
}

/// Per-call retry bookkeeping.
#[derive(Debug, Clone)]
pub struct RetryState {
    config: RetryConfig,
    attempts: u32,
    waited: Duration,
}

impl RetryState {
    pub fn new(config: RetryConfig) -> Self {
        Self {
            config,
            attempts: 0,
            waited: Duration::ZERO,
        }
    }

    /// Records a failed attempt and decides whether to retry.
    pub fn on_failure(&mut self, failure: RetryableFailure) -> RetryDecision {
        self.attempts += 1;

        if self.attempts >= self.config.max_attempts {
            return RetryDecision::GiveUp(GiveUpReason::AttemptsExhausted);
        }

        let delay = match failure {
            RetryableFailure::RateLimited { retry_after } => retry_after,
            RetryableFailure::Transient => self.config.delay_for_attempt(self.attempts - 1),
        };

        if self.waited + delay > self.config.max_total_wait {
            return RetryDecision::GiveUp(GiveUpReason::WaitBudgetExceeded);
        }

        self.waited += delay;
        RetryDecision::RetryAfter(delay)
    }

    /// Number of failed attempts recorded so far.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Total time this call has been told to wait.
    pub fn waited(&self) -> Duration {
        self.waited
    }
}
