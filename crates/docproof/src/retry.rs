//! Retry policy for registration submissions.
//!
//! The policy is a pure decision table: given the error of an attempt and
//! the attempt number, say whether to try again and after how long.

use std::time::Duration;

use crate::error::NotaryError;

/// Largest backoff exponent; keeps `base * 2^attempt` from overflowing.
const MAX_BACKOFF_EXPONENT: u32 = 16;

/// What to do after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Wait, then try again.
    Retry(Duration),
    /// The error cannot be fixed by retrying; surface it as is.
    NotRetryable,
    /// The error was retryable but the budget is spent.
    Exhausted,
}

/// Bounded exponential backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts allowed after the first one.
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay: Duration::from_millis(1000),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
        }
    }

    /// Total attempts, including the first.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Backoff before the retry that follows failed attempt `attempt`
    /// (zero-based): `base_delay * 2^attempt`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u32 << attempt.min(MAX_BACKOFF_EXPONENT);
        self.base_delay.saturating_mul(factor)
    }

    /// Classify the failure of zero-based attempt `attempt`.
    ///
    /// Validation, wallet and contract failures are deterministic and are
    /// never retried. Network failures are retried until the budget runs
    /// out.
    pub fn decide(&self, error: &NotaryError, attempt: u32) -> RetryDecision {
        match error {
            NotaryError::Validation(_) | NotaryError::Wallet(_) | NotaryError::Contract(_) => {
                RetryDecision::NotRetryable
            }
            NotaryError::Network { .. } if attempt < self.max_retries => {
                RetryDecision::Retry(self.delay_for(attempt))
            }
            NotaryError::Network { .. } => RetryDecision::Exhausted,
        }
    }
}
