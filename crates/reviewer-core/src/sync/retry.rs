//! Bounded retry for failed mutations.

use std::time::Duration;

use crate::config::SyncSettings;

/// Why a mutation left the queue without reaching the remote
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// Failed `max_attempts` times
    RetriesExhausted,
    /// The remote rejected it in a way retrying cannot fix
    Permanent,
}

/// What to do with a mutation after a failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Keep it queued; `next_attempt_at` is set when backoff is enabled
    Retry { next_attempt_at: Option<i64> },
    Drop(DropReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub drop_permanent: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&SyncSettings::default())
    }
}

impl From<&SyncSettings> for RetryPolicy {
    fn from(settings: &SyncSettings) -> Self {
        Self {
            max_attempts: settings.max_attempts,
            base_delay: settings.retry_base_delay,
            max_delay: settings.retry_max_delay,
            drop_permanent: settings.drop_permanent_failures,
        }
    }
}

impl RetryPolicy {
    /// Decide the fate of a mutation that has now failed `failures` times
    pub fn decide(&self, failures: u32, permanent: bool, now_ms: i64) -> RetryDecision {
        if permanent && self.drop_permanent {
            return RetryDecision::Drop(DropReason::Permanent);
        }
        if failures >= self.max_attempts {
            return RetryDecision::Drop(DropReason::RetriesExhausted);
        }

        let next_attempt_at = self.delay_after(failures).map(|delay| {
            now_ms.saturating_add(i64::try_from(delay.as_millis()).unwrap_or(i64::MAX))
        });
        RetryDecision::Retry { next_attempt_at }
    }

    /// Backoff after `failures` failures: `base * 2^(failures - 1)`, capped.
    /// `None` when backoff is disabled.
    pub fn delay_after(&self, failures: u32) -> Option<Duration> {
        if self.base_delay.is_zero() {
            return None;
        }
        let exponent = failures.saturating_sub(1).min(31);
        let delay = self
            .base_delay
            .checked_mul(1_u32 << exponent)
            .unwrap_or(self.max_delay);
        Some(delay.min(self.max_delay))
    }
}
