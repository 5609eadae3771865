use std::time::Duration;

use rand::Rng;

use super::classify::ErrorSignal;

/// Decision returned by the retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Do not retry this error.
    NoRetry,
    /// Retry after the given delay.
    RetryAfter(Duration),
}

/// Largest usable jitter ratio; larger values are clamped to it.
pub const MAX_JITTER_RATIO: f64 = 0.99;

/// Exponential backoff with symmetric jitter and a server-hint floor.
///
/// Without a hint the wait is `base * 2^(attempt-1)` scaled by a random factor
/// in `[1 - jitter_ratio, 1 + jitter_ratio]`, never below `base` on the first
/// retry. With a hint the same factor scales the hint itself (no exponent),
/// floored at `hint + hint_buffer`, so callers given the same hint still
/// spread out. Everything is capped at `max_delay`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub jitter_ratio: f64,
    /// Safety margin added on top of a server-advised delay.
    pub hint_buffer: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(20),
            jitter_ratio: 0.2,
            hint_buffer: Duration::from_millis(50),
        }
    }
}

impl RetryPolicy {
    /// Backoff before retry number `attempt` (1 = first retry), using the thread RNG.
    pub fn backoff(&self, attempt: u32, hint: Option<Duration>) -> Duration {
        self.backoff_with(attempt, hint, &mut rand::rng())
    }

    /// Same as [`backoff`](Self::backoff) with a caller-supplied RNG.
    pub fn backoff_with<R: Rng + ?Sized>(
        &self,
        attempt: u32,
        hint: Option<Duration>,
        rng: &mut R,
    ) -> Duration {
        let base_ms = self.base_delay.as_secs_f64() * 1000.0;
        let max_ms = self.max_delay.as_secs_f64() * 1000.0;

        let exp = 2f64.powi(attempt.saturating_sub(1).min(30) as i32);
        let ratio = if self.jitter_ratio.is_finite() {
            self.jitter_ratio.clamp(0.0, MAX_JITTER_RATIO)
        } else {
            0.0
        };
        let factor = if ratio > 0.0 {
            1.0 + rng.random_range(-ratio..=ratio)
        } else {
            1.0
        };

        let ms = match hint {
            Some(hint) => {
                let hint_ms = hint.as_secs_f64() * 1000.0;
                let floor = hint_ms + self.hint_buffer.as_secs_f64() * 1000.0;
                (hint_ms * factor).max(floor)
            }
            None if attempt <= 1 => (base_ms * exp * factor).max(base_ms),
            None => base_ms * exp * factor,
        };
        Duration::from_millis(ms.min(max_ms).max(0.0).round() as u64)
    }

    /// Decide whether the failure at `attempt` (0 = first invocation) gets another try.
    pub fn decide(&self, attempt: u32, max_retries: u32, signal: &ErrorSignal) -> RetryDecision {
        if !signal.retryable || attempt >= max_retries {
            return RetryDecision::NoRetry;
        }
        RetryDecision::RetryAfter(self.backoff(attempt + 1, signal.explicit_delay))
    }
}
