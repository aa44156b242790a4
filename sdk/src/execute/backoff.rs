//! Retry delay schedule.

use std::time::Duration;

/// Delay after failed attempt number `attempt` (1-based):
/// `min(min_backoff * 2^(attempt - 1), max_backoff)`.
///
/// Saturates instead of overflowing for absurd attempt counts.
pub fn exponential(attempt: u32, min_backoff: Duration, max_backoff: Duration) -> Duration {
    let exponent = attempt.saturating_sub(1).min(31);
    min_backoff
        .checked_mul(1u32 << exponent)
        .unwrap_or(max_backoff)
        .min(max_backoff)
}
