//! Exponential backoff with jitter.

use std::time::Duration;

use rand::Rng;

/// Delay before retry `attempt` (1-based): `base * 2^(attempt-1)` capped at
/// `max_ms`, less up to 10% jitter so the result never exceeds `max_ms`.
/// Attempt 0 means "no wait".
pub fn calculate_backoff(attempt: u32, base_ms: u64, max_ms: u64) -> Duration {
    let Some(exponent) = attempt.checked_sub(1) else {
        return Duration::ZERO;
    };

    let capped = base_ms
        .saturating_mul(2u64.saturating_pow(exponent))
        .min(max_ms);

    let jitter = match capped / 10 {
        0 => 0,
        range => rand::thread_rng().gen_range(0..range),
    };

    Duration::from_millis(capped - jitter)
}
