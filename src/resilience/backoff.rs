//! Exponential backoff with jitter for callers retrying after
//! `NoAvailableServer`.

use std::time::Duration;

use rand::Rng;

use crate::config::RetryConfig;

/// Delay before retry number `attempt` (1-based). Attempt 0 waits nothing.
///
/// The delay doubles per attempt from `base_ms`, is capped at `max_ms` and
/// gets up to 10% jitter on top.
pub fn retry_delay<R: Rng>(rng: &mut R, attempt: u32, base_ms: u64, max_ms: u64) -> Duration {
    if attempt == 0 {
        return Duration::ZERO;
    }

    let factor = 2u64.saturating_pow(attempt - 1);
    let capped = base_ms.saturating_mul(factor).min(max_ms);

    let jitter_range = capped / 10;
    let jitter = if jitter_range > 0 {
        rng.gen_range(0..jitter_range)
    } else {
        0
    };

    Duration::from_millis(capped + jitter)
}

impl RetryConfig {
    /// [`retry_delay`] with this configuration's bounds.
    pub fn delay<R: Rng>(&self, rng: &mut R, attempt: u32) -> Duration {
        retry_delay(rng, attempt, self.base_delay_ms, self.max_delay_ms)
    }
}
