// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Reconnection delay schedule.
//!
//! Attempt 0 waits 1s and attempt 1 waits 2s. From attempt 2 the delay is
//! `4s * 2^(n-2)` capped at 60s, with ±30% multiplicative jitter.

use std::time::Duration;

use rand::Rng;

/// Delay before the first reconnection attempt.
const FIRST_DELAY: Duration = Duration::from_secs(1);
/// Delay before the second attempt.
const SECOND_DELAY: Duration = Duration::from_secs(2);
/// Base of the exponential tail.
const BASE_DELAY: Duration = Duration::from_secs(4);
/// Ceiling before jitter.
pub const MAX_DELAY: Duration = Duration::from_secs(60);
/// Maximum jitter as a fraction of the delay.
pub const JITTER: f64 = 0.3;

/// Un-jittered delay for the given zero-based attempt.
pub fn base_delay(attempt: u32) -> Duration {
    match attempt {
        0 => FIRST_DELAY,
        1 => SECOND_DELAY,
        n => {
            let factor = 1u32.checked_shl(n - 2).unwrap_or(u32::MAX);
            BASE_DELAY.saturating_mul(factor).min(MAX_DELAY)
        }
    }
}

/// Delay for the given attempt with jitter drawn from `rng`.
pub fn delay_with<R: Rng + ?Sized>(attempt: u32, rng: &mut R) -> Duration {
    let base = base_delay(attempt);
    if attempt < 2 {
        return base;
    }
    let factor = rng.gen_range((1.0 - JITTER)..=(1.0 + JITTER));
    base.mul_f64(factor)
}

/// Delay for the given attempt using the thread-local RNG.
pub fn reconnect_delay(attempt: u32) -> Duration {
    delay_with(attempt, &mut rand::thread_rng())
}

#[cfg(test)]
#[path = "backoff_tests.rs"]
mod tests;
