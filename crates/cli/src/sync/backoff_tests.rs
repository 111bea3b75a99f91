// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use rand::rngs::StdRng;
use rand::SeedableRng;
use yare::parameterized;

#[parameterized(
    first = { 0, 1 },
    second = { 1, 2 },
    third = { 2, 4 },
    fourth = { 3, 8 },
    fifth = { 4, 16 },
    sixth = { 5, 32 },
    capped = { 6, 60 },
    far_out = { 40, 60 },
)]
fn base_schedule(attempt: u32, expected_secs: u64) {
    assert_eq!(base_delay(attempt), Duration::from_secs(expected_secs));
}

#[test]
fn base_delay_is_non_decreasing() {
    let mut previous = Duration::ZERO;
    for attempt in 0..64 {
        let delay = base_delay(attempt);
        assert!(delay >= previous, "attempt {attempt} went backwards");
        previous = delay;
    }
}

#[test]
fn first_attempts_are_not_jittered() {
    let mut rng = StdRng::seed_from_u64(7);
    for _ in 0..50 {
        assert_eq!(delay_with(0, &mut rng), Duration::from_secs(1));
        assert_eq!(delay_with(1, &mut rng), Duration::from_secs(2));
    }
}

#[test]
fn jitter_stays_within_thirty_percent() {
    let mut rng = StdRng::seed_from_u64(42);
    for attempt in 2..20 {
        let base = base_delay(attempt).as_secs_f64();
        for _ in 0..100 {
            let delay = delay_with(attempt, &mut rng).as_secs_f64();
            assert!(delay >= base * (1.0 - JITTER) - 1e-9);
            assert!(delay <= base * (1.0 + JITTER) + 1e-9);
        }
    }
}

#[test]
fn jittered_delay_never_exceeds_cap_plus_jitter() {
    let mut rng = StdRng::seed_from_u64(3);
    let ceiling = MAX_DELAY.as_secs_f64() * (1.0 + JITTER);
    for attempt in 0..100 {
        assert!(delay_with(attempt, &mut rng).as_secs_f64() <= ceiling + 1e-9);
    }
}

#[test]
fn mean_delay_grows_until_cap() {
    let mut rng = StdRng::seed_from_u64(11);
    let mean = |attempt: u32, rng: &mut StdRng| {
        (0..400)
            .map(|_| delay_with(attempt, rng).as_secs_f64())
            .sum::<f64>()
            / 400.0
    };
    let means: Vec<f64> = (0..8).map(|a| mean(a, &mut rng)).collect();
    for pair in means.windows(2) {
        // Equal bases (at the cap) may differ by sampling noise
        assert!(pair[1] >= pair[0] * 0.95, "means: {means:?}");
    }
}
