use std::time::Duration;

use proptest::prelude::*;
use tradefeed::streaming::backoff::{Backoff, jitter_wait};

proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]

    #[test]
    fn waits_stay_within_bounds_and_never_shrink(
        min_ms in 1u64..=1_000,
        extra_ms in 0u64..=60_000,
        factor in 1u32..=8,
        failures in 1usize..=40,
    ) {
        let min = Duration::from_millis(min_ms);
        let max = Duration::from_millis(min_ms + extra_ms);
        let mut b = Backoff::new(min, max, factor);

        let mut prev = Duration::ZERO;
        for _ in 0..failures {
            let wait = b.next();
            prop_assert!(wait >= min && wait <= max);
            prop_assert!(wait >= prev);
            prev = wait;
        }

        b.reset();
        prop_assert_eq!(b.next(), min);
    }

    #[test]
    fn jitter_never_undercuts_base(base_ms in 0u64..=100_000, percent in 0u32..=100) {
        let v = jitter_wait(base_ms, percent);
        prop_assert!(v >= base_ms);
        prop_assert!(v <= base_ms + base_ms * u64::from(percent) / 100 + 1);
    }
}
