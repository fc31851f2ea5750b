use std::time::Duration;

use tradefeed::streaming::backoff::{Backoff, jitter_wait};
use tradefeed::BackoffConfig;

fn ms(v: u64) -> Duration {
    Duration::from_millis(v)
}

#[test]
fn grows_by_factor_and_caps_at_max() {
    let mut b = Backoff::from_config(&BackoffConfig::default());
    let waits: Vec<Duration> = (0..6).map(|_| b.next()).collect();
    assert_eq!(waits, vec![ms(100), ms(200), ms(400), ms(800), ms(1000), ms(1000)]);
}

#[test]
fn reset_returns_to_min() {
    let mut b = Backoff::new(ms(100), ms(1000), 2);
    b.next();
    b.next();
    b.next();
    assert_eq!(b.current(), ms(800));

    b.reset();
    assert_eq!(b.current(), ms(100));
    assert_eq!(b.next(), ms(100));
    assert_eq!(b.next(), ms(200));
}

#[test]
fn degenerate_settings_are_clamped() {
    let mut flat = Backoff::new(ms(250), ms(1000), 0);
    assert_eq!(flat.next(), ms(250));
    assert_eq!(flat.next(), ms(250));

    let mut inverted = Backoff::new(ms(500), ms(100), 2);
    assert_eq!(inverted.max(), ms(500));
    assert_eq!(inverted.next(), ms(500));
    assert_eq!(inverted.next(), ms(500));
}

#[test]
fn huge_factor_saturates_at_max() {
    let mut b = Backoff::new(ms(100), Duration::from_secs(3600), u32::MAX);
    assert_eq!(b.next(), ms(100));
    assert_eq!(b.next(), Duration::from_secs(3600));
    assert_eq!(b.next(), Duration::from_secs(3600));
}

#[test]
fn jitter_wait_within_bounds() {
    let base_ms = 1000;
    let jitter_percent = 10;
    for _ in 0..100 {
        let v = jitter_wait(base_ms, jitter_percent);
        assert!(v >= base_ms);
        assert!(v < base_ms + (base_ms * u64::from(jitter_percent)) / 100 + 1);
    }
}

#[test]
fn jitter_wait_zero_percent_is_identity() {
    let base_ms = 500;
    for _ in 0..10 {
        assert_eq!(jitter_wait(base_ms, 0), base_ms);
    }
}
