//! Tests for the backoff strategy

use super::*;

#[test]
fn test_backoff_exponential_growth() {
    let backoff = BackoffStrategy::new(100, 30_000);

    assert_eq!(backoff.calculate_delay(0), Duration::from_millis(100));
    assert_eq!(backoff.calculate_delay(1), Duration::from_millis(200));
    assert_eq!(backoff.calculate_delay(2), Duration::from_millis(400));
    assert_eq!(backoff.calculate_delay(3), Duration::from_millis(800));
}

#[test]
fn test_backoff_max_limit() {
    let backoff = BackoffStrategy::new(100, 1000);

    assert_eq!(backoff.calculate_delay(10), Duration::from_millis(1000));
    assert_eq!(backoff.calculate_delay(u32::MAX), Duration::from_millis(1000));
}

#[test]
fn test_backoff_clamps_degenerate_inputs() {
    let backoff = BackoffStrategy::new(0, 0);

    assert_eq!(backoff.initial_delay(), Duration::from_millis(1));
    assert_eq!(backoff.max_delay(), Duration::from_millis(1));
    assert_eq!(backoff.calculate_delay(5), Duration::from_millis(1));
}

#[test]
fn test_backoff_default() {
    let backoff = BackoffStrategy::default();
    assert_eq!(backoff.initial_delay(), Duration::from_millis(100));
    assert_eq!(backoff.max_delay(), Duration::from_millis(30_000));
}
