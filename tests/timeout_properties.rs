//! Property tests for timeout quantization and RS-485 delay conversion.

use proptest::prelude::*;
use serial485::timeout::{normalize_timeout, normalize_timeout_ms, TimeoutGranularity};
use serial485::Rs485Config;
use std::time::Duration;

proptest! {
    #[test]
    fn decisecond_never_shortens(ms in 0u64..10_000_000) {
        let effective = normalize_timeout_ms(ms, TimeoutGranularity::Decisecond);
        prop_assert!(effective >= ms);
        prop_assert!(effective - ms < 100);
        prop_assert_eq!(effective % 100, 0);
    }

    #[test]
    fn millisecond_is_identity(ms in 0u64..u64::MAX) {
        prop_assert_eq!(normalize_timeout_ms(ms, TimeoutGranularity::Millisecond), ms);
    }

    #[test]
    fn normalization_is_idempotent(ms in 0u64..10_000_000) {
        let once = normalize_timeout_ms(ms, TimeoutGranularity::Decisecond);
        prop_assert_eq!(normalize_timeout_ms(once, TimeoutGranularity::Decisecond), once);
    }

    #[test]
    fn zero_stays_zero_only_for_zero(ms in 1u64..1_000) {
        prop_assert!(normalize_timeout_ms(ms, TimeoutGranularity::Decisecond) >= 100);
    }

    #[test]
    fn duration_rounding_covers_sub_millisecond_parts(micros in 0u64..5_000_000) {
        let requested = Duration::from_micros(micros);
        let effective = normalize_timeout(requested, TimeoutGranularity::Millisecond);
        prop_assert!(effective >= requested);
        prop_assert!(effective - requested < Duration::from_millis(1));
    }

    #[test]
    fn kernel_delays_round_up(before in 0u32..10_000_000, after in 0u32..10_000_000) {
        let settings = Rs485Config::enabled().with_delays(before, after).kernel_settings();
        prop_assert!(u64::from(settings.delay_before_send_ms()) * 1000 >= u64::from(before));
        prop_assert!(u64::from(settings.delay_after_send_ms()) * 1000 >= u64::from(after));
        prop_assert!(u64::from(settings.delay_before_send_ms()) * 1000 < u64::from(before) + 1000);
    }
}

#[test]
fn test_zero_timeout_preserved() {
    assert_eq!(normalize_timeout_ms(0, TimeoutGranularity::Decisecond), 0);
    assert_eq!(
        normalize_timeout(Duration::ZERO, TimeoutGranularity::Decisecond),
        Duration::ZERO
    );
}
