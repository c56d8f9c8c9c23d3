//! Timeout normalization.
//!
//! Read timeouts are requested in milliseconds, but not every OS read
//! primitive can honour millisecond resolution. The termios `VTIME` field used
//! by the Linux backend counts deciseconds, so a request has to be quantized
//! before it reaches the driver. Quantization always rounds **up**: a caller
//! asking for 50 ms waits at least 50 ms (100 ms in practice), never less.
//!
//! A timeout of zero is preserved and means "return immediately with whatever
//! is buffered".

use std::time::Duration;

/// Resolution of the timer behind a backend's blocking read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimeoutGranularity {
    /// Native millisecond resolution; requests pass through unchanged.
    Millisecond,
    /// 100 ms steps (termios `VTIME`).
    Decisecond,
}

impl TimeoutGranularity {
    /// Size of one timer step in milliseconds.
    pub const fn step_ms(self) -> u64 {
        match self {
            Self::Millisecond => 1,
            Self::Decisecond => 100,
        }
    }
}

/// Quantize `timeout_ms` to the given granularity, rounding up.
///
/// ```
/// use serial485::timeout::{normalize_timeout_ms, TimeoutGranularity};
///
/// assert_eq!(normalize_timeout_ms(50, TimeoutGranularity::Decisecond), 100);
/// assert_eq!(normalize_timeout_ms(150, TimeoutGranularity::Decisecond), 200);
/// assert_eq!(normalize_timeout_ms(1000, TimeoutGranularity::Decisecond), 1000);
/// assert_eq!(normalize_timeout_ms(0, TimeoutGranularity::Decisecond), 0);
/// assert_eq!(normalize_timeout_ms(50, TimeoutGranularity::Millisecond), 50);
/// ```
pub fn normalize_timeout_ms(timeout_ms: u64, granularity: TimeoutGranularity) -> u64 {
    let step = granularity.step_ms();
    // saturate instead of overflowing for absurd requests
    timeout_ms.div_ceil(step).saturating_mul(step)
}

/// [`normalize_timeout_ms`] over a `Duration`.
///
/// Sub-millisecond remainders count as a full millisecond so the effective
/// wait is never shorter than requested.
pub fn normalize_timeout(timeout: Duration, granularity: TimeoutGranularity) -> Duration {
    let whole_ms = timeout.as_millis();
    let ms = if timeout.subsec_nanos() % 1_000_000 != 0 {
        whole_ms + 1
    } else {
        whole_ms
    };
    let ms = u64::try_from(ms).unwrap_or(u64::MAX);
    Duration::from_millis(normalize_timeout_ms(ms, granularity))
}
