//! Millisecond epoch timestamps.
//!
//! Every persisted instant in switchboard is an `i64` count of milliseconds
//! since the Unix epoch. Webhook sources report seconds, so conversions live
//! here rather than at each call site.

use std::time::{SystemTime, UNIX_EPOCH};

/// Current wall-clock time in epoch milliseconds.
pub fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

/// Convert epoch seconds to epoch milliseconds, saturating on overflow.
pub fn secs_to_ms(secs: i64) -> i64 {
    secs.saturating_mul(1000)
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seconds_scale_to_millis() {
        assert_eq!(secs_to_ms(1000), 1_000_000);
        assert_eq!(secs_to_ms(i64::MAX), i64::MAX);
    }

    #[test]
    fn now_is_after_2020() {
        assert!(now_ms() > 1_577_836_800_000);
    }
}
