//! Wall-clock helpers.
//!
//! Everything time-dependent in the gateway works on Unix epoch milliseconds
//! so snapshots survive restarts. Components expose `*_at(now_ms)` variants
//! that take the clock as a parameter.

use std::time::{SystemTime, UNIX_EPOCH};

/// Milliseconds since the Unix epoch.
pub fn now_millis() -> u64 {
    let elapsed = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis();
    u64::try_from(elapsed).unwrap_or(u64::MAX)
}

/// Seconds since the Unix epoch.
pub fn now_secs() -> u64 {
    now_millis() / 1000
}

/// Whole seconds needed to cover `ms`, rounding up.
pub fn ceil_secs(ms: u64) -> u64 {
    ms.div_ceil(1000)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ceil_secs_rounds_up() {
        assert_eq!(ceil_secs(0), 0);
        assert_eq!(ceil_secs(1), 1);
        assert_eq!(ceil_secs(1000), 1);
        assert_eq!(ceil_secs(59_001), 60);
    }

    #[test]
    fn clock_is_past_2020() {
        assert!(now_secs() > 1_577_836_800);
        assert_eq!(now_millis() / 1000, now_secs());
    }
}
