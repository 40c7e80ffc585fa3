//! Minimal TAI64 helpers for header timestamps.

use std::time::{SystemTime, UNIX_EPOCH};

/// TAI64 label offset: values at or above this mark denote seconds since the
/// TAI epoch. TAI currently runs 37 leap seconds ahead of UTC.
const TAI64_BASE: u64 = 1 << 62;
const TAI_UTC_OFFSET: u64 = 37;

/// Current wall-clock time as a TAI64 label.
pub fn tai64_now() -> u64 {
    let unix_secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    from_unix(unix_secs)
}

/// Converts unix seconds to a TAI64 label.
pub fn from_unix(unix_secs: u64) -> u64 {
    TAI64_BASE + unix_secs + TAI_UTC_OFFSET
}

/// Converts a TAI64 label back to unix seconds. Returns `None` for labels
/// before the unix epoch.
pub fn to_unix(tai64: u64) -> Option<u64> {
    tai64.checked_sub(TAI64_BASE + TAI_UTC_OFFSET)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unix_round_trip() {
        assert_eq!(to_unix(from_unix(1_700_000_000)), Some(1_700_000_000));
    }

    #[test]
    fn now_is_after_base() {
        assert!(tai64_now() > TAI64_BASE);
    }
}
