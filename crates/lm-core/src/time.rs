//! Wall-clock helpers. Evidence timestamps are Unix seconds as `f64`.

use std::time::{SystemTime, UNIX_EPOCH};

/// Current UTC time as fractional Unix seconds.
pub fn now_unix_secs() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}

pub fn now_iso8601() -> String {
    unix_to_iso8601(now_unix_secs())
}

/// Format Unix seconds as an ISO-8601 UTC string, truncated to whole seconds.
/// Negative and non-finite inputs clamp to the epoch.
pub fn unix_to_iso8601(secs: f64) -> String {
    let secs = if secs.is_finite() && secs > 0.0 {
        secs.floor() as u64
    } else {
        0
    };
    let days = (secs / 86_400) as i64;
    let time_of_day = secs % 86_400;
    let hours = time_of_day / 3_600;
    let minutes = (time_of_day % 3_600) / 60;
    let seconds = time_of_day % 60;

    let (y, m, d) = civil_from_days(days);
    format!("{y:04}-{m:02}-{d:02}T{hours:02}:{minutes:02}:{seconds:02}Z")
}

/// Days since the Unix epoch to a proleptic Gregorian (year, month, day).
fn civil_from_days(days: i64) -> (i64, u64, u64) {
    let z = days + 719_468;
    let era = if z >= 0 { z } else { z - 146_096 } / 146_097;
    let doe = (z - era * 146_097) as u64;
    let yoe = (doe - doe / 1_460 + doe / 36_524 - doe / 146_096) / 365;
    let y = yoe as i64 + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let d = doy - (153 * mp + 2) / 5 + 1;
    let m = if mp < 10 { mp + 3 } else { mp - 9 };
    let y = if m <= 2 { y + 1 } else { y };
    (y, m, d)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_epoch() {
        assert_eq!(unix_to_iso8601(0.0), "1970-01-01T00:00:00Z");
        assert_eq!(unix_to_iso8601(-5.0), "1970-01-01T00:00:00Z");
        assert_eq!(unix_to_iso8601(f64::NAN), "1970-01-01T00:00:00Z");
    }

    #[test]
    fn test_fraction_truncated() {
        // 2023-11-14T22:13:20Z = 1700000000
        assert_eq!(unix_to_iso8601(1_700_000_000.75), "2023-11-14T22:13:20Z");
    }

    #[test]
    fn test_now_is_after_2024() {
        assert!(now_unix_secs() > 1_704_067_200.0);
    }
}
