//! Calendar helpers shared by the expiry policies.

use chrono::{DateTime, Duration, NaiveTime, Utc};

const SECONDS_PER_DAY: i64 = 86_400;

/// Whole days in `delta`, rounded towards negative infinity.
///
/// `-1h` is `-1` day, not `0`; expiry arithmetic relies on this.
pub fn floor_days(delta: Duration) -> i64 {
    let mut secs = delta.num_seconds();
    if delta.subsec_nanos() < 0 {
        secs -= 1;
    }
    secs.div_euclid(SECONDS_PER_DAY)
}

/// Midnight (UTC) of the day containing `at`.
pub fn start_of_day(at: DateTime<Utc>) -> DateTime<Utc> {
    at.date_naive().and_time(NaiveTime::MIN).and_utc()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn floors_negative_partial_days() {
        assert_eq!(floor_days(Duration::hours(-1)), -1);
        assert_eq!(floor_days(Duration::milliseconds(-1)), -1);
        assert_eq!(floor_days(Duration::hours(23)), 0);
        assert_eq!(floor_days(Duration::days(3) + Duration::hours(5)), 3);
        assert_eq!(floor_days(Duration::days(-3)), -3);
    }

    #[test]
    fn truncates_to_midnight() {
        let at = Utc.with_ymd_and_hms(2024, 5, 17, 18, 42, 7).unwrap();
        assert_eq!(start_of_day(at), Utc.with_ymd_and_hms(2024, 5, 17, 0, 0, 0).unwrap());
    }
}
