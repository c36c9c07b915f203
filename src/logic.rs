/*
Alarm time arithmetic.
Module was independently written from HTTP / Axum for testing
*/

use chrono::{DateTime, Duration, FixedOffset, TimeZone};

pub const MILLIS_PER_MINUTE: i64 = 60 * 1000;
pub const MILLIS_PER_HOUR: i64 = 60 * MILLIS_PER_MINUTE;

// Milliseconds left until `alarm_ms`, never negative.
pub fn millis_until(alarm_ms: i64, now: DateTime<FixedOffset>) -> i64 {
    alarm_ms.saturating_sub(now.timestamp_millis()).max(0)
}

// Ceiling division of a non-negative duration into whole units:
//     unit = 1 min:  1..=60 s -> 1,  61..=120 s -> 2
//     unit = 1 h:    1..=60 min -> 1, 61..=120 min -> 2
pub fn ceil_units(millis: i64, unit_ms: i64) -> i64 {
    millis / unit_ms + i64::from(millis % unit_ms != 0)
}

// Next instant at hour:minute:00.000 in the offset of `now`.
//
// Rules:
// - Today's instant if it is still strictly in the future
// - Otherwise the same wall time tomorrow
pub fn next_occurrence(hour: u32, minute: u32, now: DateTime<FixedOffset>) -> i64 {
    let offset = *now.offset();
    let today = now
        .date_naive()
        .and_hms_opt(hour, minute, 0)
        .and_then(|naive| offset.from_local_datetime(&naive).single());

    match today {
        Some(at) if at > now => at.timestamp_millis(),
        Some(at) => (at + Duration::days(1)).timestamp_millis(),
        // hour/minute out of range; callers validate before getting here
        None => now.timestamp_millis(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::at;

    #[test]
    fn ceil_units_rounds_up() {
        assert_eq!(ceil_units(0, MILLIS_PER_MINUTE), 0);
        assert_eq!(ceil_units(1, MILLIS_PER_MINUTE), 1);
        assert_eq!(ceil_units(60_000, MILLIS_PER_MINUTE), 1);
        assert_eq!(ceil_units(61_000, MILLIS_PER_MINUTE), 2);
        assert_eq!(ceil_units(MILLIS_PER_HOUR, MILLIS_PER_HOUR), 1);
        assert_eq!(ceil_units(MILLIS_PER_HOUR + 1, MILLIS_PER_HOUR), 2);
    }

    #[test]
    fn millis_until_clamps_past_to_zero() {
        let now = at(12, 0);
        assert_eq!(millis_until(now.timestamp_millis() - 5_000, now), 0);
        assert_eq!(millis_until(now.timestamp_millis() + 5_000, now), 5_000);
    }

    #[test]
    fn extreme_epochs_saturate() {
        let now = at(12, 0);
        assert_eq!(millis_until(i64::MIN, now), 0);
        assert_eq!(millis_until(i64::MAX, now), i64::MAX - now.timestamp_millis());
        assert_eq!(ceil_units(i64::MAX, MILLIS_PER_MINUTE), i64::MAX / MILLIS_PER_MINUTE + 1);
    }

    #[test]
    fn next_occurrence_later_today() {
        let now = at(10, 0);
        assert_eq!(next_occurrence(14, 22, now), at(14, 22).timestamp_millis());
    }

    #[test]
    fn next_occurrence_rolls_to_tomorrow_when_passed() {
        let now = at(15, 0);
        let expected = (at(14, 22) + Duration::days(1)).timestamp_millis();
        assert_eq!(next_occurrence(14, 22, now), expected);
    }

    #[test]
    fn next_occurrence_rolls_when_exactly_now() {
        let now = at(14, 22);
        let expected = (at(14, 22) + Duration::days(1)).timestamp_millis();
        assert_eq!(next_occurrence(14, 22, now), expected);
    }

    #[test]
    fn next_occurrence_respects_offset() {
        let offset = FixedOffset::east_opt(9 * 3600).unwrap();
        let now = offset.with_ymd_and_hms(2026, 10, 15, 20, 0, 0).unwrap();
        let expected = offset
            .with_ymd_and_hms(2026, 10, 15, 21, 30, 0)
            .unwrap()
            .timestamp_millis();
        assert_eq!(next_occurrence(21, 30, now), expected);
    }
}
