//! TTL Resolution
//!
//! Normalizes caller TTLs (absent, whole seconds or a calendar interval)
//! into a concrete number of seconds.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Days, Duration, Local, Months, Offset, TimeZone};
use serde_json::Value;

use crate::error::{CacheError, Result};

// == Date Interval ==
/// Calendar-aware span of time.
///
/// Years, months, weeks and days are applied on the calendar of a reference
/// instant, so `months(1)` is 28 to 31 days depending on when it is resolved.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct DateInterval {
    pub years: u32,
    pub months: u32,
    pub weeks: u32,
    pub days: u32,
    pub hours: u32,
    pub minutes: u32,
    pub seconds: u32,
}

impl DateInterval {
    pub fn years(years: u32) -> Self {
        Self {
            years,
            ..Self::default()
        }
    }

    pub fn months(months: u32) -> Self {
        Self {
            months,
            ..Self::default()
        }
    }

    pub fn weeks(weeks: u32) -> Self {
        Self {
            weeks,
            ..Self::default()
        }
    }

    pub fn days(days: u32) -> Self {
        Self {
            days,
            ..Self::default()
        }
    }

    pub fn hours(hours: u32) -> Self {
        Self {
            hours,
            ..Self::default()
        }
    }

    pub fn minutes(minutes: u32) -> Self {
        Self {
            minutes,
            ..Self::default()
        }
    }

    pub fn seconds(seconds: u32) -> Self {
        Self {
            seconds,
            ..Self::default()
        }
    }

    /// Number of seconds between `reference` and `reference + self`.
    ///
    /// Returns `None` when the target instant falls outside the calendar.
    pub fn seconds_from<Tz: TimeZone>(&self, reference: &DateTime<Tz>) -> Option<i64> {
        let months = self.years.checked_mul(12)?.checked_add(self.months)?;
        let days = u64::from(self.weeks) * 7 + u64::from(self.days);
        let clock = i64::from(self.hours) * 3600
            + i64::from(self.minutes) * 60
            + i64::from(self.seconds);

        // Calendar steps move the wall clock, clock steps move the instant
        let wall = reference
            .naive_local()
            .checked_add_months(Months::new(months))?
            .checked_add_days(Days::new(days))?;

        let zone = reference.timezone();
        let landed = match zone.from_local_datetime(&wall).earliest() {
            Some(instant) => instant,
            None => {
                // Wall time skipped by a forward transition: keep the reference offset
                let offset = i64::from(reference.offset().fix().local_minus_utc());
                let utc = wall.checked_sub_signed(Duration::seconds(offset))?;
                zone.from_utc_datetime(&utc)
            }
        };

        let target = landed.checked_add_signed(Duration::seconds(clock))?;

        Some(target.signed_duration_since(reference.clone()).num_seconds())
    }

    fn is_zero(&self) -> bool {
        *self == Self::default()
    }
}

impl fmt::Display for DateInterval {
    /// ISO-8601 duration, e.g. `P1DT4H`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_zero() {
            return f.write_str("PT0S");
        }

        f.write_str("P")?;
        for (value, unit) in [
            (self.years, 'Y'),
            (self.months, 'M'),
            (self.weeks, 'W'),
            (self.days, 'D'),
        ] {
            if value > 0 {
                write!(f, "{}{}", value, unit)?;
            }
        }

        if self.hours > 0 || self.minutes > 0 || self.seconds > 0 {
            f.write_str("T")?;
            for (value, unit) in [(self.hours, 'H'), (self.minutes, 'M'), (self.seconds, 'S')] {
                if value > 0 {
                    write!(f, "{}{}", value, unit)?;
                }
            }
        }

        Ok(())
    }
}

impl FromStr for DateInterval {
    type Err = CacheError;

    /// Parses ISO-8601 durations such as `P1Y2M3DT4H5M6S` or `P2W`.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let invalid = || CacheError::InvalidTtl(format!("{:?}", s));

        let body = s.trim().strip_prefix('P').ok_or_else(invalid)?;
        let mut interval = Self::default();
        let mut digits = String::new();
        let mut in_time = false;
        let mut seen_component = false;
        let mut time_component = false;
        let mut seen_units = 0u8;

        for c in body.chars() {
            match c {
                '0'..='9' => digits.push(c),
                'T' if !in_time && digits.is_empty() => in_time = true,
                unit => {
                    let value: u32 = digits.parse().map_err(|_| invalid())?;
                    digits.clear();

                    let (slot, position) = match (in_time, unit) {
                        (false, 'Y') => (&mut interval.years, 1u8 << 0),
                        (false, 'M') => (&mut interval.months, 1 << 1),
                        (false, 'W') => (&mut interval.weeks, 1 << 2),
                        (false, 'D') => (&mut interval.days, 1 << 3),
                        (true, 'H') => (&mut interval.hours, 1 << 4),
                        (true, 'M') => (&mut interval.minutes, 1 << 5),
                        (true, 'S') => (&mut interval.seconds, 1 << 6),
                        _ => return Err(invalid()),
                    };
                    // Each unit at most once
                    if seen_units & position != 0 {
                        return Err(invalid());
                    }
                    seen_units |= position;
                    *slot = value;
                    seen_component = true;
                    time_component |= in_time;
                }
            }
        }

        if !digits.is_empty() || !seen_component || (in_time && !time_component) {
            return Err(invalid());
        }

        Ok(interval)
    }
}

// == TTL ==
/// Time-to-live requested by a caller.
///
/// An absent TTL is expressed as `Option::<Ttl>::None` and means "use the
/// backend default".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ttl {
    /// Whole seconds, must not be negative
    Seconds(i64),
    /// Calendar-aware interval resolved against the current instant
    Interval(DateInterval),
}

impl From<u32> for Ttl {
    fn from(seconds: u32) -> Self {
        Ttl::Seconds(i64::from(seconds))
    }
}

impl From<i64> for Ttl {
    fn from(seconds: i64) -> Self {
        Ttl::Seconds(seconds)
    }
}

impl From<std::time::Duration> for Ttl {
    fn from(duration: std::time::Duration) -> Self {
        Ttl::Seconds(i64::try_from(duration.as_secs()).unwrap_or(i64::MAX))
    }
}

impl From<DateInterval> for Ttl {
    fn from(interval: DateInterval) -> Self {
        Ttl::Interval(interval)
    }
}

impl FromStr for Ttl {
    type Err = CacheError;

    /// Accepts an integer second count or an ISO-8601 duration.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().parse::<i64>() {
            Ok(seconds) => Ok(Ttl::Seconds(seconds)),
            Err(_) => s.parse::<DateInterval>().map(Ttl::Interval),
        }
    }
}

impl TryFrom<&Value> for Ttl {
    type Error = CacheError;

    fn try_from(value: &Value) -> std::result::Result<Self, Self::Error> {
        match value {
            Value::Number(n) => n
                .as_i64()
                .map(Ttl::Seconds)
                .ok_or_else(|| CacheError::InvalidTtl(value.to_string())),
            Value::String(s) => s
                .parse()
                .map_err(|_| CacheError::InvalidTtl(value.to_string())),
            _ => Err(CacheError::InvalidTtl(value.to_string())),
        }
    }
}

// == Resolve ==
/// Resolves `ttl` to seconds against the current local time.
pub fn resolve_ttl(ttl: Option<Ttl>, default_ttl: u64) -> Result<u64> {
    resolve_ttl_at(ttl, default_ttl, &Local::now())
}

/// Resolves `ttl` to seconds against a fixed reference instant.
pub fn resolve_ttl_at<Tz: TimeZone>(
    ttl: Option<Ttl>,
    default_ttl: u64,
    reference: &DateTime<Tz>,
) -> Result<u64> {
    match ttl {
        None => Ok(default_ttl),
        Some(Ttl::Seconds(seconds)) => {
            u64::try_from(seconds).map_err(|_| CacheError::InvalidTtl(seconds.to_string()))
        }
        Some(Ttl::Interval(interval)) => interval
            .seconds_from(reference)
            .and_then(|seconds| u64::try_from(seconds).ok())
            .ok_or_else(|| CacheError::InvalidTtl(interval.to_string())),
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, LocalResult, NaiveDate, NaiveDateTime, Utc};

    fn at(rfc3339: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(rfc3339)
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn test_absent_uses_default() {
        assert_eq!(resolve_ttl(None, 300).unwrap(), 300);
    }

    #[test]
    fn test_seconds_pass_through() {
        assert_eq!(resolve_ttl(Some(Ttl::Seconds(0)), 300).unwrap(), 0);
        assert_eq!(resolve_ttl(Some(Ttl::Seconds(90)), 300).unwrap(), 90);
    }

    #[test]
    fn test_negative_seconds_rejected() {
        let err = resolve_ttl(Some(Ttl::Seconds(-5)), 300).unwrap_err();
        match err {
            CacheError::InvalidTtl(repr) => assert_eq!(repr, "-5"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_four_hours_interval() {
        let ttl = Some(Ttl::Interval(DateInterval::hours(4)));
        assert_eq!(resolve_ttl(ttl, 300).unwrap(), 14_400);
    }

    #[test]
    fn test_month_depends_on_reference() {
        let ttl = Some(Ttl::Interval(DateInterval::months(1)));

        // Jan 31 + 1 month clamps to Feb 29 in a leap year
        let january = at("2024-01-31T00:00:00Z");
        assert_eq!(resolve_ttl_at(ttl, 0, &january).unwrap(), 29 * 86_400);

        let april = at("2023-04-01T00:00:00Z");
        assert_eq!(resolve_ttl_at(ttl, 0, &april).unwrap(), 30 * 86_400);
    }

    #[test]
    fn test_leap_year() {
        let ttl = Some(Ttl::Interval(DateInterval::years(1)));
        let reference = at("2024-01-01T12:00:00Z");
        assert_eq!(resolve_ttl_at(ttl, 0, &reference).unwrap(), 366 * 86_400);
    }

    #[test]
    fn test_combined_interval() {
        let interval = DateInterval {
            weeks: 1,
            days: 1,
            hours: 2,
            minutes: 3,
            seconds: 4,
            ..DateInterval::default()
        };
        let reference = at("2023-06-10T08:00:00Z");
        let expected = 8 * 86_400 + 2 * 3600 + 3 * 60 + 4;
        assert_eq!(
            resolve_ttl_at(Some(interval.into()), 0, &reference).unwrap(),
            expected
        );
    }

    #[test]
    fn test_parse_iso_durations() {
        assert_eq!("PT4H".parse::<DateInterval>().unwrap(), DateInterval::hours(4));
        assert_eq!("P2W".parse::<DateInterval>().unwrap(), DateInterval::weeks(2));

        let full: DateInterval = "P1Y2M3DT4H5M6S".parse().unwrap();
        assert_eq!(
            full,
            DateInterval {
                years: 1,
                months: 2,
                weeks: 0,
                days: 3,
                hours: 4,
                minutes: 5,
                seconds: 6,
            }
        );
        assert_eq!(full.to_string(), "P1Y2M3DT4H5M6S");
    }

    #[test]
    fn test_parse_rejects_garbage() {
        for input in ["", "P", "PT", "4H", "P4H", "PT4D", "P1Y2", "PxD", "P1DT", "P1D2D", "PT1H1H"] {
            assert!(
                matches!(input.parse::<DateInterval>(), Err(CacheError::InvalidTtl(_))),
                "{input} should be rejected"
            );
        }
    }

    #[test]
    fn test_ttl_from_json() {
        assert_eq!(Ttl::try_from(&Value::from(60)).unwrap(), Ttl::Seconds(60));
        assert_eq!(Ttl::try_from(&Value::from("120")).unwrap(), Ttl::Seconds(120));
        assert_eq!(
            Ttl::try_from(&Value::from("P1D")).unwrap(),
            Ttl::Interval(DateInterval::days(1))
        );

        for bad in [Value::from(1.5), Value::Bool(true), Value::from("soon"), Value::Array(vec![])] {
            let err = Ttl::try_from(&bad).unwrap_err();
            match err {
                CacheError::InvalidTtl(repr) => assert_eq!(repr, bad.to_string()),
                other => panic!("unexpected error: {other:?}"),
            }
        }
    }

    /// US Eastern rules for 2024 only: EDT from Mar 10 02:00 to Nov 3 02:00.
    #[derive(Debug, Clone, Copy)]
    struct Eastern2024;

    impl Eastern2024 {
        const EST: i32 = -5 * 3600;
        const EDT: i32 = -4 * 3600;

        fn wall(month: u32, day: u32, hour: u32) -> NaiveDateTime {
            NaiveDate::from_ymd_opt(2024, month, day)
                .unwrap()
                .and_hms_opt(hour, 0, 0)
                .unwrap()
        }

        fn fixed(secs: i32) -> FixedOffset {
            FixedOffset::east_opt(secs).unwrap()
        }
    }

    impl TimeZone for Eastern2024 {
        type Offset = FixedOffset;

        fn from_offset(_offset: &FixedOffset) -> Self {
            Eastern2024
        }

        fn offset_from_local_date(&self, local: &NaiveDate) -> LocalResult<FixedOffset> {
            self.offset_from_local_datetime(&local.and_hms_opt(0, 0, 0).unwrap())
        }

        fn offset_from_local_datetime(&self, local: &NaiveDateTime) -> LocalResult<FixedOffset> {
            let (gap_start, gap_end) = (Self::wall(3, 10, 2), Self::wall(3, 10, 3));
            let (fold_start, fold_end) = (Self::wall(11, 3, 1), Self::wall(11, 3, 2));

            if *local >= gap_start && *local < gap_end {
                LocalResult::None
            } else if *local >= fold_start && *local < fold_end {
                LocalResult::Ambiguous(Self::fixed(Self::EDT), Self::fixed(Self::EST))
            } else if *local >= gap_end && *local < fold_start {
                LocalResult::Single(Self::fixed(Self::EDT))
            } else {
                LocalResult::Single(Self::fixed(Self::EST))
            }
        }

        fn offset_from_utc_date(&self, utc: &NaiveDate) -> FixedOffset {
            self.offset_from_utc_datetime(&utc.and_hms_opt(0, 0, 0).unwrap())
        }

        fn offset_from_utc_datetime(&self, utc: &NaiveDateTime) -> FixedOffset {
            if *utc >= Self::wall(3, 10, 7) && *utc < Self::wall(11, 3, 6) {
                Self::fixed(Self::EDT)
            } else {
                Self::fixed(Self::EST)
            }
        }
    }

    fn eastern(month: u32, day: u32, hour: u32, minute: u32) -> DateTime<Eastern2024> {
        Eastern2024
            .with_ymd_and_hms(2024, month, day, hour, minute, 0)
            .single()
            .unwrap()
    }

    #[test]
    fn test_day_across_dst_follows_wall_clock() {
        let ttl = Some(Ttl::Interval(DateInterval::days(1)));

        assert_eq!(resolve_ttl_at(ttl, 0, &eastern(3, 9, 12, 0)).unwrap(), 23 * 3600);
        assert_eq!(resolve_ttl_at(ttl, 0, &eastern(11, 2, 12, 0)).unwrap(), 25 * 3600);
    }

    #[test]
    fn test_day_landing_in_repeated_hour() {
        // Nov 3 01:30 happens twice; the earlier one is used
        let ttl = Some(Ttl::Interval(DateInterval::days(1)));
        assert_eq!(resolve_ttl_at(ttl, 0, &eastern(11, 2, 1, 30)).unwrap(), 86_400);
    }

    #[test]
    fn test_day_landing_in_skipped_hour() {
        // Mar 10 02:30 never happens on the wall clock
        let ttl = Some(Ttl::Interval(DateInterval::days(1)));
        assert_eq!(resolve_ttl_at(ttl, 0, &eastern(3, 9, 2, 30)).unwrap(), 86_400);
    }

    #[test]
    fn test_hours_ignore_dst() {
        let ttl = Some(Ttl::Interval(DateInterval::hours(4)));

        for reference in [eastern(3, 10, 0, 30), eastern(11, 3, 0, 30)] {
            assert_eq!(resolve_ttl_at(ttl, 0, &reference).unwrap(), 14_400);
        }
    }

    #[test]
    fn test_std_duration_conversion() {
        let ttl: Ttl = std::time::Duration::from_millis(90_500).into();
        assert_eq!(ttl, Ttl::Seconds(90));
    }
}
