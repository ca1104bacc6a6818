//! Conversion from wall-clock instants to dial positions.
//!
//! A dial position ("face time") is the number of minutes since the most
//! recent twelve o'clock, AM or PM, in `0..720`. Conversion always reads the
//! local hour and minute of a timezone-aware instant, so daylight-saving
//! jumps show up as the dial jumping too: one minute after 01:59 on a
//! spring-forward night is 03:00, a face delta of 61.
//!
//! Seconds and sub-second parts are truncated, never rounded up.

use chrono::{DateTime, TimeZone, Timelike};
use chrono_tz::Tz;
use std::fmt;
use tower_common::error::{ClockError, ClockResult};

/// Minutes in one full revolution of the dial.
pub const MINUTES_PER_DIAL: i32 = 720;

/// Dial position in minutes since twelve o'clock, always in `0..720`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct FaceTime(u16);

impl FaceTime {
    /// Twelve o'clock.
    pub const TWELVE: FaceTime = FaceTime(0);

    /// Reduce any minute count onto the dial.
    #[must_use]
    pub fn from_minutes(minutes: i64) -> Self {
        // rem_euclid keeps the result in 0..720, which fits in u16
        Self(minutes.rem_euclid(i64::from(MINUTES_PER_DIAL)) as u16)
    }

    /// Build from a 0–24 hour and a 0–59 minute.
    ///
    /// Hour 24 is treated as hour 0.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::InvalidTimeInput`] for out-of-range fields.
    pub fn from_hour_minute(hour: u32, minute: u32) -> ClockResult<Self> {
        if hour > 24 || minute > 59 {
            return Err(ClockError::InvalidTimeInput(format!(
                "hour {hour} minute {minute} is not a time of day"
            )));
        }
        Ok(Self::from_minutes(i64::from((hour % 12) * 60 + minute)))
    }

    /// Dial position of a timezone-aware instant.
    #[must_use]
    pub fn from_instant<Z: TimeZone>(instant: &DateTime<Z>) -> Self {
        let hour = instant.hour() % 12;
        Self::from_minutes(i64::from(hour * 60 + instant.minute()))
    }

    /// Dial position of a Unix timestamp shown in `tz`.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::InvalidTimeInput`] if the timestamp is outside
    /// the representable range.
    pub fn from_timestamp(seconds: i64, tz: &Tz) -> ClockResult<Self> {
        let instant = DateTime::from_timestamp(seconds, 0).ok_or_else(|| {
            ClockError::InvalidTimeInput(format!("timestamp {seconds} is out of range"))
        })?;
        Ok(Self::from_instant(&instant.with_timezone(tz)))
    }

    /// Parse either an RFC 3339 instant or an integer count of seconds since
    /// the Unix epoch.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::InvalidTimeInput`] for anything else.
    pub fn parse_instant(input: &str, tz: &Tz) -> ClockResult<Self> {
        let input = input.trim();
        if let Ok(seconds) = input.parse::<i64>() {
            return Self::from_timestamp(seconds, tz);
        }
        DateTime::parse_from_rfc3339(input)
            .map(|instant| Self::from_instant(&instant.with_timezone(tz)))
            .map_err(|e| ClockError::InvalidTimeInput(format!("{input:?}: {e}")))
    }

    /// Parse a dial reading such as `"3:45"` or `"12:00"`.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::InvalidTimeInput`] if the text is not `H:MM`.
    pub fn parse_dial(input: &str) -> ClockResult<Self> {
        let invalid = || ClockError::InvalidTimeInput(format!("{input:?} is not a dial reading"));
        let (hour, minute) = input.trim().split_once(':').ok_or_else(invalid)?;
        let hour: u32 = hour.parse().map_err(|_| invalid())?;
        let minute: u32 = minute.parse().map_err(|_| invalid())?;
        Self::from_hour_minute(hour, minute)
    }

    /// Minutes since twelve o'clock.
    #[must_use]
    pub fn minutes(self) -> i32 {
        i32::from(self.0)
    }

    /// Position after moving forward `minutes` (wraps around the dial).
    #[must_use]
    pub fn advance(self, minutes: i32) -> Self {
        Self::from_minutes(i64::from(self.minutes()) + i64::from(minutes))
    }
}

impl fmt::Display for FaceTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hour = match self.0 / 60 {
            0 => 12,
            h => h,
        };
        write!(f, "{}:{:02}", hour, self.0 % 60)
    }
}

/// Dial position for `instant`.
#[must_use]
pub fn to_face_minutes<Z: TimeZone>(instant: &DateTime<Z>) -> FaceTime {
    FaceTime::from_instant(instant)
}

/// Whether `instant` falls within the first second of a minute.
///
/// Ticks from a poller arrive at irregular sub-second offsets; only those in
/// second zero may trigger a fresh conversion.
#[must_use]
pub fn is_on_minute<Z: TimeZone>(instant: &DateTime<Z>) -> bool {
    instant.second() == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use chrono_tz::Australia::Sydney;

    fn sydney(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Tz> {
        Sydney
            .with_ymd_and_hms(y, mo, d, h, mi, s)
            .earliest()
            .unwrap()
    }

    #[test]
    fn test_midnight_and_midday_are_zero() {
        assert_eq!(to_face_minutes(&sydney(2013, 3, 31, 12, 0, 0)).minutes(), 0);
        assert_eq!(to_face_minutes(&sydney(2013, 3, 31, 0, 0, 0)).minutes(), 0);
    }

    #[test]
    fn test_hour_minute_table() {
        for (hour, minute, expected) in [
            (1, 0, 60),
            (2, 0, 120),
            (13, 0, 60),
            (14, 0, 120),
            (11, 0, 660),
            (0, 45, 45),
            (23, 59, 719),
            (11, 59, 719),
        ] {
            let instant = sydney(2013, 3, 31, hour, minute, 0);
            assert_eq!(
                to_face_minutes(&instant).minutes(),
                expected,
                "{hour}:{minute:02}"
            );
        }
    }

    #[test]
    fn test_truncates_seconds() {
        let instant = sydney(2013, 3, 31, 3, 14, 59) + Duration::nanoseconds(999_999_999);
        assert_eq!(to_face_minutes(&instant).minutes(), 194);
    }

    #[test]
    fn test_hour_24_maps_to_minute_only() {
        assert_eq!(FaceTime::from_hour_minute(24, 7).unwrap().minutes(), 7);
        assert!(FaceTime::from_hour_minute(25, 0).is_err());
        assert!(FaceTime::from_hour_minute(3, 60).is_err());
    }

    #[test]
    fn test_is_on_minute() {
        let base = sydney(2013, 3, 31, 0, 0, 0);
        assert!(is_on_minute(&base));
        assert!(is_on_minute(&(base + Duration::microseconds(999_999))));
        assert!(!is_on_minute(&(base + Duration::seconds(1))));
        assert!(!is_on_minute(&(base + Duration::microseconds(59_999_999))));
        assert!(!is_on_minute(&(base + Duration::microseconds(30_008_319))));
    }

    #[test]
    fn test_daylight_saving_ending() {
        // 02:59 AEDT, one minute later is 02:00 AEST
        let before = sydney(2023, 4, 2, 2, 59, 0);
        let after = before + Duration::minutes(1);
        assert_eq!(
            to_face_minutes(&before).minutes() - to_face_minutes(&after).minutes(),
            59
        );
    }

    #[test]
    fn test_daylight_saving_starting() {
        // 01:59 AEST, one minute later is 03:00 AEDT
        let before = sydney(2023, 10, 1, 1, 59, 0);
        let after = before + Duration::minutes(1);
        assert_eq!(
            to_face_minutes(&after).minutes() - to_face_minutes(&before).minutes(),
            61
        );
    }

    #[test]
    fn test_from_timestamp() {
        // 2013-03-31T12:00:00+11:00
        let face = FaceTime::from_timestamp(1_364_691_600, &Sydney).unwrap();
        assert_eq!(face, FaceTime::TWELVE);
        assert!(matches!(
            FaceTime::from_timestamp(i64::MAX, &Sydney),
            Err(ClockError::InvalidTimeInput(_))
        ));
    }

    #[test]
    fn test_parse_instant() {
        let face = FaceTime::parse_instant("2013-03-31T01:30:45+11:00", &Sydney).unwrap();
        assert_eq!(face.minutes(), 90);
        assert_eq!(
            FaceTime::parse_instant("1364691600", &Sydney).unwrap(),
            FaceTime::TWELVE
        );
        assert!(matches!(
            FaceTime::parse_instant("half past three", &Sydney),
            Err(ClockError::InvalidTimeInput(_))
        ));
    }

    #[test]
    fn test_parse_dial_and_display() {
        let face = FaceTime::parse_dial("3:45").unwrap();
        assert_eq!(face.minutes(), 225);
        assert_eq!(face.to_string(), "3:45");
        assert_eq!(FaceTime::parse_dial("12:00").unwrap().to_string(), "12:00");
        assert!(FaceTime::parse_dial("345").is_err());
    }

    #[test]
    fn test_from_minutes_wraps() {
        assert_eq!(FaceTime::from_minutes(-1).minutes(), 719);
        assert_eq!(FaceTime::from_minutes(1440).minutes(), 0);
        assert_eq!(FaceTime::from_minutes(719).advance(1), FaceTime::TWELVE);
    }
}
