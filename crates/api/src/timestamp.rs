use chrono::{DateTime, Days, NaiveDate, Utc};

/// Slotcast timestamp.
///
/// Internally i64 microseconds from unix epoch. Calendar days come from
/// chrono, see [Day].
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    serde::Serialize,
    serde::Deserialize,
)]
#[serde(transparent)]
pub struct Timestamp(i64);

impl Timestamp {
    /// Construct a new timestamp of "now".
    pub fn now() -> Self {
        std::time::SystemTime::now().into()
    }

    /// Construct a timestamp from i64 microseconds since unix epoch.
    pub fn from_micros(micros: i64) -> Self {
        Self(micros)
    }

    /// Get the i64 microseconds since unix epoch.
    pub fn as_micros(&self) -> i64 {
        self.0
    }

    /// Get the i64 milliseconds since unix epoch.
    pub fn as_millis(&self) -> i64 {
        self.0.div_euclid(1000)
    }
}

impl std::ops::Add<std::time::Duration> for Timestamp {
    type Output = Timestamp;

    fn add(self, rhs: std::time::Duration) -> Self::Output {
        Timestamp(self.0 + rhs.as_micros() as i64)
    }
}

impl std::ops::Sub<std::time::Duration> for Timestamp {
    type Output = Timestamp;

    fn sub(self, rhs: std::time::Duration) -> Self::Output {
        Timestamp(self.0 - rhs.as_micros() as i64)
    }
}

impl From<std::time::SystemTime> for Timestamp {
    fn from(t: std::time::SystemTime) -> Self {
        match t.duration_since(std::time::SystemTime::UNIX_EPOCH) {
            Ok(d) => Self(d.as_micros() as i64),
            Err(e) => Self(-(e.duration().as_micros() as i64)),
        }
    }
}

/// A utc calendar day.
///
/// Displays as `YYYY.M.D` without zero padding, the form used in slot
/// names. Serializes as an ISO 8601 date.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    serde::Serialize,
    serde::Deserialize,
)]
#[serde(transparent)]
pub struct Day(NaiveDate);

impl Day {
    /// The utc day containing "now".
    pub fn today() -> Self {
        Self(Utc::now().date_naive())
    }

    /// Construct a day from a proleptic gregorian calendar date, or None
    /// if the date does not exist.
    pub fn from_ymd(year: i32, month: u32, day: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, day).map(Self)
    }

    /// The calendar date of this day.
    pub fn date(&self) -> NaiveDate {
        self.0
    }

    /// The day `days` calendar days before this one. Saturates at the
    /// earliest representable date.
    pub fn days_before(&self, days: u32) -> Self {
        Self(
            self.0
                .checked_sub_days(Days::new(days as u64))
                .unwrap_or(NaiveDate::MIN),
        )
    }

    /// The day `days` calendar days after this one. Saturates at the
    /// latest representable date.
    pub fn days_after(&self, days: u32) -> Self {
        Self(
            self.0
                .checked_add_days(Days::new(days as u64))
                .unwrap_or(NaiveDate::MAX),
        )
    }
}

impl From<NaiveDate> for Day {
    fn from(date: NaiveDate) -> Self {
        Self(date)
    }
}

impl From<Timestamp> for Day {
    fn from(t: Timestamp) -> Self {
        let date = DateTime::from_timestamp_micros(t.as_micros())
            .map(|dt| dt.date_naive())
            .unwrap_or(if t.as_micros() < 0 {
                NaiveDate::MIN
            } else {
                NaiveDate::MAX
            });
        Self(date)
    }
}

impl std::fmt::Display for Day {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.format("%Y.%-m.%-d"))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> Day {
        Day::from_ymd(y, m, d).unwrap()
    }

    #[test]
    fn timestamps_fall_on_their_utc_day() {
        assert_eq!(day(1970, 1, 1), Day::from(Timestamp::from_micros(0)));
        assert_eq!(day(1969, 12, 31), Day::from(Timestamp::from_micros(-1)));

        let last_micro = 24 * 60 * 60 * 1_000_000 - 1;
        assert_eq!(
            day(1970, 1, 1),
            Day::from(Timestamp::from_micros(last_micro))
        );
        assert_eq!(
            day(1970, 1, 2),
            Day::from(Timestamp::from_micros(last_micro + 1))
        );
    }

    #[test]
    fn impossible_dates_are_rejected() {
        assert!(Day::from_ymd(2023, 2, 29).is_none());
        assert!(Day::from_ymd(2024, 2, 29).is_some());
        assert!(Day::from_ymd(2024, 13, 1).is_none());
    }

    #[test]
    fn day_display_is_unpadded() {
        assert_eq!("2026.1.5", day(2026, 1, 5).to_string());
        assert_eq!("1999.12.31", day(1999, 12, 31).to_string());
    }

    #[test]
    fn day_arithmetic_crosses_months_and_years() {
        let d = day(2025, 1, 1);
        assert_eq!(day(2024, 12, 31), d.days_before(1));
        assert_eq!(day(2024, 11, 22), d.days_before(40));
        assert_eq!(day(2024, 3, 1), day(2024, 2, 29).days_after(1));
        assert_eq!(d, d.days_before(10).days_after(10));
    }

    #[test]
    fn day_serializes_as_iso_date() {
        let enc = serde_json::to_string(&day(2024, 3, 14)).unwrap();
        assert_eq!("\"2024-03-14\"", enc);
        assert_eq!(day(2024, 3, 14), serde_json::from_str(&enc).unwrap());
    }
}
