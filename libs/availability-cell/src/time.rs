//! Wall-clock and calendar primitives used by the slot engine.
//!
//! Doctors enter their hours as timezone-naive `HH:MM` strings. Those are
//! parsed once at the boundary into [`LocalTime`] and every comparison after
//! that works on minutes since midnight.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, Local, NaiveDate, NaiveDateTime, NaiveTime, Timelike, Weekday};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::models::SchedulingError;

const MINUTES_PER_DAY: u16 = 24 * 60;

/// Time of day in the doctor's wall clock, stored as minutes since midnight.
///
/// Values produced by [`LocalTime::plus_minutes`] may run past `24:00`; the
/// slot generator relies on that so its cursor never wraps to the next day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LocalTime(u16);

impl LocalTime {
    pub fn from_hm(hours: u16, minutes: u16) -> Option<Self> {
        if hours < 24 && minutes < 60 {
            Some(Self(hours * 60 + minutes))
        } else {
            None
        }
    }

    pub(crate) const fn from_minutes(minutes: u16) -> Self {
        Self(minutes)
    }

    pub fn from_naive_time(time: NaiveTime) -> Self {
        Self((time.hour() * 60 + time.minute()) as u16)
    }

    pub fn minutes_since_midnight(self) -> u16 {
        self.0
    }

    pub fn plus_minutes(self, minutes: u16) -> Self {
        Self(self.0.saturating_add(minutes))
    }

    pub fn minutes_until(self, later: LocalTime) -> u16 {
        later.0.saturating_sub(self.0)
    }

    pub fn is_within_day(self) -> bool {
        self.0 < MINUTES_PER_DAY
    }
}

impl FromStr for LocalTime {
    type Err = SchedulingError;

    /// Accepts `HH:MM`, and `HH:MM:SS` as returned by Postgres `time` columns.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid =
            || SchedulingError::InvalidRequest(format!("Invalid time '{}', expected HH:MM", s));

        let mut parts = s.trim().split(':');
        let (hours, minutes, seconds) =
            match (parts.next(), parts.next(), parts.next(), parts.next()) {
                (Some(h), Some(m), None, None) => (h, m, None),
                (Some(h), Some(m), Some(sec), None) => (h, m, Some(sec)),
                _ => return Err(invalid()),
            };

        let field = |raw: &str| -> Result<u16, SchedulingError> {
            if raw.len() != 2 || !raw.bytes().all(|b| b.is_ascii_digit()) {
                return Err(invalid());
            }
            raw.parse().map_err(|_| invalid())
        };

        let hours = field(hours)?;
        let minutes = field(minutes)?;
        if let Some(sec) = seconds {
            if field(sec)? >= 60 {
                return Err(invalid());
            }
        }

        Self::from_hm(hours, minutes).ok_or_else(invalid)
    }
}

impl fmt::Display for LocalTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.0 / 60, self.0 % 60)
    }
}

impl Serialize for LocalTime {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for LocalTime {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Serde helpers for optional times where the stored form uses `""` for
/// "not set" (closed days, no break).
pub mod blank_time {
    use super::LocalTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        value: &Option<LocalTime>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(time) => serializer.collect_str(time),
            None => serializer.serialize_str(""),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<LocalTime>, D::Error> {
        let raw: Option<String> = Option::deserialize(deserializer)?;
        match raw.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(s) => s.parse().map(Some).map_err(serde::de::Error::custom),
        }
    }
}

/// Locale-independent day of the week.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DayOfWeek {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

impl DayOfWeek {
    pub const ALL: [DayOfWeek; 7] = [
        DayOfWeek::Monday,
        DayOfWeek::Tuesday,
        DayOfWeek::Wednesday,
        DayOfWeek::Thursday,
        DayOfWeek::Friday,
        DayOfWeek::Saturday,
        DayOfWeek::Sunday,
    ];

    pub fn of(date: NaiveDate) -> Self {
        match date.weekday() {
            Weekday::Mon => DayOfWeek::Monday,
            Weekday::Tue => DayOfWeek::Tuesday,
            Weekday::Wed => DayOfWeek::Wednesday,
            Weekday::Thu => DayOfWeek::Thursday,
            Weekday::Fri => DayOfWeek::Friday,
            Weekday::Sat => DayOfWeek::Saturday,
            Weekday::Sun => DayOfWeek::Sunday,
        }
    }
}

impl fmt::Display for DayOfWeek {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DayOfWeek::Monday => "monday",
            DayOfWeek::Tuesday => "tuesday",
            DayOfWeek::Wednesday => "wednesday",
            DayOfWeek::Thursday => "thursday",
            DayOfWeek::Friday => "friday",
            DayOfWeek::Saturday => "saturday",
            DayOfWeek::Sunday => "sunday",
        };
        f.write_str(name)
    }
}

/// Parses a calendar date from `YYYY-MM-DD` or a full RFC 3339 timestamp, in
/// which case only the date part is kept.
pub fn parse_calendar_date(raw: &str) -> Result<NaiveDate, SchedulingError> {
    let raw = raw.trim();
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Ok(date);
    }
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.date_naive())
        .map_err(|_| {
            SchedulingError::InvalidRequest(format!("Invalid date '{}', expected YYYY-MM-DD", raw))
        })
}

/// Inclusive range of calendar dates, walked without mutating shared state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, SchedulingError> {
        if end < start {
            return Err(SchedulingError::InvalidRequest(format!(
                "End date {} is before start date {}",
                end, start
            )));
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    pub fn days(&self) -> impl Iterator<Item = NaiveDate> {
        let end = self.end;
        self.start.iter_days().take_while(move |date| *date <= end)
    }
}

/// Source of "now" in clinic wall-clock time.
pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;

    fn today(&self) -> NaiveDate {
        self.now().date()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub NaiveDateTime);

impl FixedClock {
    pub fn at(date: NaiveDate, hours: u32, minutes: u32) -> Self {
        let time = NaiveTime::from_hms_opt(hours, minutes, 0).unwrap_or(NaiveTime::MIN);
        Self(date.and_time(time))
    }
}

impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        self.0
    }
}
