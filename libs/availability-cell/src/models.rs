use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use shared_database::DatabaseError;
use shared_models::error::AppError;

use crate::time::{blank_time, DayOfWeek, LocalTime};

pub const DEFAULT_CONSULTATION_FEE: f64 = 500.0;
pub const DEFAULT_SLOT_DURATION_MINUTES: u16 = 30;
pub const DEFAULT_ADVANCE_BOOKING_DAYS: u32 = 30;

// ==============================================================================
// WEEKLY TEMPLATE
// ==============================================================================

/// Working hours for one weekday of the recurring template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeeklyScheduleEntry {
    pub is_available: bool,
    #[serde(with = "blank_time", default)]
    pub start_time: Option<LocalTime>,
    #[serde(with = "blank_time", default)]
    pub end_time: Option<LocalTime>,
    #[serde(with = "blank_time", default)]
    pub break_start_time: Option<LocalTime>,
    #[serde(with = "blank_time", default)]
    pub break_end_time: Option<LocalTime>,
    #[serde(default = "default_slot_duration")]
    pub slot_duration: u16,
}

fn default_slot_duration() -> u16 {
    DEFAULT_SLOT_DURATION_MINUTES
}

impl WeeklyScheduleEntry {
    pub fn working(start: LocalTime, end: LocalTime, slot_duration: u16) -> Self {
        Self {
            is_available: true,
            start_time: Some(start),
            end_time: Some(end),
            break_start_time: None,
            break_end_time: None,
            slot_duration,
        }
    }

    pub fn with_break(mut self, start: LocalTime, end: LocalTime) -> Self {
        self.break_start_time = Some(start);
        self.break_end_time = Some(end);
        self
    }

    pub fn closed() -> Self {
        Self {
            is_available: false,
            start_time: None,
            end_time: None,
            break_start_time: None,
            break_end_time: None,
            slot_duration: DEFAULT_SLOT_DURATION_MINUTES,
        }
    }

    /// Working window, present only for an open day with both bounds set.
    pub fn hours(&self) -> Option<(LocalTime, LocalTime)> {
        match (self.is_available, self.start_time, self.end_time) {
            (true, Some(start), Some(end)) if start < end => Some((start, end)),
            _ => None,
        }
    }

    /// Break window, present only when both bounds are set and ordered.
    pub fn break_window(&self) -> Option<(LocalTime, LocalTime)> {
        match (self.break_start_time, self.break_end_time) {
            (Some(start), Some(end)) if start < end => Some((start, end)),
            _ => None,
        }
    }

    pub fn validate(&self, day: DayOfWeek) -> Result<(), SchedulingError> {
        let invalid = |msg: &str| SchedulingError::InvalidRequest(format!("{}: {}", day, msg));

        if self.slot_duration == 0 {
            return Err(invalid("slot duration must be greater than zero"));
        }
        if !self.is_available {
            return Ok(());
        }

        let (start, end) = match (self.start_time, self.end_time) {
            (Some(start), Some(end)) => (start, end),
            _ => return Err(invalid("start and end time are required on an available day")),
        };
        if start >= end {
            return Err(invalid("start time must be before end time"));
        }

        match (self.break_start_time, self.break_end_time) {
            (None, None) => Ok(()),
            (Some(break_start), Some(break_end)) => {
                if start <= break_start && break_start < break_end && break_end <= end {
                    Ok(())
                } else {
                    Err(invalid("break must lie within working hours and start before it ends"))
                }
            }
            _ => Err(invalid("break needs both a start and an end time")),
        }
    }
}

/// Recurring template, one entry per weekday. Days missing from stored or
/// submitted JSON fall back to the clinic default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeeklySchedule {
    pub monday: WeeklyScheduleEntry,
    pub tuesday: WeeklyScheduleEntry,
    pub wednesday: WeeklyScheduleEntry,
    pub thursday: WeeklyScheduleEntry,
    pub friday: WeeklyScheduleEntry,
    pub saturday: WeeklyScheduleEntry,
    pub sunday: WeeklyScheduleEntry,
}

impl Default for WeeklySchedule {
    /// Mon-Sat 09:00-17:00 with a 13:00-14:00 break, Sunday closed.
    fn default() -> Self {
        let (nine, five) = (hm(9, 0), hm(17, 0));
        let (one, two) = (hm(13, 0), hm(14, 0));
        let workday = WeeklyScheduleEntry::working(nine, five, DEFAULT_SLOT_DURATION_MINUTES)
            .with_break(one, two);

        Self {
            monday: workday.clone(),
            tuesday: workday.clone(),
            wednesday: workday.clone(),
            thursday: workday.clone(),
            friday: workday.clone(),
            saturday: workday,
            sunday: WeeklyScheduleEntry::closed(),
        }
    }
}

const fn hm(hours: u16, minutes: u16) -> LocalTime {
    LocalTime::from_minutes(hours * 60 + minutes)
}

impl WeeklySchedule {
    pub fn entry(&self, day: DayOfWeek) -> &WeeklyScheduleEntry {
        match day {
            DayOfWeek::Monday => &self.monday,
            DayOfWeek::Tuesday => &self.tuesday,
            DayOfWeek::Wednesday => &self.wednesday,
            DayOfWeek::Thursday => &self.thursday,
            DayOfWeek::Friday => &self.friday,
            DayOfWeek::Saturday => &self.saturday,
            DayOfWeek::Sunday => &self.sunday,
        }
    }

    pub fn for_date(&self, date: NaiveDate) -> &WeeklyScheduleEntry {
        self.entry(DayOfWeek::of(date))
    }

    pub fn validate(&self) -> Result<(), SchedulingError> {
        DayOfWeek::ALL
            .iter()
            .try_for_each(|day| self.entry(*day).validate(*day))
    }
}

// ==============================================================================
// SLOTS, OVERRIDES AND THE AGGREGATE
// ==============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSlot {
    pub start_time: LocalTime,
    pub end_time: LocalTime,
    #[serde(default)]
    pub is_booked: bool,
}

impl TimeSlot {
    pub fn new(start_time: LocalTime, end_time: LocalTime) -> Self {
        Self { start_time, end_time, is_booked: false }
    }

    pub fn duration_minutes(&self) -> u16 {
        self.start_time.minutes_until(self.end_time)
    }
}

/// Date-specific exception layered over the weekly template.
///
/// `slots` is only read for an available override, where a non-empty list
/// replaces the generated slots for that day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateOverride {
    pub date: NaiveDate,
    pub is_available: bool,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub slots: Vec<TimeSlot>,
}

impl DateOverride {
    pub fn unavailable(date: NaiveDate, reason: impl Into<String>) -> Self {
        Self { date, is_available: false, reason: reason.into(), slots: Vec::new() }
    }

    pub fn custom_slots(date: NaiveDate, slots: Vec<TimeSlot>, reason: impl Into<String>) -> Self {
        Self { date, is_available: true, reason: reason.into(), slots }
    }
}

/// Per-doctor availability record, the unit read and written by the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsultationAvailability {
    pub doctor_id: String,
    #[serde(default)]
    pub weekly_schedule: WeeklySchedule,
    #[serde(default)]
    pub specific_dates: Vec<DateOverride>,
    #[serde(default = "default_fee")]
    pub consultation_fee: f64,
    #[serde(default)]
    pub emergency_available: bool,
    #[serde(default = "default_advance_booking_limit")]
    pub advance_booking_limit: u32,
}

fn default_fee() -> f64 {
    DEFAULT_CONSULTATION_FEE
}

fn default_advance_booking_limit() -> u32 {
    DEFAULT_ADVANCE_BOOKING_DAYS
}

impl ConsultationAvailability {
    pub fn with_defaults(doctor_id: impl Into<String>) -> Self {
        Self {
            doctor_id: doctor_id.into(),
            weekly_schedule: WeeklySchedule::default(),
            specific_dates: Vec::new(),
            consultation_fee: DEFAULT_CONSULTATION_FEE,
            emergency_available: false,
            advance_booking_limit: DEFAULT_ADVANCE_BOOKING_DAYS,
        }
    }

    pub fn override_for(&self, date: NaiveDate) -> Option<&DateOverride> {
        self.specific_dates.iter().find(|o| o.date == date)
    }

    /// Replaces the override for the same day or appends a new one, keeping
    /// at most one entry per date.
    pub fn upsert_override(&mut self, entry: DateOverride) {
        match self.specific_dates.iter_mut().find(|o| o.date == entry.date) {
            Some(existing) => *existing = entry,
            None => self.specific_dates.push(entry),
        }
        self.specific_dates.sort_by_key(|o| o.date);
    }

    pub fn remove_overrides(&mut self, dates: &[NaiveDate]) -> usize {
        let before = self.specific_dates.len();
        self.specific_dates.retain(|o| !dates.contains(&o.date));
        before - self.specific_dates.len()
    }
}

// ==============================================================================
// BOOKED INTERVALS
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Pending,
    Confirmed,
    Completed,
    Cancelled,
}

impl AppointmentStatus {
    /// Statuses that hold on to their slot.
    pub const BLOCKING: [AppointmentStatus; 2] =
        [AppointmentStatus::Pending, AppointmentStatus::Confirmed];

    pub fn blocks_slot(self) -> bool {
        Self::BLOCKING.contains(&self)
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentStatus::Pending => write!(f, "pending"),
            AppointmentStatus::Confirmed => write!(f, "confirmed"),
            AppointmentStatus::Completed => write!(f, "completed"),
            AppointmentStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Read-only view of an appointment as far as slot availability cares.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookedInterval {
    #[serde(rename = "appointment_date")]
    pub date: NaiveDate,
    pub start_time: LocalTime,
    pub end_time: LocalTime,
    pub status: AppointmentStatus,
}

// ==============================================================================
// REQUEST / RESPONSE DTOs
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateScheduleRequest {
    pub weekly_schedule: WeeklySchedule,
    pub consultation_fee: Option<f64>,
    pub emergency_available: Option<bool>,
    pub advance_booking_limit: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnavailableDatesRequest {
    pub dates: Vec<String>,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoveUnavailableDatesRequest {
    pub dates: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomDayRequest {
    pub date: String,
    pub slots: Vec<TimeSlot>,
    #[serde(default)]
    pub reason: Option<String>,
}

/// Final answer for one date: what a patient may still book, and the fee.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DaySlots {
    pub date: NaiveDate,
    pub slots: Vec<TimeSlot>,
    pub fee: f64,
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Error, Debug)]
pub enum SchedulingError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    InvalidRequest(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl SchedulingError {
    pub fn availability_not_found(doctor_id: &str) -> Self {
        SchedulingError::NotFound(format!("Doctor availability not found for {}", doctor_id))
    }
}

impl From<DatabaseError> for SchedulingError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::UniqueViolation(_) => {
                SchedulingError::Conflict("This time slot is no longer available".to_string())
            }
            other => SchedulingError::Internal(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for SchedulingError {
    fn from(err: serde_json::Error) -> Self {
        SchedulingError::Internal(format!("Malformed stored record: {}", err))
    }
}

impl From<SchedulingError> for AppError {
    fn from(err: SchedulingError) -> Self {
        match err {
            SchedulingError::NotFound(msg) => AppError::NotFound(msg),
            SchedulingError::InvalidRequest(msg) => AppError::BadRequest(msg),
            SchedulingError::Conflict(msg) => AppError::Conflict(msg),
            SchedulingError::Internal(msg) => AppError::Internal(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn t(s: &str) -> LocalTime {
        s.parse().unwrap()
    }

    fn d(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    #[test]
    fn default_record_matches_clinic_template() {
        let record = ConsultationAvailability::with_defaults("doc-1");
        assert_eq!(record.consultation_fee, 500.0);
        assert_eq!(record.advance_booking_limit, 30);
        assert!(!record.emergency_available);

        for day in &DayOfWeek::ALL[..6] {
            let entry = record.weekly_schedule.entry(*day);
            assert_eq!(entry.hours(), Some((t("09:00"), t("17:00"))), "{}", day);
            assert_eq!(entry.break_window(), Some((t("13:00"), t("14:00"))));
            assert_eq!(entry.slot_duration, 30);
        }
        assert!(!record.weekly_schedule.sunday.is_available);
        assert!(record.weekly_schedule.validate().is_ok());
    }

    #[test]
    fn entry_validation_enforces_ordering() {
        let ok = WeeklyScheduleEntry::working(t("09:00"), t("12:00"), 15)
            .with_break(t("10:00"), t("10:30"));
        assert!(ok.validate(DayOfWeek::Monday).is_ok());

        let inverted = WeeklyScheduleEntry::working(t("12:00"), t("09:00"), 15);
        assert_matches!(
            inverted.validate(DayOfWeek::Monday),
            Err(SchedulingError::InvalidRequest(_))
        );

        let break_outside = WeeklyScheduleEntry::working(t("09:00"), t("12:00"), 15)
            .with_break(t("11:30"), t("12:30"));
        assert_matches!(
            break_outside.validate(DayOfWeek::Tuesday),
            Err(SchedulingError::InvalidRequest(_))
        );

        let mut half_break = WeeklyScheduleEntry::working(t("09:00"), t("12:00"), 15);
        half_break.break_start_time = Some(t("10:00"));
        assert_matches!(
            half_break.validate(DayOfWeek::Friday),
            Err(SchedulingError::InvalidRequest(_))
        );

        let zero = WeeklyScheduleEntry::working(t("09:00"), t("12:00"), 0);
        assert_matches!(zero.validate(DayOfWeek::Friday), Err(SchedulingError::InvalidRequest(_)));

        assert!(WeeklyScheduleEntry::closed().validate(DayOfWeek::Sunday).is_ok());
    }

    #[test]
    fn missing_days_default_when_deserializing() {
        let schedule: WeeklySchedule = serde_json::from_str(
            r#"{"monday": {"is_available": true, "start_time": "10:00", "end_time": "12:00",
                "break_start_time": "", "break_end_time": "", "slot_duration": 20}}"#,
        )
        .unwrap();

        assert_eq!(schedule.monday.hours(), Some((t("10:00"), t("12:00"))));
        assert!(schedule.monday.break_window().is_none());
        assert_eq!(schedule.tuesday, WeeklySchedule::default().tuesday);
        assert!(!schedule.sunday.is_available);
    }

    #[test]
    fn overrides_are_unique_per_date() {
        let mut record = ConsultationAvailability::with_defaults("doc-1");
        record.upsert_override(DateOverride::unavailable(d("2026-11-02"), "conference"));
        record.upsert_override(DateOverride::unavailable(d("2026-11-01"), "travel"));
        record.upsert_override(DateOverride::unavailable(d("2026-11-02"), "sick"));

        assert_eq!(record.specific_dates.len(), 2);
        assert_eq!(record.specific_dates[0].date, d("2026-11-01"));
        assert_eq!(record.override_for(d("2026-11-02")).unwrap().reason, "sick");

        assert_eq!(record.remove_overrides(&[d("2026-11-02"), d("2026-12-25")]), 1);
        assert!(record.override_for(d("2026-11-02")).is_none());
    }

    #[test]
    fn only_pending_and_confirmed_block() {
        assert!(AppointmentStatus::Pending.blocks_slot());
        assert!(AppointmentStatus::Confirmed.blocks_slot());
        assert!(!AppointmentStatus::Cancelled.blocks_slot());
        assert!(!AppointmentStatus::Completed.blocks_slot());
    }
}
