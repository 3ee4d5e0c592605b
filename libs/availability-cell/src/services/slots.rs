use chrono::NaiveDate;

use crate::models::{TimeSlot, WeeklySchedule, WeeklyScheduleEntry};

/// Candidate slots for `date`, using the template entry of that date's weekday.
pub fn generate_slots_for_date(schedule: &WeeklySchedule, date: NaiveDate) -> Vec<TimeSlot> {
    generate_slots(schedule.for_date(date))
}

/// Walks the working window in steps of `slot_duration`.
///
/// A candidate overlapping the break is dropped and the cursor jumps to the
/// end of the break, so the stretch just before a break may stay uncovered.
/// A final candidate that would run past the end of the day is never emitted.
pub fn generate_slots(entry: &WeeklyScheduleEntry) -> Vec<TimeSlot> {
    let Some((start, end)) = entry.hours() else {
        return Vec::new();
    };
    if entry.slot_duration == 0 {
        return Vec::new();
    }

    let break_window = entry.break_window();
    let mut slots = Vec::new();
    let mut cursor = start;

    while cursor < end {
        let candidate_end = cursor.plus_minutes(entry.slot_duration);

        if let Some((break_start, break_end)) = break_window {
            if cursor < break_end && candidate_end > break_start {
                cursor = break_end;
                continue;
            }
        }

        if candidate_end <= end {
            slots.push(TimeSlot::new(cursor, candidate_end));
        }
        cursor = candidate_end;
    }

    slots
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::LocalTime;

    fn t(s: &str) -> LocalTime {
        s.parse().unwrap()
    }

    fn starts(slots: &[TimeSlot]) -> Vec<String> {
        slots.iter().map(|s| s.start_time.to_string()).collect()
    }

    #[test]
    fn default_workday_skips_lunch_break() {
        let entry = WeeklyScheduleEntry::working(t("09:00"), t("17:00"), 30)
            .with_break(t("13:00"), t("14:00"));
        let slots = generate_slots(&entry);

        assert_eq!(slots.len(), 14);
        assert_eq!(slots.first().unwrap().start_time, t("09:00"));
        assert_eq!(slots[7], TimeSlot::new(t("12:30"), t("13:00")));
        assert_eq!(slots[8], TimeSlot::new(t("14:00"), t("14:30")));
        assert_eq!(slots.last().unwrap().end_time, t("17:00"));
    }

    #[test]
    fn slot_straddling_break_start_is_dropped_not_truncated() {
        let entry = WeeklyScheduleEntry::working(t("09:00"), t("17:00"), 45)
            .with_break(t("13:00"), t("14:00"));
        let slots = generate_slots(&entry);

        assert_eq!(
            starts(&slots),
            vec!["09:00", "09:45", "10:30", "11:15", "12:00", "14:00", "14:45", "15:30", "16:15"]
        );
        assert!(slots.iter().all(|s| s.start_time != t("12:45")));
    }

    #[test]
    fn slot_spanning_a_short_break_is_dropped() {
        let entry = WeeklyScheduleEntry::working(t("09:00"), t("11:00"), 60)
            .with_break(t("09:15"), t("09:30"));
        let slots = generate_slots(&entry);

        assert_eq!(slots, vec![TimeSlot::new(t("09:30"), t("10:30"))]);
    }

    #[test]
    fn partial_final_slot_is_not_emitted() {
        let entry = WeeklyScheduleEntry::working(t("09:00"), t("10:40"), 30);
        let slots = generate_slots(&entry);

        assert_eq!(starts(&slots), vec!["09:00", "09:30", "10:00"]);
        assert_eq!(slots.last().unwrap().end_time, t("10:30"));
    }

    #[test]
    fn unavailable_day_yields_nothing() {
        let mut entry = WeeklyScheduleEntry::working(t("09:00"), t("17:00"), 30);
        entry.is_available = false;
        assert!(generate_slots(&entry).is_empty());
        assert!(generate_slots(&WeeklyScheduleEntry::closed()).is_empty());
    }

    #[test]
    fn late_evening_schedule_does_not_wrap() {
        let entry = WeeklyScheduleEntry::working(t("22:00"), t("23:59"), 45);
        let slots = generate_slots(&entry);
        assert_eq!(starts(&slots), vec!["22:00", "22:45"]);
    }

    #[test]
    fn weekday_is_taken_from_the_date() {
        let schedule = WeeklySchedule::default();
        let sunday = NaiveDate::from_ymd_opt(2026, 10, 18).unwrap();
        let monday = NaiveDate::from_ymd_opt(2026, 10, 19).unwrap();

        assert!(generate_slots_for_date(&schedule, sunday).is_empty());
        assert_eq!(generate_slots_for_date(&schedule, monday).len(), 14);
    }
}
