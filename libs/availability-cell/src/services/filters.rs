use chrono::{NaiveDate, NaiveDateTime};

use crate::models::{BookedInterval, TimeSlot};
use crate::time::LocalTime;

/// How a booked appointment is matched against a candidate slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConflictMatch {
    /// Same start time blocks the slot, whatever the stored duration.
    #[default]
    StartTime,
    /// Both start and end must line up.
    StartAndEnd,
}

impl ConflictMatch {
    pub fn from_config(match_end_time: bool) -> Self {
        if match_end_time {
            ConflictMatch::StartAndEnd
        } else {
            ConflictMatch::StartTime
        }
    }

    fn collides(self, slot: &TimeSlot, booked: &BookedInterval) -> bool {
        match self {
            ConflictMatch::StartTime => slot.start_time == booked.start_time,
            ConflictMatch::StartAndEnd => {
                slot.start_time == booked.start_time && slot.end_time == booked.end_time
            }
        }
    }
}

/// Drops candidates already taken by a blocking appointment on `date`.
/// Intervals for other dates or with a non-blocking status are ignored.
pub fn filter_booked(
    candidates: Vec<TimeSlot>,
    date: NaiveDate,
    booked: &[BookedInterval],
    mode: ConflictMatch,
) -> Vec<TimeSlot> {
    let blocking: Vec<&BookedInterval> = booked
        .iter()
        .filter(|b| b.date == date && b.status.blocks_slot())
        .collect();

    candidates
        .into_iter()
        .filter(|slot| !blocking.iter().any(|b| mode.collides(slot, b)))
        .collect()
}

/// Drops slots that already started. Only `date == today` needs a
/// time-of-day comparison; past dates yield nothing.
pub fn filter_future(
    candidates: Vec<TimeSlot>,
    date: NaiveDate,
    now: NaiveDateTime,
) -> Vec<TimeSlot> {
    let today = now.date();
    if date > today {
        return candidates;
    }
    if date < today {
        return Vec::new();
    }

    let now_minutes = LocalTime::from_naive_time(now.time());
    candidates
        .into_iter()
        .filter(|slot| slot.start_time > now_minutes)
        .collect()
}
