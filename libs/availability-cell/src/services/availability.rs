use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime};
use tracing::{debug, info};

use crate::models::{
    ConsultationAvailability, DateOverride, DaySlots, SchedulingError, TimeSlot,
    UpdateScheduleRequest, DEFAULT_CONSULTATION_FEE,
};
use crate::services::filters::{filter_booked, filter_future, ConflictMatch};
use crate::services::slots::generate_slots;
use crate::services::store::{AvailabilityStore, BookedSlotSource};
use crate::time::{Clock, DateRange};

/// Answers "which slots can a patient still book" and owns the lifecycle of
/// the per-doctor availability record.
///
/// Holds no state of its own beyond its collaborators, so one instance can
/// serve concurrent requests for any doctor.
pub struct AvailabilityService {
    store: Arc<dyn AvailabilityStore>,
    bookings: Arc<dyn BookedSlotSource>,
    clock: Arc<dyn Clock>,
    conflict_match: ConflictMatch,
}

impl AvailabilityService {
    pub fn new(
        store: Arc<dyn AvailabilityStore>,
        bookings: Arc<dyn BookedSlotSource>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            bookings,
            clock,
            conflict_match: ConflictMatch::default(),
        }
    }

    pub fn with_conflict_match(mut self, conflict_match: ConflictMatch) -> Self {
        self.conflict_match = conflict_match;
        self
    }

    pub fn now(&self) -> NaiveDateTime {
        self.clock.now()
    }

    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }

    /// Returns the doctor's record, creating the clinic default on first read.
    pub async fn get_or_create_availability(
        &self,
        doctor_id: &str,
    ) -> Result<ConsultationAvailability, SchedulingError> {
        if let Some(record) = self.store.find_by_doctor(doctor_id).await? {
            return Ok(record);
        }

        info!("No availability for doctor {}, creating default schedule", doctor_id);
        self.store
            .create_if_absent(ConsultationAvailability::with_defaults(doctor_id))
            .await
    }

    /// Returns the doctor's record or `NotFound`. Never defaults.
    pub async fn find_availability(
        &self,
        doctor_id: &str,
    ) -> Result<ConsultationAvailability, SchedulingError> {
        self.store
            .find_by_doctor(doctor_id)
            .await?
            .ok_or_else(|| SchedulingError::availability_not_found(doctor_id))
    }

    /// Replaces the weekly template, creating the record if needed.
    pub async fn update_weekly_schedule(
        &self,
        doctor_id: &str,
        request: UpdateScheduleRequest,
    ) -> Result<ConsultationAvailability, SchedulingError> {
        debug!("Updating weekly schedule for doctor {}", doctor_id);

        request.weekly_schedule.validate()?;
        let fee = request.consultation_fee.unwrap_or(DEFAULT_CONSULTATION_FEE);
        if !fee.is_finite() || fee < 0.0 {
            return Err(SchedulingError::InvalidRequest(
                "Consultation fee must be a non-negative amount".to_string(),
            ));
        }

        let mut record = self
            .store
            .find_by_doctor(doctor_id)
            .await?
            .unwrap_or_else(|| ConsultationAvailability::with_defaults(doctor_id));

        record.weekly_schedule = request.weekly_schedule;
        record.consultation_fee = fee;
        if let Some(emergency) = request.emergency_available {
            record.emergency_available = emergency;
        }
        if let Some(limit) = request.advance_booking_limit {
            record.advance_booking_limit = limit;
        }

        self.store.save(record).await
    }

    /// Blocks out whole days. A date that already has an override is flipped
    /// to unavailable with the new reason rather than duplicated.
    pub async fn set_unavailable_dates(
        &self,
        doctor_id: &str,
        dates: &[NaiveDate],
        reason: &str,
    ) -> Result<ConsultationAvailability, SchedulingError> {
        debug!("Marking {} date(s) unavailable for doctor {}", dates.len(), doctor_id);

        let mut record = self.find_availability(doctor_id).await?;

        for date in dates {
            match record.specific_dates.iter_mut().find(|o| o.date == *date) {
                Some(existing) => {
                    existing.is_available = false;
                    existing.reason = reason.to_string();
                }
                None => record.upsert_override(DateOverride::unavailable(*date, reason)),
            }
        }

        self.store.save(record).await
    }

    pub async fn remove_unavailable_dates(
        &self,
        doctor_id: &str,
        dates: &[NaiveDate],
    ) -> Result<ConsultationAvailability, SchedulingError> {
        let mut record = self.find_availability(doctor_id).await?;

        let removed = record.remove_overrides(dates);
        debug!("Removed {} override(s) for doctor {}", removed, doctor_id);

        self.store.save(record).await
    }

    /// Stores an explicit slot list for one date in place of the generated one.
    pub async fn set_custom_day(
        &self,
        doctor_id: &str,
        date: NaiveDate,
        slots: Vec<TimeSlot>,
        reason: &str,
    ) -> Result<ConsultationAvailability, SchedulingError> {
        ensure_not_past(date, self.today())?;
        let slots = normalize_custom_slots(slots)?;

        let mut record = self.find_availability(doctor_id).await?;
        record.upsert_override(DateOverride::custom_slots(date, slots, reason));

        self.store.save(record).await
    }

    /// Bookable slots for one date plus the consultation fee.
    pub async fn get_slots_for_date(
        &self,
        doctor_id: &str,
        date: NaiveDate,
    ) -> Result<DaySlots, SchedulingError> {
        debug!("Calculating available slots for doctor {} on {}", doctor_id, date);

        let now = self.now();
        ensure_not_past(date, now.date())?;

        let record = self.find_availability(doctor_id).await?;
        let slots = self.available_slots(&record, date, now).await?;
        debug!("Found {} available slots for doctor {} on {}", slots.len(), doctor_id, date);

        Ok(DaySlots {
            date,
            slots,
            fee: record.consultation_fee,
        })
    }

    /// Bookable slots for each date in `[start, end]`. Dates left with no slot
    /// are omitted.
    pub async fn get_availability_range(
        &self,
        doctor_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<DaySlots>, SchedulingError> {
        debug!("Calculating availability for doctor {} from {} to {}", doctor_id, start, end);

        let now = self.now();
        let range = DateRange::new(start, end)?;
        ensure_not_past(range.start(), now.date())?;

        let record = self.find_availability(doctor_id).await?;

        let mut days = Vec::new();
        for date in range.days() {
            let slots = self.available_slots(&record, date, now).await?;
            if !slots.is_empty() {
                days.push(DaySlots {
                    date,
                    slots,
                    fee: record.consultation_fee,
                });
            }
        }

        Ok(days)
    }

    async fn available_slots(
        &self,
        record: &ConsultationAvailability,
        date: NaiveDate,
        now: NaiveDateTime,
    ) -> Result<Vec<TimeSlot>, SchedulingError> {
        let entry = record.weekly_schedule.for_date(date);
        if !entry.is_available {
            return Ok(Vec::new());
        }

        let candidates = match record.override_for(date) {
            Some(day) if !day.is_available => {
                debug!("Doctor {} unavailable on {}: {}", record.doctor_id, date, day.reason);
                return Ok(Vec::new());
            }
            Some(day) if !day.slots.is_empty() => day
                .slots
                .iter()
                .map(|slot| TimeSlot::new(slot.start_time, slot.end_time))
                .collect(),
            _ => generate_slots(entry),
        };

        let candidates = filter_future(candidates, date, now);
        if candidates.is_empty() {
            return Ok(candidates);
        }

        let booked = self.bookings.booked_intervals(&record.doctor_id, date).await?;
        Ok(filter_booked(candidates, date, &booked, self.conflict_match))
    }
}

fn ensure_not_past(date: NaiveDate, today: NaiveDate) -> Result<(), SchedulingError> {
    if date < today {
        debug!("Rejecting request for past date {}", date);
        return Err(SchedulingError::InvalidRequest(
            "Cannot book appointments for past dates".to_string(),
        ));
    }
    Ok(())
}

/// Sorts custom slots and rejects empty, inverted or overlapping entries.
fn normalize_custom_slots(mut slots: Vec<TimeSlot>) -> Result<Vec<TimeSlot>, SchedulingError> {
    if slots.is_empty() {
        return Err(SchedulingError::InvalidRequest(
            "A custom day needs at least one slot".to_string(),
        ));
    }

    slots.sort_by_key(|slot| slot.start_time);
    for slot in &mut slots {
        if slot.start_time >= slot.end_time {
            return Err(SchedulingError::InvalidRequest(format!(
                "Slot {}-{} must start before it ends",
                slot.start_time, slot.end_time
            )));
        }
        slot.is_booked = false;
    }

    if let Some(pair) = slots.windows(2).find(|pair| pair[0].end_time > pair[1].start_time) {
        return Err(SchedulingError::InvalidRequest(format!(
            "Slots {}-{} and {}-{} overlap",
            pair[0].start_time, pair[0].end_time, pair[1].start_time, pair[1].end_time
        )));
    }

    Ok(slots)
}
