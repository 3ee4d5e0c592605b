use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use availability_cell::time::parse_calendar_date;
use availability_cell::{AvailabilityService, DaySlots, LocalTime};

use crate::models::{
    Appointment, AppointmentFilter, AppointmentStatus, BookAppointmentRequest, SchedulingError,
    StatusChange, DEFAULT_CANCELLATION_NOTE,
};
use crate::services::store::AppointmentStore;

/// Books and cancels appointments against the slots the availability
/// service currently offers.
pub struct BookingService {
    store: Arc<dyn AppointmentStore>,
    availability: Arc<AvailabilityService>,
}

impl BookingService {
    pub fn new(store: Arc<dyn AppointmentStore>, availability: Arc<AvailabilityService>) -> Self {
        Self { store, availability }
    }

    /// Bookable slots for every date in the range, days with none omitted.
    pub async fn get_doctor_availability(
        &self,
        doctor_id: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<DaySlots>, SchedulingError> {
        self.availability
            .get_availability_range(doctor_id, start_date, end_date)
            .await
    }

    /// Creates a `pending` appointment for `patient_id`.
    ///
    /// The slot check here is advisory. The store's uniqueness guard decides
    /// a race between two requests for the same slot.
    pub async fn book_appointment(
        &self,
        patient_id: &str,
        request: BookAppointmentRequest,
    ) -> Result<Appointment, SchedulingError> {
        info!(
            "Booking appointment for patient {} with doctor {} on {} at {}",
            patient_id, request.doctor_id, request.appointment_date, request.start_time
        );

        let date = parse_calendar_date(&request.appointment_date)?;
        let start_time: LocalTime = request.start_time.parse()?;
        let end_time = request
            .end_time
            .as_deref()
            .map(str::parse::<LocalTime>)
            .transpose()?;

        let day = self
            .availability
            .get_slots_for_date(&request.doctor_id, date)
            .await?;

        let slot = day
            .slots
            .iter()
            .find(|slot| slot.start_time == start_time)
            .ok_or_else(|| {
                warn!(
                    "Slot {} on {} is not available for doctor {}",
                    start_time, date, request.doctor_id
                );
                SchedulingError::Conflict("This time slot is no longer available".to_string())
            })?;

        if let Some(end_time) = end_time {
            if end_time != slot.end_time {
                return Err(SchedulingError::InvalidRequest(format!(
                    "Slot starting at {} ends at {}, not {}",
                    slot.start_time, slot.end_time, end_time
                )));
            }
        }

        let appointment = Appointment {
            id: Uuid::new_v4(),
            doctor_id: request.doctor_id,
            patient_id: patient_id.to_string(),
            appointment_date: date,
            start_time: slot.start_time,
            end_time: slot.end_time,
            status: AppointmentStatus::Pending,
            fee: day.fee,
            reason_for_visit: request.reason_for_visit,
            symptoms: request.symptoms,
            notes: None,
            doctor_notes: None,
            created_at: Utc::now(),
        };

        let created = self.store.create(appointment).await?;
        info!("Appointment {} booked with doctor {}", created.id, created.doctor_id);
        Ok(created)
    }

    pub async fn get_appointment(
        &self,
        appointment_id: Uuid,
    ) -> Result<Appointment, SchedulingError> {
        self.store
            .find(appointment_id)
            .await?
            .ok_or_else(|| appointment_not_found(appointment_id))
    }

    /// A doctor's appointments, optionally narrowed to one date and status.
    pub async fn list_doctor_appointments(
        &self,
        doctor_id: &str,
        date: Option<NaiveDate>,
        status: Option<AppointmentStatus>,
    ) -> Result<Vec<Appointment>, SchedulingError> {
        self.store
            .list(&AppointmentFilter {
                doctor_id: Some(doctor_id.to_string()),
                date,
                status,
                ..Default::default()
            })
            .await
    }

    pub async fn list_patient_appointments(
        &self,
        patient_id: &str,
        status: Option<AppointmentStatus>,
    ) -> Result<Vec<Appointment>, SchedulingError> {
        self.store
            .list(&AppointmentFilter {
                patient_id: Some(patient_id.to_string()),
                status,
                ..Default::default()
            })
            .await
    }

    /// Moves a live appointment to `status`, e.g. confirming or completing it.
    /// Cancelled and completed appointments are final.
    pub async fn update_appointment_status(
        &self,
        appointment_id: Uuid,
        status: AppointmentStatus,
        doctor_notes: Option<String>,
    ) -> Result<Appointment, SchedulingError> {
        debug!("Updating appointment {} to {}", appointment_id, status);

        let current = self.get_appointment(appointment_id).await?;
        ensure_live(&current)?;

        let mut change = StatusChange::to(status).with_doctor_notes(doctor_notes);
        if status == AppointmentStatus::Cancelled {
            change = change.with_notes(DEFAULT_CANCELLATION_NOTE);
        }

        let updated = self
            .store
            .update_status(appointment_id, change)
            .await?
            .ok_or_else(|| appointment_not_found(appointment_id))?;

        info!("Appointment {} is now {}", appointment_id, updated.status);
        Ok(updated)
    }

    /// Marks the appointment cancelled, which frees its slot.
    pub async fn cancel_appointment(
        &self,
        appointment_id: Uuid,
        reason: Option<String>,
    ) -> Result<Appointment, SchedulingError> {
        debug!("Cancelling appointment {}", appointment_id);

        let current = self.get_appointment(appointment_id).await?;
        ensure_live(&current)?;

        let note = reason
            .filter(|r| !r.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_CANCELLATION_NOTE.to_string());

        let cancelled = self
            .store
            .update_status(
                appointment_id,
                StatusChange::to(AppointmentStatus::Cancelled).with_notes(note),
            )
            .await?
            .ok_or_else(|| appointment_not_found(appointment_id))?;

        info!("Appointment {} cancelled", appointment_id);
        Ok(cancelled)
    }
}

fn appointment_not_found(appointment_id: Uuid) -> SchedulingError {
    SchedulingError::NotFound(format!("Appointment {} not found", appointment_id))
}

fn ensure_live(appointment: &Appointment) -> Result<(), SchedulingError> {
    if appointment.status.blocks_slot() {
        Ok(())
    } else {
        Err(SchedulingError::InvalidRequest(format!(
            "Appointment is already {}",
            appointment.status
        )))
    }
}
