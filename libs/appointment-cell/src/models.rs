use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use availability_cell::{BookedInterval, DaySlots, LocalTime};

pub use availability_cell::{AppointmentStatus, SchedulingError};

// ==============================================================================
// CORE APPOINTMENT MODEL
// ==============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub doctor_id: String,
    pub patient_id: String,
    pub appointment_date: NaiveDate,
    pub start_time: LocalTime,
    pub end_time: LocalTime,
    pub status: AppointmentStatus,
    pub fee: f64,
    #[serde(default)]
    pub reason_for_visit: Option<String>,
    #[serde(default)]
    pub symptoms: Vec<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub doctor_notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Appointment {
    pub fn booked_interval(&self) -> BookedInterval {
        BookedInterval {
            date: self.appointment_date,
            start_time: self.start_time,
            end_time: self.end_time,
            status: self.status,
        }
    }

    /// True when `other` would take the same slot while both hold it.
    pub fn occupies_same_slot(&self, other: &Appointment) -> bool {
        self.status.blocks_slot()
            && other.status.blocks_slot()
            && self.doctor_id == other.doctor_id
            && self.appointment_date == other.appointment_date
            && self.start_time == other.start_time
    }
}

/// Selects appointments for a listing. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AppointmentFilter {
    pub doctor_id: Option<String>,
    pub patient_id: Option<String>,
    pub date: Option<NaiveDate>,
    pub status: Option<AppointmentStatus>,
}

impl AppointmentFilter {
    pub fn matches(&self, appointment: &Appointment) -> bool {
        self.doctor_id.as_ref().map_or(true, |id| *id == appointment.doctor_id)
            && self.patient_id.as_ref().map_or(true, |id| *id == appointment.patient_id)
            && self.date.map_or(true, |date| date == appointment.appointment_date)
            && self.status.map_or(true, |status| status == appointment.status)
    }
}

/// A status transition and the notes written alongside it.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusChange {
    pub status: AppointmentStatus,
    pub notes: Option<String>,
    pub doctor_notes: Option<String>,
}

impl StatusChange {
    pub fn to(status: AppointmentStatus) -> Self {
        Self {
            status,
            notes: None,
            doctor_notes: None,
        }
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    pub fn with_doctor_notes(mut self, doctor_notes: Option<String>) -> Self {
        self.doctor_notes = doctor_notes;
        self
    }
}

// ==============================================================================
// REQUEST / RESPONSE DTOs
// ==============================================================================

/// Times and date arrive as strings and are parsed at the service boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookAppointmentRequest {
    pub doctor_id: String,
    /// Only honoured for admins; everyone else books for themselves.
    #[serde(default)]
    pub patient_id: Option<String>,
    pub appointment_date: String,
    pub start_time: String,
    #[serde(default)]
    pub end_time: Option<String>,
    #[serde(default)]
    pub reason_for_visit: Option<String>,
    #[serde(default)]
    pub symptoms: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CancelAppointmentRequest {
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: AppointmentStatus,
    #[serde(default)]
    pub doctor_notes: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DoctorAppointmentsQuery {
    pub date: Option<String>,
    pub status: Option<AppointmentStatus>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PatientAppointmentsQuery {
    pub status: Option<AppointmentStatus>,
}

#[derive(Debug, Serialize)]
pub struct AppointmentListResponse {
    pub appointments: Vec<Appointment>,
}

#[derive(Debug, Deserialize)]
pub struct AvailabilityRangeQuery {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AvailabilityRangeResponse {
    pub available_slots: Vec<DaySlots>,
}

pub const DEFAULT_CANCELLATION_NOTE: &str = "Cancelled by user";
