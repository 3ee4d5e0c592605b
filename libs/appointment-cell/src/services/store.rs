use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Method;
use serde_json::json;
use tokio::sync::RwLock;
use tracing::{debug, warn};
use uuid::Uuid;

use availability_cell::{BookedInterval, BookedSlotSource};
use shared_config::AppConfig;
use shared_database::SupabaseClient;

use crate::models::{
    Appointment, AppointmentFilter, AppointmentStatus, SchedulingError, StatusChange,
};

const APPOINTMENTS_TABLE: &str = "/rest/v1/appointments";

/// Write side of the appointment set. Implementations must reject a second
/// blocking appointment for the same doctor, date and start time with
/// `SchedulingError::Conflict`.
#[async_trait]
pub trait AppointmentStore: BookedSlotSource {
    async fn create(&self, appointment: Appointment) -> Result<Appointment, SchedulingError>;

    async fn find(&self, id: Uuid) -> Result<Option<Appointment>, SchedulingError>;

    /// Matching appointments ordered by date, then start time.
    async fn list(&self, filter: &AppointmentFilter) -> Result<Vec<Appointment>, SchedulingError>;

    /// Returns `None` when no appointment has that id.
    async fn update_status(
        &self,
        id: Uuid,
        change: StatusChange,
    ) -> Result<Option<Appointment>, SchedulingError>;
}

fn blocking_status_filter() -> String {
    let statuses: Vec<String> = AppointmentStatus::BLOCKING.iter().map(|s| s.to_string()).collect();
    format!("in.({})", statuses.join(","))
}

// ==============================================================================
// SUPABASE
// ==============================================================================

/// Relies on a partial unique index over
/// `(doctor_id, appointment_date, start_time) WHERE status IN ('pending', 'confirmed')`.
pub struct SupabaseAppointmentStore {
    supabase: Arc<SupabaseClient>,
}

impl SupabaseAppointmentStore {
    pub fn new(config: &AppConfig) -> Self {
        Self::with_client(Arc::new(SupabaseClient::new(config)))
    }

    pub fn with_client(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }
}

#[async_trait]
impl BookedSlotSource for SupabaseAppointmentStore {
    async fn booked_intervals(
        &self,
        doctor_id: &str,
        date: NaiveDate,
    ) -> Result<Vec<BookedInterval>, SchedulingError> {
        let path = format!(
            "{}?doctor_id=eq.{}&appointment_date=eq.{}&status={}\
             &select=appointment_date,start_time,end_time,status",
            APPOINTMENTS_TABLE,
            urlencoding::encode(doctor_id),
            date,
            blocking_status_filter()
        );

        let booked: Vec<BookedInterval> =
            self.supabase.request(Method::GET, &path, None, None).await?;
        debug!("Doctor {} has {} booked interval(s) on {}", doctor_id, booked.len(), date);
        Ok(booked)
    }
}

#[async_trait]
impl AppointmentStore for SupabaseAppointmentStore {
    async fn create(&self, appointment: Appointment) -> Result<Appointment, SchedulingError> {
        let rows: Vec<Appointment> = self
            .supabase
            .request_with_headers(
                Method::POST,
                APPOINTMENTS_TABLE,
                None,
                Some(serde_json::to_value(&appointment)?),
                Some(SupabaseClient::return_representation()),
            )
            .await
            .map_err(|e| {
                warn!("Insert of appointment for doctor {} failed: {}", appointment.doctor_id, e);
                SchedulingError::from(e)
            })?;

        rows.into_iter()
            .next()
            .ok_or_else(|| SchedulingError::Internal("Failed to create appointment".to_string()))
    }

    async fn find(&self, id: Uuid) -> Result<Option<Appointment>, SchedulingError> {
        let path = format!("{}?id=eq.{}&limit=1", APPOINTMENTS_TABLE, id);
        let rows: Vec<Appointment> = self.supabase.request(Method::GET, &path, None, None).await?;
        Ok(rows.into_iter().next())
    }

    async fn list(&self, filter: &AppointmentFilter) -> Result<Vec<Appointment>, SchedulingError> {
        let mut query_parts = Vec::new();
        if let Some(doctor_id) = &filter.doctor_id {
            query_parts.push(format!("doctor_id=eq.{}", urlencoding::encode(doctor_id)));
        }
        if let Some(patient_id) = &filter.patient_id {
            query_parts.push(format!("patient_id=eq.{}", urlencoding::encode(patient_id)));
        }
        if let Some(date) = filter.date {
            query_parts.push(format!("appointment_date=eq.{}", date));
        }
        if let Some(status) = filter.status {
            query_parts.push(format!("status=eq.{}", status));
        }
        query_parts.push("order=appointment_date.asc,start_time.asc".to_string());

        let path = format!("{}?{}", APPOINTMENTS_TABLE, query_parts.join("&"));
        let rows: Vec<Appointment> = self.supabase.request(Method::GET, &path, None, None).await?;
        debug!("Listed {} appointment(s)", rows.len());
        Ok(rows)
    }

    async fn update_status(
        &self,
        id: Uuid,
        change: StatusChange,
    ) -> Result<Option<Appointment>, SchedulingError> {
        let path = format!("{}?id=eq.{}", APPOINTMENTS_TABLE, id);
        let mut body = json!({ "status": change.status });
        if let Some(notes) = change.notes {
            body["notes"] = json!(notes);
        }
        if let Some(doctor_notes) = change.doctor_notes {
            body["doctor_notes"] = json!(doctor_notes);
        }

        let rows: Vec<Appointment> = self
            .supabase
            .request_with_headers(
                Method::PATCH,
                &path,
                None,
                Some(body),
                Some(SupabaseClient::return_representation()),
            )
            .await?;

        Ok(rows.into_iter().next())
    }
}

// ==============================================================================
// IN-MEMORY
// ==============================================================================

#[derive(Default)]
pub struct InMemoryAppointmentStore {
    appointments: RwLock<HashMap<Uuid, Appointment>>,
}

impl InMemoryAppointmentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BookedSlotSource for InMemoryAppointmentStore {
    async fn booked_intervals(
        &self,
        doctor_id: &str,
        date: NaiveDate,
    ) -> Result<Vec<BookedInterval>, SchedulingError> {
        Ok(self
            .appointments
            .read()
            .await
            .values()
            .filter(|a| {
                a.doctor_id == doctor_id && a.appointment_date == date && a.status.blocks_slot()
            })
            .map(Appointment::booked_interval)
            .collect())
    }
}

#[async_trait]
impl AppointmentStore for InMemoryAppointmentStore {
    async fn create(&self, appointment: Appointment) -> Result<Appointment, SchedulingError> {
        // Check and insert under one write lock so concurrent bookings serialize.
        let mut appointments = self.appointments.write().await;
        if appointments.values().any(|existing| existing.occupies_same_slot(&appointment)) {
            return Err(SchedulingError::Conflict(
                "This time slot is no longer available".to_string(),
            ));
        }
        appointments.insert(appointment.id, appointment.clone());
        Ok(appointment)
    }

    async fn find(&self, id: Uuid) -> Result<Option<Appointment>, SchedulingError> {
        Ok(self.appointments.read().await.get(&id).cloned())
    }

    async fn list(&self, filter: &AppointmentFilter) -> Result<Vec<Appointment>, SchedulingError> {
        let mut matching: Vec<Appointment> = self
            .appointments
            .read()
            .await
            .values()
            .filter(|a| filter.matches(a))
            .cloned()
            .collect();
        matching.sort_by_key(|a| (a.appointment_date, a.start_time));
        Ok(matching)
    }

    async fn update_status(
        &self,
        id: Uuid,
        change: StatusChange,
    ) -> Result<Option<Appointment>, SchedulingError> {
        let mut appointments = self.appointments.write().await;
        let Some(appointment) = appointments.get_mut(&id) else {
            return Ok(None);
        };

        appointment.status = change.status;
        if change.notes.is_some() {
            appointment.notes = change.notes;
        }
        if change.doctor_notes.is_some() {
            appointment.doctor_notes = change.doctor_notes;
        }
        Ok(Some(appointment.clone()))
    }
}
