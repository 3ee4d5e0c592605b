use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};
use uuid::Uuid;

use availability_cell::time::parse_calendar_date;
use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;

use crate::models::{
    Appointment, AppointmentListResponse, AvailabilityRangeQuery, AvailabilityRangeResponse,
    BookAppointmentRequest, CancelAppointmentRequest, DoctorAppointmentsQuery,
    PatientAppointmentsQuery, SchedulingError, UpdateStatusRequest,
};
use crate::services::BookingService;

#[derive(Clone)]
pub struct AppointmentState {
    pub config: Arc<AppConfig>,
    pub booking: Arc<BookingService>,
}

/// Patients see their own appointments; the doctor and admins see all of theirs.
fn ensure_can_access(user: &User, appointment: &Appointment) -> Result<(), AppError> {
    if user.id == appointment.patient_id || user.can_manage_doctor(&appointment.doctor_id) {
        Ok(())
    } else {
        Err(AppError::Forbidden("Not authorized to access this appointment".to_string()))
    }
}

// ==============================================================================
// PUBLIC HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn get_doctor_availability(
    State(state): State<AppointmentState>,
    Path(doctor_id): Path<String>,
    Query(query): Query<AvailabilityRangeQuery>,
) -> Result<Json<AvailabilityRangeResponse>, AppError> {
    let (start, end) = match (query.start_date, query.end_date) {
        (Some(start), Some(end)) => (parse_calendar_date(&start)?, parse_calendar_date(&end)?),
        _ => {
            return Err(SchedulingError::InvalidRequest(
                "start_date and end_date are required".to_string(),
            )
            .into())
        }
    };

    let available_slots = state
        .booking
        .get_doctor_availability(&doctor_id, start, end)
        .await?;

    Ok(Json(AvailabilityRangeResponse { available_slots }))
}

// ==============================================================================
// PROTECTED HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn book_appointment(
    State(state): State<AppointmentState>,
    Extension(user): Extension<User>,
    Json(request): Json<BookAppointmentRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let patient_id = match request.patient_id.as_deref() {
        Some(requested) if requested != user.id && !user.is_admin() => {
            return Err(AppError::Forbidden(
                "Cannot book appointments for another patient".to_string(),
            ));
        }
        Some(requested) => requested.to_string(),
        None => user.id.clone(),
    };

    let appointment = state.booking.book_appointment(&patient_id, request).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Appointment booked successfully",
            "appointment": appointment,
        })),
    ))
}

#[axum::debug_handler]
pub async fn get_appointment(
    State(state): State<AppointmentState>,
    Path(appointment_id): Path<Uuid>,
    Extension(user): Extension<User>,
) -> Result<Json<Appointment>, AppError> {
    let appointment = state.booking.get_appointment(appointment_id).await?;
    ensure_can_access(&user, &appointment)?;
    Ok(Json(appointment))
}

/// The JSON body is optional so that a bare `DELETE` works.
#[axum::debug_handler]
pub async fn cancel_appointment(
    State(state): State<AppointmentState>,
    Path(appointment_id): Path<Uuid>,
    Extension(user): Extension<User>,
    body: Bytes,
) -> Result<Json<Value>, AppError> {
    let request: CancelAppointmentRequest = if body.is_empty() {
        CancelAppointmentRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| AppError::BadRequest(format!("Invalid cancellation body: {}", e)))?
    };

    let appointment = state.booking.get_appointment(appointment_id).await?;
    ensure_can_access(&user, &appointment)?;

    let cancelled = state
        .booking
        .cancel_appointment(appointment_id, request.reason)
        .await?;

    Ok(Json(json!({
        "message": "Appointment cancelled successfully",
        "appointment": cancelled,
    })))
}

/// Confirms, completes or cancels an appointment. Doctor or admin only.
#[axum::debug_handler]
pub async fn update_appointment_status(
    State(state): State<AppointmentState>,
    Path(appointment_id): Path<Uuid>,
    Extension(user): Extension<User>,
    Json(request): Json<UpdateStatusRequest>,
) -> Result<Json<Value>, AppError> {
    let appointment = state.booking.get_appointment(appointment_id).await?;
    if !user.can_manage_doctor(&appointment.doctor_id) {
        return Err(AppError::Forbidden(
            "Only the doctor can update this appointment's status".to_string(),
        ));
    }

    let updated = state
        .booking
        .update_appointment_status(appointment_id, request.status, request.doctor_notes)
        .await?;

    Ok(Json(json!({
        "message": "Appointment status updated",
        "appointment": updated,
    })))
}

#[axum::debug_handler]
pub async fn get_doctor_appointments(
    State(state): State<AppointmentState>,
    Path(doctor_id): Path<String>,
    Query(query): Query<DoctorAppointmentsQuery>,
    Extension(user): Extension<User>,
) -> Result<Json<AppointmentListResponse>, AppError> {
    if !user.can_manage_doctor(&doctor_id) {
        return Err(AppError::Forbidden(
            "Not authorized to view this doctor's appointments".to_string(),
        ));
    }

    let date = query.date.as_deref().map(parse_calendar_date).transpose()?;
    let appointments = state
        .booking
        .list_doctor_appointments(&doctor_id, date, query.status)
        .await?;

    Ok(Json(AppointmentListResponse { appointments }))
}

#[axum::debug_handler]
pub async fn get_patient_appointments(
    State(state): State<AppointmentState>,
    Path(patient_id): Path<String>,
    Query(query): Query<PatientAppointmentsQuery>,
    Extension(user): Extension<User>,
) -> Result<Json<AppointmentListResponse>, AppError> {
    if user.id != patient_id && !user.is_admin() {
        return Err(AppError::Forbidden(
            "Not authorized to view this patient's appointments".to_string(),
        ));
    }

    let appointments = state
        .booking
        .list_patient_appointments(&patient_id, query.status)
        .await?;

    Ok(Json(AppointmentListResponse { appointments }))
}
