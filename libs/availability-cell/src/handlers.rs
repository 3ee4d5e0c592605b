use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    Json,
};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::{json, Value};

use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;
use shared_utils::extractor::require_doctor_access;

use crate::models::{
    CustomDayRequest, RemoveUnavailableDatesRequest, SchedulingError, UnavailableDatesRequest,
    UpdateScheduleRequest,
};
use crate::services::AvailabilityService;
use crate::time::parse_calendar_date;

/// Router state shared by the availability handlers.
#[derive(Clone)]
pub struct AvailabilityState {
    pub config: Arc<AppConfig>,
    pub service: Arc<AvailabilityService>,
}

#[derive(Debug, Deserialize)]
pub struct SlotsQuery {
    pub date: Option<String>,
}

fn parse_dates(raw: &[String]) -> Result<Vec<NaiveDate>, AppError> {
    if raw.is_empty() {
        return Err(AppError::BadRequest("At least one date is required".to_string()));
    }
    raw.iter()
        .map(|d| parse_calendar_date(d).map_err(AppError::from))
        .collect()
}

// ==============================================================================
// PUBLIC HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn get_availability(
    State(state): State<AvailabilityState>,
    Path(doctor_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let availability = state.service.get_or_create_availability(&doctor_id).await?;
    Ok(Json(json!(availability)))
}

#[axum::debug_handler]
pub async fn get_available_slots(
    State(state): State<AvailabilityState>,
    Path(doctor_id): Path<String>,
    Query(query): Query<SlotsQuery>,
) -> Result<Json<Value>, AppError> {
    let raw = query
        .date
        .ok_or_else(|| SchedulingError::InvalidRequest("Date is required".to_string()))?;
    let date = parse_calendar_date(&raw)?;

    let day = state.service.get_slots_for_date(&doctor_id, date).await?;

    Ok(Json(json!({
        "slots": day.slots,
        "fee": day.fee,
    })))
}

// ==============================================================================
// PROTECTED HANDLERS (doctor or admin)
// ==============================================================================

#[axum::debug_handler]
pub async fn update_schedule(
    State(state): State<AvailabilityState>,
    Path(doctor_id): Path<String>,
    Extension(user): Extension<User>,
    Json(request): Json<UpdateScheduleRequest>,
) -> Result<Json<Value>, AppError> {
    require_doctor_access(&user, &doctor_id)?;

    let availability = state.service.update_weekly_schedule(&doctor_id, request).await?;
    Ok(Json(json!(availability)))
}

#[axum::debug_handler]
pub async fn set_unavailable_dates(
    State(state): State<AvailabilityState>,
    Path(doctor_id): Path<String>,
    Extension(user): Extension<User>,
    Json(request): Json<UnavailableDatesRequest>,
) -> Result<Json<Value>, AppError> {
    require_doctor_access(&user, &doctor_id)?;

    let dates = parse_dates(&request.dates)?;
    let reason = request.reason.unwrap_or_default();

    let availability = state
        .service
        .set_unavailable_dates(&doctor_id, &dates, &reason)
        .await?;
    Ok(Json(json!(availability)))
}

#[axum::debug_handler]
pub async fn remove_unavailable_dates(
    State(state): State<AvailabilityState>,
    Path(doctor_id): Path<String>,
    Extension(user): Extension<User>,
    Json(request): Json<RemoveUnavailableDatesRequest>,
) -> Result<Json<Value>, AppError> {
    require_doctor_access(&user, &doctor_id)?;

    let dates = parse_dates(&request.dates)?;
    let availability = state.service.remove_unavailable_dates(&doctor_id, &dates).await?;
    Ok(Json(json!(availability)))
}

#[axum::debug_handler]
pub async fn set_custom_day(
    State(state): State<AvailabilityState>,
    Path(doctor_id): Path<String>,
    Extension(user): Extension<User>,
    Json(request): Json<CustomDayRequest>,
) -> Result<Json<Value>, AppError> {
    require_doctor_access(&user, &doctor_id)?;

    let date = parse_calendar_date(&request.date)?;
    let reason = request.reason.unwrap_or_default();

    let availability = state
        .service
        .set_custom_day(&doctor_id, date, request.slots, &reason)
        .await?;
    Ok(Json(json!(availability)))
}
