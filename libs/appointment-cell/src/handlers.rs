// libs/appointment-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_models::{Actor, AppError, Appointment, TimeRange};

use crate::models::{
    parse_timestamp, AppointmentDraft, AppointmentPatch, AppointmentRangeQuery, ConflictCheckQuery,
    ConflictCheckResponse, CreateAppointmentRequest, UpdateAppointmentRequest,
};
use crate::services::AppointmentScheduler;

// ==============================================================================
// APPOINTMENT HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn create_appointment(
    State(scheduler): State<Arc<AppointmentScheduler>>,
    Extension(actor): Extension<Actor>,
    Json(request): Json<CreateAppointmentRequest>,
) -> Result<(StatusCode, Json<Appointment>), AppError> {
    let draft = AppointmentDraft::try_from(request)?;
    let appointment = scheduler.create(draft, &actor).await?;
    Ok((StatusCode::CREATED, Json(appointment)))
}

pub async fn list_appointments(
    State(scheduler): State<Arc<AppointmentScheduler>>,
    Extension(actor): Extension<Actor>,
    Query(query): Query<AppointmentRangeQuery>,
) -> Result<Json<Value>, AppError> {
    let range = query.to_range()?;
    let appointments = scheduler.list_for_actor(&actor, range).await?;

    Ok(Json(json!({
        "appointments": appointments,
        "total": appointments.len(),
    })))
}

pub async fn check_conflicts(
    State(scheduler): State<Arc<AppointmentScheduler>>,
    Extension(actor): Extension<Actor>,
    Query(query): Query<ConflictCheckQuery>,
) -> Result<Json<ConflictCheckResponse>, AppError> {
    let start = parse_timestamp("appointment_date", &query.appointment_date)?;
    let slot = TimeRange::starting_at(start, query.duration_minutes);
    let response = scheduler
        .check_conflicts(query.doctor_id, slot, query.exclude_appointment_id, &actor)
        .await?;
    Ok(Json(response))
}

pub async fn update_appointment(
    State(scheduler): State<Arc<AppointmentScheduler>>,
    Extension(actor): Extension<Actor>,
    Path(appointment_id): Path<Uuid>,
    Json(request): Json<UpdateAppointmentRequest>,
) -> Result<Json<Appointment>, AppError> {
    let patch = AppointmentPatch::try_from(request)?;
    let appointment = scheduler.update(appointment_id, patch, &actor).await?;
    Ok(Json(appointment))
}

pub async fn cancel_appointment(
    State(scheduler): State<Arc<AppointmentScheduler>>,
    Extension(actor): Extension<Actor>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Appointment>, AppError> {
    let appointment = scheduler.cancel(appointment_id, &actor).await?;
    Ok(Json(appointment))
}

pub async fn delete_appointment(
    State(scheduler): State<Arc<AppointmentScheduler>>,
    Extension(actor): Extension<Actor>,
    Path(appointment_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    scheduler.delete(appointment_id, &actor).await?;
    Ok(StatusCode::NO_CONTENT)
}
