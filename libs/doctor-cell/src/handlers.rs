use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_models::{Actor, AppError, Doctor};

use crate::models::{CreateDoctorRequest, DoctorListQuery};
use crate::services::DoctorService;

#[axum::debug_handler]
pub async fn create_doctor(
    State(service): State<Arc<DoctorService>>,
    Extension(actor): Extension<Actor>,
    Json(request): Json<CreateDoctorRequest>,
) -> Result<(StatusCode, Json<Doctor>), AppError> {
    let doctor = service.create(request, &actor).await?;
    Ok((StatusCode::CREATED, Json(doctor)))
}

pub async fn list_doctors(
    State(service): State<Arc<DoctorService>>,
    Query(query): Query<DoctorListQuery>,
) -> Result<Json<Value>, AppError> {
    let doctors = service.list(query.active_only).await?;
    Ok(Json(json!({
        "doctors": doctors,
        "total": doctors.len(),
    })))
}

pub async fn activate_doctor(
    State(service): State<Arc<DoctorService>>,
    Extension(actor): Extension<Actor>,
    Path(doctor_id): Path<Uuid>,
) -> Result<Json<Doctor>, AppError> {
    Ok(Json(service.activate(doctor_id, &actor).await?))
}

pub async fn deactivate_doctor(
    State(service): State<Arc<DoctorService>>,
    Extension(actor): Extension<Actor>,
    Path(doctor_id): Path<Uuid>,
) -> Result<Json<Doctor>, AppError> {
    Ok(Json(service.deactivate(doctor_id, &actor).await?))
}
