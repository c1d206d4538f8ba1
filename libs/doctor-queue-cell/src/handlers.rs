use std::sync::Arc;

use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use shared_models::{Actor, AppError, DoctorQueueEntry};

use crate::models::{QueueAssignment, QueueSnapshot};
use crate::services::DoctorQueue;

pub async fn get_queue(State(queue): State<Arc<DoctorQueue>>) -> Result<Json<QueueSnapshot>, AppError> {
    Ok(Json(queue.entries().await?))
}

pub async fn assign_patient(
    State(queue): State<Arc<DoctorQueue>>,
    Extension(actor): Extension<Actor>,
    Path(patient_id): Path<Uuid>,
) -> Result<Json<QueueAssignment>, AppError> {
    let assignment = queue.assign_next(patient_id, &actor).await?;
    Ok(Json(assignment))
}

pub async fn enqueue_doctor(
    State(queue): State<Arc<DoctorQueue>>,
    Extension(actor): Extension<Actor>,
    Path(doctor_id): Path<Uuid>,
) -> Result<(StatusCode, Json<DoctorQueueEntry>), AppError> {
    let entry = queue.enqueue_doctor(doctor_id, &actor).await?;
    Ok((StatusCode::CREATED, Json(entry)))
}

pub async fn dequeue_doctor(
    State(queue): State<Arc<DoctorQueue>>,
    Extension(actor): Extension<Actor>,
    Path(doctor_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    if queue.dequeue_doctor(doctor_id, &actor).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound(format!("doctor {} is not in the rotation", doctor_id)))
    }
}
