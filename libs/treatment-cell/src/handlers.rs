use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use shared_models::{Actor, AppError, Treatment};

use crate::models::{
    CreateTreatmentRequest, IncomeQuery, IncomeReport, LockRequest, LockSummary, UpdateTreatmentRequest,
};
use crate::services::TreatmentService;

#[axum::debug_handler]
pub async fn create_treatment(
    State(service): State<Arc<TreatmentService>>,
    Extension(actor): Extension<Actor>,
    Json(request): Json<CreateTreatmentRequest>,
) -> Result<(StatusCode, Json<Treatment>), AppError> {
    let treatment = service.create(request, &actor).await?;
    Ok((StatusCode::CREATED, Json(treatment)))
}

pub async fn update_treatment(
    State(service): State<Arc<TreatmentService>>,
    Extension(actor): Extension<Actor>,
    Path(treatment_id): Path<Uuid>,
    Json(request): Json<UpdateTreatmentRequest>,
) -> Result<Json<Treatment>, AppError> {
    Ok(Json(service.update(treatment_id, request, &actor).await?))
}

pub async fn delete_treatment(
    State(service): State<Arc<TreatmentService>>,
    Extension(actor): Extension<Actor>,
    Path(treatment_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    service.delete(treatment_id, &actor).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn lock_treatments(
    State(service): State<Arc<TreatmentService>>,
    Extension(actor): Extension<Actor>,
    Json(request): Json<LockRequest>,
) -> Result<Json<LockSummary>, AppError> {
    Ok(Json(service.lock_before(request.cutoff, &actor).await?))
}

pub async fn income_report(
    State(service): State<Arc<TreatmentService>>,
    Extension(actor): Extension<Actor>,
    Query(query): Query<IncomeQuery>,
) -> Result<Json<IncomeReport>, AppError> {
    let range = query.to_range()?;
    Ok(Json(service.income(range, &actor).await?))
}
