use std::sync::Arc;
use axum::{routing::{get, post}, Router};

use crate::handlers::*;
use crate::services::PatientService;

pub fn create_patient_router(service: Arc<PatientService>) -> Router {
    Router::new()
        .route("/", post(create_patient))
        .route("/{id}", get(get_patient).patch(update_patient))
        .with_state(service)
}
