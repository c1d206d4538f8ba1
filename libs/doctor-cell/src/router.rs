use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};

use crate::handlers;
use crate::services::DoctorService;

pub fn doctor_routes(service: Arc<DoctorService>) -> Router {
    Router::new()
        .route("/", post(handlers::create_doctor).get(handlers::list_doctors))
        .route("/{doctor_id}/activate", post(handlers::activate_doctor))
        .route("/{doctor_id}/deactivate", post(handlers::deactivate_doctor))
        .with_state(service)
}
