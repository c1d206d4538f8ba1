use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};

use crate::handlers;
use crate::services::DoctorQueue;

pub fn create_doctor_queue_router(queue: Arc<DoctorQueue>) -> Router {
    Router::new()
        .route("/", get(handlers::get_queue))
        .route("/assign/{patient_id}", post(handlers::assign_patient))
        .route(
            "/doctors/{doctor_id}",
            post(handlers::enqueue_doctor).delete(handlers::dequeue_doctor),
        )
        .with_state(queue)
}
