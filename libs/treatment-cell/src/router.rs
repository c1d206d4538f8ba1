use std::sync::Arc;

use axum::{
    routing::{get, patch, post},
    Router,
};

use crate::handlers;
use crate::services::TreatmentService;

pub fn treatment_routes(service: Arc<TreatmentService>) -> Router {
    Router::new()
        .route("/", post(handlers::create_treatment))
        .route("/lock", post(handlers::lock_treatments))
        .route("/income", get(handlers::income_report))
        .route(
            "/{treatment_id}",
            patch(handlers::update_treatment).delete(handlers::delete_treatment),
        )
        .with_state(service)
}
