// libs/appointment-cell/src/router.rs
use std::sync::Arc;

use axum::{
    routing::{get, patch, post},
    Router,
};

use crate::handlers;
use crate::services::AppointmentScheduler;

/// Appointment routes. The caller's `Actor` must already be in request
/// extensions, so mount these behind the auth and actor middleware.
pub fn appointment_routes(scheduler: Arc<AppointmentScheduler>) -> Router {
    Router::new()
        .route("/", post(handlers::create_appointment).get(handlers::list_appointments))
        .route("/conflicts", get(handlers::check_conflicts))
        .route(
            "/{appointment_id}",
            patch(handlers::update_appointment).delete(handlers::delete_appointment),
        )
        .route("/{appointment_id}/cancel", post(handlers::cancel_appointment))
        .with_state(scheduler)
}
