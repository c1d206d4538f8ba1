use std::sync::Arc;

use axum::{middleware, routing::get, Router};

use appointment_cell::{appointment_routes, AppointmentScheduler};
use doctor_cell::{doctor_routes, DoctorService};
use doctor_queue_cell::{create_doctor_queue_router, DoctorQueue};
use patient_cell::{create_patient_router, PatientService};
use security_cell::services::actor_middleware;
use security_cell::{create_security_router, ActorResolver, AuditLog};
use shared_config::AppConfig;
use shared_database::ClinicRepository;
use shared_utils::extractor::auth_middleware;
use treatment_cell::{treatment_routes, TreatmentService};

pub fn create_router(
    config: Arc<AppConfig>,
    repository: Arc<dyn ClinicRepository>,
    audit: AuditLog,
) -> Router {
    let queue = Arc::new(DoctorQueue::new(
        repository.clone(),
        audit.clone(),
        config.queue_claim_attempts,
    ));
    let scheduler = Arc::new(AppointmentScheduler::new(repository.clone(), audit.clone()));
    let doctors = Arc::new(DoctorService::new(repository.clone(), queue.clone(), audit.clone()));
    let patients = Arc::new(PatientService::new(repository.clone(), queue.clone(), audit.clone()));
    let treatments = Arc::new(TreatmentService::new(repository.clone(), audit));
    let resolver = Arc::new(ActorResolver::new(repository));

    // Every clinic route needs a valid token and a known, active staff member.
    let protected = Router::new()
        .nest("/appointments", appointment_routes(scheduler))
        .nest("/queue", create_doctor_queue_router(queue))
        .nest("/doctors", doctor_routes(doctors))
        .nest("/patients", create_patient_router(patients))
        .nest("/treatments", treatment_routes(treatments))
        .nest("/security", create_security_router())
        .layer(middleware::from_fn_with_state(resolver, actor_middleware))
        .layer(middleware::from_fn_with_state(config, auth_middleware));

    Router::new()
        .route("/", get(|| async { "Clinic operations API is running!" }))
        .merge(protected)
}
