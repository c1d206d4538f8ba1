use std::sync::Arc;

use serde_json::json;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use doctor_queue_cell::DoctorQueue;
use security_cell::{AuditAction, AuditLog, Capability, PermissionGate, ValidationService};
use shared_database::ClinicRepository;
use shared_models::{now_micros, Actor, Doctor, Role};

use crate::models::{CreateDoctorRequest, DoctorError};

/// Staff records and their place in the assignment rotation.
///
/// Doctor rows are never deleted. Deactivation clears the flag and leaves the
/// rotation in one repository call. Activation is two writes (the flag, then
/// the rotation); it is idempotent and is the way to repair a doctor left
/// half-activated.
pub struct DoctorService {
    repository: Arc<dyn ClinicRepository>,
    queue: Arc<DoctorQueue>,
    audit: AuditLog,
    gate: PermissionGate,
    validation: ValidationService,
}

impl DoctorService {
    pub fn new(repository: Arc<dyn ClinicRepository>, queue: Arc<DoctorQueue>, audit: AuditLog) -> Self {
        Self {
            repository,
            queue,
            audit,
            gate: PermissionGate::new(),
            validation: ValidationService::new(),
        }
    }

    /// Create an active staff member. Doctors join the rotation immediately.
    #[instrument(skip(self, request, actor), fields(actor_id = %actor.id))]
    pub async fn create(&self, request: CreateDoctorRequest, actor: &Actor) -> Result<Doctor, DoctorError> {
        self.gate.require(actor, Capability::ManageDoctorQueue, None)?;

        let name = self.validation.required_name("name", &request.name)?;
        let doctor = Doctor {
            id: request.id.unwrap_or_else(Uuid::new_v4),
            name,
            role: request.role,
            active: true,
            created_at: now_micros(),
        };

        let doctor = self.repository.insert_doctor(&doctor).await?;
        info!("Created {} {} ({})", doctor.role, doctor.name, doctor.id);
        self.audit.record(
            actor,
            AuditAction::CreateDoctor,
            json!({ "doctor_id": doctor.id, "name": doctor.name, "role": doctor.role }),
        );

        if doctor.role == Role::Doctor {
            self.queue.enqueue_doctor(doctor.id, actor).await?;
        }
        Ok(doctor)
    }

    /// Staff list for pickers. Any authenticated staff member may read it.
    pub async fn list(&self, active_only: bool) -> Result<Vec<Doctor>, DoctorError> {
        let doctors = self.repository.list_doctors().await?;
        debug!("Loaded {} staff records", doctors.len());
        Ok(doctors
            .into_iter()
            .filter(|d| !active_only || d.active)
            .collect())
    }

    #[instrument(skip(self, actor), fields(actor_id = %actor.id))]
    pub async fn activate(&self, doctor_id: Uuid, actor: &Actor) -> Result<Doctor, DoctorError> {
        self.gate.require(actor, Capability::ManageDoctorQueue, None)?;
        let current = self.load(doctor_id).await?;

        let doctor = if current.active {
            current
        } else {
            self.repository.set_doctor_active(doctor_id, true).await?
        };

        if doctor.role == Role::Doctor {
            self.queue.enqueue_doctor(doctor_id, actor).await?;
        }
        info!("Doctor {} is active", doctor_id);
        Ok(doctor)
    }

    /// Stops new queue assignments for the doctor. Existing patients and
    /// appointments stay with them.
    #[instrument(skip(self, actor), fields(actor_id = %actor.id))]
    pub async fn deactivate(&self, doctor_id: Uuid, actor: &Actor) -> Result<Doctor, DoctorError> {
        self.gate.require(actor, Capability::ManageDoctorQueue, None)?;
        let current = self.load(doctor_id).await?;
        if current.id == actor.id {
            warn!("Actor {} tried to deactivate their own account", actor.id);
            return Err(DoctorError::Validation {
                field: "doctor_id".to_string(),
                message: "you cannot deactivate yourself".to_string(),
            });
        }

        let outcome = self.repository.deactivate_doctor(doctor_id).await?;
        if outcome.dequeued {
            self.audit
                .record(actor, AuditAction::DequeueDoctor, json!({ "doctor_id": doctor_id }));
        }
        info!("Doctor {} is inactive (was active: {})", doctor_id, current.active);
        Ok(outcome.doctor)
    }

    async fn load(&self, doctor_id: Uuid) -> Result<Doctor, DoctorError> {
        self.repository
            .get_doctor(doctor_id)
            .await?
            .ok_or(DoctorError::NotFound(doctor_id))
    }
}
