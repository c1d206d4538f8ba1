use std::sync::Arc;

use serde_json::json;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use doctor_queue_cell::DoctorQueue;
use security_cell::{AuditAction, AuditLog, Capability, PermissionGate, ValidationService};
use shared_database::ClinicRepository;
use shared_models::{now_micros, Actor, AssignmentType, Patient, Role};

use crate::models::{CreatePatientRequest, Intake, PatientError, UpdatePatientRequest};

pub struct PatientService {
    repository: Arc<dyn ClinicRepository>,
    queue: Arc<DoctorQueue>,
    audit: AuditLog,
    gate: PermissionGate,
    validation: ValidationService,
}

impl PatientService {
    pub fn new(repository: Arc<dyn ClinicRepository>, queue: Arc<DoctorQueue>, audit: AuditLog) -> Self {
        Self {
            repository,
            queue,
            audit,
            gate: PermissionGate::new(),
            validation: ValidationService::new(),
        }
    }

    /// Registers a patient and gives them a doctor.
    ///
    /// Manual intake writes the assignment with the row. Queue intake saves the
    /// patient unassigned first and then asks the rotation; when that fails the
    /// patient stays unassigned and the error names them so the caller can
    /// retry the assignment alone.
    #[instrument(skip(self, request, actor), fields(actor_id = %actor.id))]
    pub async fn create(&self, request: CreatePatientRequest, actor: &Actor) -> Result<Patient, PatientError> {
        let owner = match request.intake {
            Intake::Manual { doctor_id } => Some(doctor_id),
            Intake::Queue => None,
        };
        self.gate.require(actor, Capability::ViewAllPatients, owner)?;

        let name = self.validation.required_name("name", &request.name)?;
        let phone = self.validation.normalize_phone(&request.phone)?;
        let anamnez = self
            .validation
            .optional_notes("anamnez", request.anamnez.as_deref())?;

        let now = now_micros();
        let mut patient = Patient {
            id: request.id.unwrap_or_else(Uuid::new_v4),
            name,
            phone,
            anamnez,
            assigned_doctor_id: None,
            assignment_type: None,
            assignment_date: None,
            created_at: now,
            deleted_at: None,
        };

        if let Intake::Manual { doctor_id } = request.intake {
            self.ensure_assignable(doctor_id).await?;
            patient.assigned_doctor_id = Some(doctor_id);
            patient.assignment_type = Some(AssignmentType::Manual);
            patient.assignment_date = Some(now);
        }

        let patient = self.repository.insert_patient(&patient).await?;
        info!("Registered patient {}", patient.id);
        self.audit.record(
            actor,
            AuditAction::CreatePatient,
            json!({
                "patient_id": patient.id,
                "name": patient.name,
                "assigned_doctor_id": patient.assigned_doctor_id,
                "assignment_type": patient.assignment_type,
            }),
        );

        if request.intake != Intake::Queue {
            return Ok(patient);
        }

        match self.queue.assign_next(patient.id, actor).await {
            Ok(assignment) => {
                debug!("Patient {} placed with doctor {}", patient.id, assignment.doctor_id);
                Ok(Patient {
                    assigned_doctor_id: Some(assignment.doctor_id),
                    assignment_type: Some(AssignmentType::Queue),
                    assignment_date: Some(assignment.assigned_at),
                    ..patient
                })
            }
            Err(source) => {
                warn!("Patient {} left unassigned: {}", patient.id, source);
                Err(PatientError::QueueAssignment {
                    patient_id: patient.id,
                    source,
                })
            }
        }
    }

    pub async fn get(&self, patient_id: Uuid, actor: &Actor) -> Result<Patient, PatientError> {
        let patient = self.load(patient_id).await?;
        self.gate
            .require(actor, Capability::ViewAllPatients, patient.assigned_doctor_id)?;
        Ok(patient)
    }

    /// Edits name, phone and anamnez. Assignment is not editable here.
    #[instrument(skip(self, request, actor), fields(actor_id = %actor.id))]
    pub async fn update(
        &self,
        patient_id: Uuid,
        request: UpdatePatientRequest,
        actor: &Actor,
    ) -> Result<Patient, PatientError> {
        let current = self.load(patient_id).await?;
        self.gate
            .require(actor, Capability::ViewAllPatients, current.assigned_doctor_id)?;

        let mut next = current.clone();
        if let Some(name) = request.name.as_deref() {
            next.name = self.validation.required_name("name", name)?;
        }
        if let Some(phone) = request.phone.as_deref() {
            next.phone = self.validation.normalize_phone(phone)?;
        }
        if let Some(anamnez) = request.anamnez.as_deref() {
            next.anamnez = self.validation.optional_notes("anamnez", Some(anamnez))?;
        }

        if next == current {
            debug!("Patient {} unchanged", patient_id);
            return Ok(current);
        }

        let updated = self.repository.update_patient(&next).await?;
        self.audit.record(
            actor,
            AuditAction::UpdatePatient,
            json!({
                "patient_id": patient_id,
                "name": updated.name,
                "phone": updated.phone,
                "previous": {
                    "name": current.name,
                    "phone": current.phone,
                },
            }),
        );
        Ok(updated)
    }

    async fn load(&self, patient_id: Uuid) -> Result<Patient, PatientError> {
        self.repository
            .get_patient(patient_id)
            .await?
            .ok_or_else(|| PatientError::NotFound(format!("patient {}", patient_id)))
    }

    async fn ensure_assignable(&self, doctor_id: Uuid) -> Result<(), PatientError> {
        let doctor = self
            .repository
            .get_doctor(doctor_id)
            .await?
            .ok_or_else(|| PatientError::NotFound(format!("doctor {}", doctor_id)))?;
        if doctor.role == Role::Assistant {
            return Err(PatientError::validation("doctor_id", "assistants cannot take patients"));
        }
        if !doctor.active {
            return Err(PatientError::validation("doctor_id", "doctor is not active"));
        }
        Ok(())
    }
}
