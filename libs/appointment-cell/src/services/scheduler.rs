// libs/appointment-cell/src/services/scheduler.rs
use std::sync::Arc;

use chrono::SubsecRound;
use serde_json::{json, Value};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use security_cell::{AuditAction, AuditLog, Capability, PermissionGate, ValidationService};
use shared_database::{repository::appointment_owner, ClinicRepository, StoreError};
use shared_models::{
    now_micros, stamp_after, Actor, Appointment, AppointmentStatus, Role, TimeRange,
};

use crate::error::SchedulingError;
use crate::models::{AppointmentDraft, AppointmentPatch, ConflictCheckResponse};
use crate::services::conflict::ConflictDetectionService;
use crate::services::lifecycle::AppointmentLifecycleService;

/// Appointment CRUD with conflict detection and status transitions.
///
/// Every mutation is authorized by the [`PermissionGate`] first, committed as
/// one repository unit of work, and then recorded in the [`AuditLog`].
pub struct AppointmentScheduler {
    repository: Arc<dyn ClinicRepository>,
    audit: AuditLog,
    gate: PermissionGate,
    validation: ValidationService,
    lifecycle: AppointmentLifecycleService,
    conflicts: ConflictDetectionService,
}

fn audit_details(appointment: &Appointment) -> Value {
    json!({
        "appointment_id": appointment.id,
        "patient_id": appointment.patient_id,
        "doctor_id": appointment.doctor_id,
        "appointment_date": appointment.appointment_date,
        "duration_minutes": appointment.duration_minutes,
        "status": appointment.status,
    })
}

fn validate_duration(duration_minutes: i32) -> Result<(), SchedulingError> {
    if duration_minutes <= 0 {
        return Err(SchedulingError::validation(
            "duration_minutes",
            "must be greater than zero",
        ));
    }
    Ok(())
}

impl AppointmentScheduler {
    pub fn new(repository: Arc<dyn ClinicRepository>, audit: AuditLog) -> Self {
        Self {
            conflicts: ConflictDetectionService::new(repository.clone()),
            repository,
            audit,
            gate: PermissionGate::new(),
            validation: ValidationService::new(),
            lifecycle: AppointmentLifecycleService::new(),
        }
    }

    #[instrument(skip(self, draft, actor), fields(actor_id = %actor.id, patient_id = %draft.patient_id, doctor_id = %draft.doctor_id))]
    pub async fn create(&self, draft: AppointmentDraft, actor: &Actor) -> Result<Appointment, SchedulingError> {
        validate_duration(draft.duration_minutes)?;
        let draft = AppointmentDraft {
            appointment_date: draft.appointment_date.trunc_subsecs(6),
            notes: self.validation.optional_notes("notes", draft.notes.as_deref())?,
            ..draft
        };

        let patient = self
            .repository
            .get_patient(draft.patient_id)
            .await?
            .ok_or_else(|| SchedulingError::NotFound(format!("patient {}", draft.patient_id)))?;

        let doctor = self
            .repository
            .get_doctor(draft.doctor_id)
            .await?
            .ok_or_else(|| SchedulingError::NotFound(format!("doctor {}", draft.doctor_id)))?;
        if !doctor.active {
            return Err(SchedulingError::validation("doctor_id", "doctor is not active"));
        }
        if doctor.role == Role::Assistant {
            return Err(SchedulingError::validation("doctor_id", "assistants cannot hold appointments"));
        }

        let owner = patient.assigned_doctor_id.unwrap_or(draft.doctor_id);
        self.gate.require(actor, Capability::ScheduleAppointments, Some(owner))?;

        if let Some(id) = draft.id {
            if let Some(existing) = self.repository.get_appointment(id).await? {
                return Self::replay(&draft, existing);
            }
        }

        let now = now_micros();
        let appointment = Appointment {
            id: draft.id.unwrap_or_else(Uuid::new_v4),
            patient_id: draft.patient_id,
            doctor_id: draft.doctor_id,
            appointment_date: draft.appointment_date,
            duration_minutes: draft.duration_minutes,
            status: AppointmentStatus::Scheduled,
            notes: draft.notes.clone(),
            created_at: now,
            updated_at: now,
        };

        let stored = match self.repository.insert_appointment(&appointment).await {
            Ok(stored) => stored,
            // A concurrent submission with the same id won the insert.
            Err(StoreError::DuplicateId(id)) => {
                let existing = self
                    .repository
                    .get_appointment(id)
                    .await?
                    .ok_or_else(|| SchedulingError::Conflict(format!("appointment {} already exists", id)))?;
                return Self::replay(&draft, existing);
            }
            Err(StoreError::Conflict(msg)) => {
                warn!("Booking rejected: {}", msg);
                return Err(SchedulingError::Conflict(msg));
            }
            Err(e) => return Err(e.into()),
        };

        info!("Appointment {} booked from {} to {}", stored.id, stored.appointment_date, stored.end_time());
        self.audit.record(actor, AuditAction::CreateAppointment, audit_details(&stored));
        Ok(stored)
    }

    fn replay(draft: &AppointmentDraft, existing: Appointment) -> Result<Appointment, SchedulingError> {
        if draft.matches(&existing) {
            debug!("Create for appointment {} replayed; returning stored record", existing.id);
            Ok(existing)
        } else {
            Err(SchedulingError::Conflict(format!(
                "appointment {} already exists with different details",
                existing.id
            )))
        }
    }

    /// Loads an appointment and authorizes `capability` against its owner.
    async fn load_authorized(
        &self,
        id: Uuid,
        actor: &Actor,
        capability: Capability,
    ) -> Result<Appointment, SchedulingError> {
        let appointment = self
            .repository
            .get_appointment(id)
            .await?
            .ok_or_else(|| SchedulingError::NotFound(format!("appointment {}", id)))?;
        let patient = self.repository.get_patient(appointment.patient_id).await?;
        let owner = appointment_owner(&appointment, patient.as_ref());

        self.gate.require(actor, capability, Some(owner))?;
        Ok(appointment)
    }

    #[instrument(skip(self, patch, actor), fields(actor_id = %actor.id, appointment_id = %id))]
    pub async fn update(
        &self,
        id: Uuid,
        patch: AppointmentPatch,
        actor: &Actor,
    ) -> Result<Appointment, SchedulingError> {
        let current = self.load_authorized(id, actor, Capability::EditAnyAppointment).await?;

        if current.status.is_terminal() && patch.changes_schedule_or_status(&current) {
            warn!("Rejected change to {} appointment {}", current.status, id);
            return Err(SchedulingError::validation(
                "status",
                format!("appointment is {}; only notes can be changed", current.status),
            ));
        }

        let mut updated = current.clone();
        if let Some(status) = patch.status.filter(|s| *s != current.status) {
            self.lifecycle.validate_status_transition(current.status, status)?;
            updated.status = status;
        }
        if let Some(duration) = patch.duration_minutes {
            validate_duration(duration)?;
            updated.duration_minutes = duration;
        }
        if let Some(date) = patch.appointment_date {
            updated.appointment_date = date.trunc_subsecs(6);
        }
        if let Some(notes) = patch.notes.as_deref() {
            updated.notes = self.validation.optional_notes("notes", Some(notes))?;
        }
        updated.updated_at = stamp_after(current.updated_at);

        // The repository re-checks overlap for the new slot with this row excluded.
        let stored = self
            .repository
            .update_appointment(&updated, current.updated_at)
            .await
            .inspect_err(|e| warn!("Update of appointment {} rejected: {}", id, e))?;

        info!("Appointment {} updated", id);
        let mut details = audit_details(&stored);
        details["previous"] = json!({
            "appointment_date": current.appointment_date,
            "duration_minutes": current.duration_minutes,
            "status": current.status,
        });
        self.audit.record(actor, AuditAction::UpdateAppointment, details);
        Ok(stored)
    }

    /// Cancels the appointment, freeing its slot.
    #[instrument(skip(self, actor), fields(actor_id = %actor.id, appointment_id = %id))]
    pub async fn cancel(&self, id: Uuid, actor: &Actor) -> Result<Appointment, SchedulingError> {
        let current = self.load_authorized(id, actor, Capability::EditAnyAppointment).await?;
        self.lifecycle
            .validate_status_transition(current.status, AppointmentStatus::Cancelled)?;

        let mut cancelled = current.clone();
        cancelled.status = AppointmentStatus::Cancelled;
        cancelled.updated_at = stamp_after(current.updated_at);

        let stored = self.repository.update_appointment(&cancelled, current.updated_at).await?;

        info!("Appointment {} cancelled", id);
        self.audit.record(actor, AuditAction::CancelAppointment, audit_details(&stored));
        Ok(stored)
    }

    /// Hard delete. Admin only; everyone else cancels.
    #[instrument(skip(self, actor), fields(actor_id = %actor.id, appointment_id = %id))]
    pub async fn delete(&self, id: Uuid, actor: &Actor) -> Result<(), SchedulingError> {
        self.gate.require(actor, Capability::DeleteAppointment, None)?;

        let appointment = self
            .repository
            .get_appointment(id)
            .await?
            .ok_or_else(|| SchedulingError::NotFound(format!("appointment {}", id)))?;
        self.repository.delete_appointment(id).await?;

        info!("Appointment {} deleted", id);
        self.audit.record(actor, AuditAction::DeleteAppointment, audit_details(&appointment));
        Ok(())
    }

    /// Appointments starting in `range` that `actor` may see, oldest first.
    #[instrument(skip(self, actor), fields(actor_id = %actor.id))]
    pub async fn list_for_actor(
        &self,
        actor: &Actor,
        range: TimeRange,
    ) -> Result<Vec<Appointment>, SchedulingError> {
        let scope = self.gate.visibility_scope(actor)?;
        let appointments = self.repository.list_appointments(range, scope).await?;
        debug!("Listed {} appointments for {:?}", appointments.len(), scope);
        Ok(appointments)
    }

    /// Slot-holding appointments of the doctor that a proposed booking would clash with.
    #[instrument(skip(self, actor), fields(actor_id = %actor.id))]
    pub async fn check_conflicts(
        &self,
        doctor_id: Uuid,
        slot: TimeRange,
        exclude_appointment_id: Option<Uuid>,
        actor: &Actor,
    ) -> Result<ConflictCheckResponse, SchedulingError> {
        if slot.to <= slot.from {
            return Err(SchedulingError::validation("duration_minutes", "must be greater than zero"));
        }
        self.gate.require(actor, Capability::ScheduleAppointments, Some(doctor_id))?;
        self.conflicts.check_conflicts(doctor_id, slot, exclude_appointment_id).await
    }
}
