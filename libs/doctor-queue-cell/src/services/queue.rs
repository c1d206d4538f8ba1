use std::sync::Arc;

use serde_json::json;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use security_cell::{AuditAction, AuditLog, Capability, PermissionGate};
use shared_database::{ClinicRepository, QueueClaim, StoreError};
use shared_models::{now_micros, stamp_after, Actor, DoctorQueueEntry, Patient, Role};

use crate::error::QueueError;
use crate::models::{QueueAssignment, QueueSnapshot};
use crate::services::rotation::{LeastRecentlyAssigned, RotationPolicy};

/// Rotation of active doctors for patients who did not pick one.
///
/// The rotation lives entirely in the `doctor_queue` rows (position,
/// last_assigned_at, activated_at). Taking a turn and writing the patient's
/// assignment is one repository call guarded by a compare-and-swap on
/// `last_assigned_at`, so concurrent `assign_next` calls on any number of
/// service instances never hand out the same turn twice, and a failed call
/// leaves both the rotation and the patient as they were.
pub struct DoctorQueue {
    repository: Arc<dyn ClinicRepository>,
    audit: AuditLog,
    gate: PermissionGate,
    policy: Arc<dyn RotationPolicy>,
    claim_attempts: u32,
}

impl DoctorQueue {
    pub fn new(repository: Arc<dyn ClinicRepository>, audit: AuditLog, claim_attempts: u32) -> Self {
        Self {
            repository,
            audit,
            gate: PermissionGate::new(),
            policy: Arc::new(LeastRecentlyAssigned),
            claim_attempts: claim_attempts.max(1),
        }
    }

    pub fn with_policy(mut self, policy: Arc<dyn RotationPolicy>) -> Self {
        self.policy = policy;
        self
    }

    /// Rotation in position order plus the doctor who is up next.
    pub async fn entries(&self) -> Result<QueueSnapshot, QueueError> {
        let entries = self.repository.queue_entries().await?;
        let next_doctor_id = self.policy.select(&entries).map(|e| e.doctor_id);
        Ok(QueueSnapshot {
            entries,
            next_doctor_id,
        })
    }

    /// Assigns an unassigned patient to the next doctor in the rotation.
    #[instrument(skip(self, actor), fields(actor_id = %actor.id))]
    pub async fn assign_next(&self, patient_id: Uuid, actor: &Actor) -> Result<QueueAssignment, QueueError> {
        let patient = self
            .repository
            .get_patient(patient_id)
            .await?
            .ok_or_else(|| QueueError::NotFound(format!("patient {}", patient_id)))?;
        if patient.assigned_doctor_id.is_some() {
            return Err(QueueError::validation("patient_id", "patient already has a doctor"));
        }

        let assigned = self.claim_turn(patient_id).await?;
        let (doctor_id, assigned_at) = match (assigned.assigned_doctor_id, assigned.assignment_date) {
            (Some(doctor_id), Some(assigned_at)) => (doctor_id, assigned_at),
            _ => {
                return Err(QueueError::Persistence(format!(
                    "patient {} came back without an assignment",
                    patient_id
                )))
            }
        };

        info!("Patient {} assigned to doctor {} from the queue", patient_id, doctor_id);
        self.audit.record(
            actor,
            AuditAction::AssignPatientFromQueue,
            json!({
                "patient_id": patient_id,
                "patient_name": assigned.name,
                "doctor_id": doctor_id,
                "assigned_at": assigned_at,
            }),
        );

        Ok(QueueAssignment {
            patient_id,
            doctor_id,
            assigned_at,
        })
    }

    /// Picks the next doctor and takes the turn together with the patient,
    /// re-reading the rotation when another writer got there first.
    async fn claim_turn(&self, patient_id: Uuid) -> Result<Patient, QueueError> {
        for attempt in 1..=self.claim_attempts {
            let entries = self.repository.queue_entries().await?;
            let candidate = self.policy.select(&entries).ok_or(QueueError::NoActiveDoctors)?;

            // Strictly later than every stamp in the rotation, so the claimed
            // doctor moves behind everyone else.
            let latest = entries
                .iter()
                .map(DoctorQueueEntry::effective_last_assigned)
                .max()
                .unwrap_or(candidate.activated_at);
            let stamp = stamp_after(latest);

            let claim = self
                .repository
                .assign_from_queue(patient_id, candidate.doctor_id, candidate.last_assigned_at, stamp)
                .await
                .map_err(|e| match e {
                    StoreError::StaleWrite(_) => {
                        debug!("Patient {} was assigned concurrently", patient_id);
                        QueueError::validation("patient_id", "patient already has a doctor")
                    }
                    StoreError::NotFound(_) => QueueError::NotFound(format!("patient {}", patient_id)),
                    other => other.into(),
                })?;

            match claim {
                QueueClaim::Assigned(patient) => {
                    debug!("Claimed turn of doctor {} on attempt {}", candidate.doctor_id, attempt);
                    return Ok(patient);
                }
                QueueClaim::Lost => {
                    debug!("Lost claim race for doctor {} (attempt {})", candidate.doctor_id, attempt);
                }
            }
        }

        warn!("Queue claim contended after {} attempts", self.claim_attempts);
        Err(QueueError::Contended {
            attempts: self.claim_attempts,
        })
    }

    /// Puts a doctor at the back of the rotation. Already queued doctors keep
    /// their place.
    #[instrument(skip(self, actor), fields(actor_id = %actor.id))]
    pub async fn enqueue_doctor(&self, doctor_id: Uuid, actor: &Actor) -> Result<DoctorQueueEntry, QueueError> {
        self.gate.require(actor, Capability::ManageDoctorQueue, None)?;

        let doctor = self
            .repository
            .get_doctor(doctor_id)
            .await?
            .ok_or_else(|| QueueError::NotFound(format!("doctor {}", doctor_id)))?;
        if doctor.role == Role::Assistant {
            return Err(QueueError::validation("doctor_id", "assistants are not part of the rotation"));
        }
        if !doctor.active {
            return Err(QueueError::validation("doctor_id", "doctor is not active"));
        }

        let queued = self.repository.queue_entries().await?;
        if let Some(existing) = queued.into_iter().find(|e| e.doctor_id == doctor_id) {
            debug!("Doctor {} already in the rotation at position {}", doctor_id, existing.position);
            return Ok(existing);
        }

        let entry = self.repository.enqueue_doctor(doctor_id, now_micros()).await?;
        info!("Doctor {} joined the rotation at position {}", doctor_id, entry.position);
        self.audit.record(
            actor,
            AuditAction::EnqueueDoctor,
            json!({ "doctor_id": doctor_id, "doctor_name": doctor.name, "position": entry.position }),
        );
        Ok(entry)
    }

    /// Takes a doctor out of the rotation. Patients already assigned to the
    /// doctor stay assigned. Returns whether the doctor was queued.
    #[instrument(skip(self, actor), fields(actor_id = %actor.id))]
    pub async fn dequeue_doctor(&self, doctor_id: Uuid, actor: &Actor) -> Result<bool, QueueError> {
        self.gate.require(actor, Capability::ManageDoctorQueue, None)?;

        let removed = self.repository.dequeue_doctor(doctor_id).await?;
        if removed {
            info!("Doctor {} left the rotation", doctor_id);
            self.audit
                .record(actor, AuditAction::DequeueDoctor, json!({ "doctor_id": doctor_id }));
        } else {
            debug!("Doctor {} was not in the rotation", doctor_id);
        }
        Ok(removed)
    }
}
