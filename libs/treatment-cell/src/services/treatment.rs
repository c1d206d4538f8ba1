use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde_json::json;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use security_cell::{AuditAction, AuditLog, Capability, PermissionGate, ValidationService};
use shared_database::ClinicRepository;
use shared_models::{now_micros, stamp_after, Actor, Role, TimeRange, Treatment};

use crate::error::TreatmentError;
use crate::models::{CreateTreatmentRequest, IncomeReport, LockSummary, UpdateTreatmentRequest};

pub struct TreatmentService {
    repository: Arc<dyn ClinicRepository>,
    audit: AuditLog,
    gate: PermissionGate,
    validation: ValidationService,
}

impl TreatmentService {
    pub fn new(repository: Arc<dyn ClinicRepository>, audit: AuditLog) -> Self {
        Self {
            repository,
            audit,
            gate: PermissionGate::new(),
            validation: ValidationService::new(),
        }
    }

    #[instrument(skip(self, request, actor), fields(actor_id = %actor.id))]
    pub async fn create(&self, request: CreateTreatmentRequest, actor: &Actor) -> Result<Treatment, TreatmentError> {
        self.gate
            .require(actor, Capability::EditAnyTreatment, Some(request.doctor_id))?;

        let procedure = self.validation.required_name("procedure", &request.procedure)?;
        let tooth_no = request
            .tooth_no
            .map(|t| self.validation.validate_tooth_number(t))
            .transpose()?;
        let cost = non_negative(request.cost)?;
        let notes = self.validation.optional_notes("notes", request.notes.as_deref())?;

        let doctor = self
            .repository
            .get_doctor(request.doctor_id)
            .await?
            .ok_or_else(|| TreatmentError::NotFound(format!("doctor {}", request.doctor_id)))?;
        if doctor.role == Role::Assistant {
            return Err(TreatmentError::validation("doctor_id", "assistants cannot perform treatments"));
        }

        let now = now_micros();
        let treatment = Treatment {
            id: request.id.unwrap_or_else(Uuid::new_v4),
            patient_id: request.patient_id,
            doctor_id: request.doctor_id,
            tooth_no,
            procedure,
            cost,
            notes,
            locked: false,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };

        let treatment = self.repository.insert_treatment(&treatment).await?;
        info!("Recorded treatment {} for patient {}", treatment.id, treatment.patient_id);
        self.audit.record(
            actor,
            AuditAction::CreateTreatment,
            json!({
                "treatment_id": treatment.id,
                "patient_id": treatment.patient_id,
                "doctor_id": treatment.doctor_id,
                "tooth_no": treatment.tooth_no,
                "procedure": treatment.procedure,
                "cost": treatment.cost,
            }),
        );
        Ok(treatment)
    }

    #[instrument(skip(self, request, actor), fields(actor_id = %actor.id))]
    pub async fn update(
        &self,
        treatment_id: Uuid,
        request: UpdateTreatmentRequest,
        actor: &Actor,
    ) -> Result<Treatment, TreatmentError> {
        let current = self.load_editable(treatment_id, actor).await?;

        let mut next = current.clone();
        if let Some(cost) = request.cost {
            next.cost = non_negative(cost)?;
        }
        if let Some(notes) = request.notes.as_deref() {
            next.notes = self.validation.optional_notes("notes", Some(notes))?;
        }
        if next == current {
            debug!("Treatment {} unchanged", treatment_id);
            return Ok(current);
        }
        next.updated_at = stamp_after(current.updated_at);

        let updated = self
            .repository
            .update_treatment(&next, current.updated_at)
            .await?;
        self.audit.record(
            actor,
            AuditAction::UpdateTreatment,
            json!({
                "treatment_id": treatment_id,
                "cost": updated.cost,
                "notes": updated.notes,
                "previous": { "cost": current.cost, "notes": current.notes },
            }),
        );
        Ok(updated)
    }

    /// Soft delete: the row stays but drops out of reads and reports.
    #[instrument(skip(self, actor), fields(actor_id = %actor.id))]
    pub async fn delete(&self, treatment_id: Uuid, actor: &Actor) -> Result<(), TreatmentError> {
        let current = self.load_editable(treatment_id, actor).await?;

        let stamp = stamp_after(current.updated_at);
        let deleted = Treatment {
            deleted_at: Some(stamp),
            updated_at: stamp,
            ..current.clone()
        };
        self.repository
            .update_treatment(&deleted, current.updated_at)
            .await?;

        info!("Deleted treatment {}", treatment_id);
        self.audit.record(
            actor,
            AuditAction::DeleteTreatment,
            json!({
                "treatment_id": treatment_id,
                "patient_id": current.patient_id,
                "procedure": current.procedure,
                "cost": current.cost,
            }),
        );
        Ok(())
    }

    /// Locks every treatment recorded before `cutoff`.
    #[instrument(skip(self, actor), fields(actor_id = %actor.id))]
    pub async fn lock_before(&self, cutoff: DateTime<Utc>, actor: &Actor) -> Result<LockSummary, TreatmentError> {
        self.gate.require(actor, Capability::ViewFinancialReports, None)?;

        let locked = self.repository.lock_treatments_before(cutoff).await?;
        if locked > 0 {
            info!("Locked {} treatments before {}", locked, cutoff);
            self.audit.record(
                actor,
                AuditAction::LockTreatments,
                json!({ "cutoff": cutoff, "locked": locked }),
            );
        }
        Ok(LockSummary { cutoff, locked })
    }

    pub async fn income(&self, range: TimeRange, actor: &Actor) -> Result<IncomeReport, TreatmentError> {
        self.gate.require(actor, Capability::ViewFinancialReports, None)?;

        let rows = self.repository.list_treatments(range).await?;
        debug!("Income report over {} treatments", rows.len());
        IncomeReport::from_rows(range, rows)
    }

    async fn load_editable(&self, treatment_id: Uuid, actor: &Actor) -> Result<Treatment, TreatmentError> {
        let treatment = self
            .repository
            .get_treatment(treatment_id)
            .await?
            .ok_or_else(|| TreatmentError::NotFound(format!("treatment {}", treatment_id)))?;
        self.gate
            .require(actor, Capability::EditAnyTreatment, Some(treatment.doctor_id))?;
        if treatment.locked {
            return Err(TreatmentError::Locked(treatment_id));
        }
        Ok(treatment)
    }
}

fn non_negative(cost: Decimal) -> Result<Decimal, TreatmentError> {
    if cost < Decimal::ZERO {
        return Err(TreatmentError::validation("cost", "must not be negative"));
    }
    Ok(cost)
}
