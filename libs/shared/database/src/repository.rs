use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use shared_models::{
    ActivityLogEntry, Appointment, Doctor, DoctorQueueEntry, Patient, TimeRange, Treatment,
};

use crate::error::StoreError;

/// Which appointments a listing may return.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisibilityScope {
    All,
    /// Appointments whose owner (see [`appointment_owner`]) is this doctor.
    OwnPatients(Uuid),
}

/// Outcome of [`ClinicRepository::assign_from_queue`].
#[derive(Debug, Clone, PartialEq)]
pub enum QueueClaim {
    /// The doctor's turn was taken and the patient now carries the assignment.
    Assigned(Patient),
    /// The doctor's `last_assigned_at` moved on, or the doctor left the
    /// rotation. Nothing was written.
    Lost,
}

/// Outcome of [`ClinicRepository::deactivate_doctor`].
#[derive(Debug, Clone, PartialEq)]
pub struct DoctorDeactivation {
    pub doctor: Doctor,
    /// Whether the doctor had a place in the rotation.
    pub dequeued: bool,
}

/// Owner of an appointment for visibility and edit checks: the patient's
/// assigned doctor, or the treating doctor while the patient is unassigned.
pub fn appointment_owner(appointment: &Appointment, patient: Option<&Patient>) -> Uuid {
    patient
        .and_then(|p| p.assigned_doctor_id)
        .unwrap_or(appointment.doctor_id)
}

/// Persistence seam for the clinic core.
///
/// Every method is one atomic unit of work: it either commits completely or
/// leaves no visible effect, and concurrent callers observe them as if they
/// ran one after another. Conflicting writes surface as [`StoreError::Conflict`]
/// or [`StoreError::StaleWrite`], never as silently lost updates.
#[async_trait]
pub trait ClinicRepository: Send + Sync {
    // Doctors
    async fn insert_doctor(&self, doctor: &Doctor) -> Result<Doctor, StoreError>;
    async fn get_doctor(&self, id: Uuid) -> Result<Option<Doctor>, StoreError>;
    async fn list_doctors(&self) -> Result<Vec<Doctor>, StoreError>;
    async fn set_doctor_active(&self, id: Uuid, active: bool) -> Result<Doctor, StoreError>;
    /// Clears `active` and removes the doctor from the rotation in one step,
    /// so an inactive doctor is never left holding a queue position.
    async fn deactivate_doctor(&self, id: Uuid) -> Result<DoctorDeactivation, StoreError>;

    // Patients. Soft-deleted rows are reported as absent.
    async fn insert_patient(&self, patient: &Patient) -> Result<Patient, StoreError>;
    async fn get_patient(&self, id: Uuid) -> Result<Option<Patient>, StoreError>;
    async fn update_patient(&self, patient: &Patient) -> Result<Patient, StoreError>;

    // Appointments
    /// Inserts after checking, in the same transaction, that the patient and
    /// doctor exist and that no slot-holding appointment of the doctor overlaps.
    async fn insert_appointment(&self, appointment: &Appointment) -> Result<Appointment, StoreError>;
    async fn get_appointment(&self, id: Uuid) -> Result<Option<Appointment>, StoreError>;
    /// Replaces the row if its `updated_at` still equals `expected_updated_at`,
    /// re-running the overlap check with the row itself excluded.
    async fn update_appointment(
        &self,
        appointment: &Appointment,
        expected_updated_at: DateTime<Utc>,
    ) -> Result<Appointment, StoreError>;
    async fn delete_appointment(&self, id: Uuid) -> Result<(), StoreError>;
    async fn list_appointments(
        &self,
        range: TimeRange,
        scope: VisibilityScope,
    ) -> Result<Vec<Appointment>, StoreError>;
    async fn find_overlapping(
        &self,
        doctor_id: Uuid,
        range: TimeRange,
        exclude: Option<Uuid>,
    ) -> Result<Vec<Appointment>, StoreError>;

    // Doctor queue
    async fn queue_entries(&self) -> Result<Vec<DoctorQueueEntry>, StoreError>;
    /// Takes the doctor's turn and assigns the patient as one unit of work.
    ///
    /// The turn is a compare-and-swap of `last_assigned_at` against
    /// `expected_last_assigned_at`; losing it yields [`QueueClaim::Lost`]. A
    /// patient that already has a doctor fails with `StaleWrite` and a missing
    /// patient with `NotFound`. In every non-`Assigned` case nothing is written.
    async fn assign_from_queue(
        &self,
        patient_id: Uuid,
        doctor_id: Uuid,
        expected_last_assigned_at: Option<DateTime<Utc>>,
        stamp: DateTime<Utc>,
    ) -> Result<QueueClaim, StoreError>;
    /// Appends the doctor at the back of the rotation. Idempotent.
    async fn enqueue_doctor(
        &self,
        doctor_id: Uuid,
        activated_at: DateTime<Utc>,
    ) -> Result<DoctorQueueEntry, StoreError>;
    /// Removes the doctor and closes the gap in positions. Returns whether an
    /// entry existed.
    async fn dequeue_doctor(&self, doctor_id: Uuid) -> Result<bool, StoreError>;

    // Treatments
    async fn insert_treatment(&self, treatment: &Treatment) -> Result<Treatment, StoreError>;
    async fn get_treatment(&self, id: Uuid) -> Result<Option<Treatment>, StoreError>;
    async fn update_treatment(
        &self,
        treatment: &Treatment,
        expected_updated_at: DateTime<Utc>,
    ) -> Result<Treatment, StoreError>;
    /// Locks every unlocked treatment created before `cutoff`; returns the count.
    async fn lock_treatments_before(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError>;
    /// Non-deleted treatments with `created_at` in `range`, oldest first.
    async fn list_treatments(&self, range: TimeRange) -> Result<Vec<Treatment>, StoreError>;

    // Activity log: append only.
    async fn append_activity(&self, entry: &ActivityLogEntry) -> Result<(), StoreError>;
}
