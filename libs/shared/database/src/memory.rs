use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

use shared_models::{
    now_micros, ActivityLogEntry, Appointment, AssignmentType, Doctor, DoctorQueueEntry, Patient,
    TimeRange, Treatment,
};

use crate::error::StoreError;
use crate::repository::{
    appointment_owner, ClinicRepository, DoctorDeactivation, QueueClaim, VisibilityScope,
};

#[derive(Default)]
struct Tables {
    doctors: HashMap<Uuid, Doctor>,
    patients: HashMap<Uuid, Patient>,
    appointments: HashMap<Uuid, Appointment>,
    doctor_queue: Vec<DoctorQueueEntry>,
    treatments: HashMap<Uuid, Treatment>,
    activity: Vec<ActivityLogEntry>,
}

impl Tables {
    fn live_patient(&self, id: Uuid) -> Option<&Patient> {
        self.patients.get(&id).filter(|p| !p.is_deleted())
    }

    fn overlapping(&self, doctor_id: Uuid, range: &TimeRange, exclude: Option<Uuid>) -> Vec<Appointment> {
        let mut found: Vec<Appointment> = self
            .appointments
            .values()
            .filter(|a| a.doctor_id == doctor_id)
            .filter(|a| Some(a.id) != exclude)
            .filter(|a| a.status.occupies_slot())
            .filter(|a| a.slot().overlaps(range))
            .cloned()
            .collect();
        found.sort_by_key(|a| a.appointment_date);
        found
    }

    fn ensure_slot_free(&self, appointment: &Appointment, exclude: Option<Uuid>) -> Result<(), StoreError> {
        if !appointment.status.occupies_slot() {
            return Ok(());
        }
        let clashes = self.overlapping(appointment.doctor_id, &appointment.slot(), exclude);
        match clashes.first() {
            Some(existing) => Err(StoreError::Conflict(format!(
                "doctor {} already has appointment {} from {} to {}",
                appointment.doctor_id,
                existing.id,
                existing.appointment_date,
                existing.end_time()
            ))),
            None => Ok(()),
        }
    }

    fn remove_from_queue(&mut self, doctor_id: Uuid) -> bool {
        let before = self.doctor_queue.len();
        self.doctor_queue.retain(|e| e.doctor_id != doctor_id);
        let removed = self.doctor_queue.len() != before;
        if removed {
            self.renumber_queue();
        }
        removed
    }

    fn renumber_queue(&mut self) {
        self.doctor_queue.sort_by_key(|e| e.position);
        for (index, entry) in self.doctor_queue.iter_mut().enumerate() {
            entry.position = index as i32 + 1;
        }
    }
}

/// Process-local store. A single lock guards all tables and every trait method
/// takes it exactly once without awaiting inside, so each call is serializable
/// and an abandoned call never leaves a partial write.
#[derive(Default)]
pub struct InMemoryClinicStore {
    tables: Mutex<Tables>,
}

impl InMemoryClinicStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the activity log in append order.
    pub async fn activity_log(&self) -> Vec<ActivityLogEntry> {
        self.tables.lock().await.activity.clone()
    }

    /// Marks a patient as soft-deleted.
    pub async fn soft_delete_patient(&self, id: Uuid) -> Result<(), StoreError> {
        let mut tables = self.tables.lock().await;
        let patient = tables
            .patients
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("patient {}", id)))?;
        patient.deleted_at = Some(Utc::now());
        Ok(())
    }
}

#[async_trait]
impl ClinicRepository for InMemoryClinicStore {
    async fn insert_doctor(&self, doctor: &Doctor) -> Result<Doctor, StoreError> {
        let mut tables = self.tables.lock().await;
        if tables.doctors.contains_key(&doctor.id) {
            return Err(StoreError::DuplicateId(doctor.id));
        }
        tables.doctors.insert(doctor.id, doctor.clone());
        Ok(doctor.clone())
    }

    async fn get_doctor(&self, id: Uuid) -> Result<Option<Doctor>, StoreError> {
        Ok(self.tables.lock().await.doctors.get(&id).cloned())
    }

    async fn list_doctors(&self) -> Result<Vec<Doctor>, StoreError> {
        let tables = self.tables.lock().await;
        let mut doctors: Vec<Doctor> = tables.doctors.values().cloned().collect();
        doctors.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(doctors)
    }

    async fn set_doctor_active(&self, id: Uuid, active: bool) -> Result<Doctor, StoreError> {
        let mut tables = self.tables.lock().await;
        let doctor = tables
            .doctors
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("doctor {}", id)))?;
        doctor.active = active;
        Ok(doctor.clone())
    }

    async fn deactivate_doctor(&self, id: Uuid) -> Result<DoctorDeactivation, StoreError> {
        let mut tables = self.tables.lock().await;
        let doctor = tables
            .doctors
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("doctor {}", id)))?;
        doctor.active = false;
        let doctor = doctor.clone();
        let dequeued = tables.remove_from_queue(id);
        Ok(DoctorDeactivation { doctor, dequeued })
    }

    async fn insert_patient(&self, patient: &Patient) -> Result<Patient, StoreError> {
        let mut tables = self.tables.lock().await;
        if tables.patients.contains_key(&patient.id) {
            return Err(StoreError::DuplicateId(patient.id));
        }
        if let Some(doctor_id) = patient.assigned_doctor_id {
            if !tables.doctors.contains_key(&doctor_id) {
                return Err(StoreError::NotFound(format!("doctor {}", doctor_id)));
            }
        }
        tables.patients.insert(patient.id, patient.clone());
        Ok(patient.clone())
    }

    async fn get_patient(&self, id: Uuid) -> Result<Option<Patient>, StoreError> {
        Ok(self.tables.lock().await.live_patient(id).cloned())
    }

    async fn update_patient(&self, patient: &Patient) -> Result<Patient, StoreError> {
        let mut tables = self.tables.lock().await;
        let stored = tables
            .patients
            .get_mut(&patient.id)
            .filter(|p| !p.is_deleted())
            .ok_or_else(|| StoreError::NotFound(format!("patient {}", patient.id)))?;
        stored.name = patient.name.clone();
        stored.phone = patient.phone.clone();
        stored.anamnez = patient.anamnez.clone();
        Ok(stored.clone())
    }

    async fn insert_appointment(&self, appointment: &Appointment) -> Result<Appointment, StoreError> {
        let mut tables = self.tables.lock().await;
        if tables.appointments.contains_key(&appointment.id) {
            return Err(StoreError::DuplicateId(appointment.id));
        }
        if tables.live_patient(appointment.patient_id).is_none() {
            return Err(StoreError::NotFound(format!("patient {}", appointment.patient_id)));
        }
        if !tables.doctors.contains_key(&appointment.doctor_id) {
            return Err(StoreError::NotFound(format!("doctor {}", appointment.doctor_id)));
        }
        tables.ensure_slot_free(appointment, None)?;

        tables.appointments.insert(appointment.id, appointment.clone());
        debug!("Stored appointment {}", appointment.id);
        Ok(appointment.clone())
    }

    async fn get_appointment(&self, id: Uuid) -> Result<Option<Appointment>, StoreError> {
        Ok(self.tables.lock().await.appointments.get(&id).cloned())
    }

    async fn update_appointment(
        &self,
        appointment: &Appointment,
        expected_updated_at: DateTime<Utc>,
    ) -> Result<Appointment, StoreError> {
        let mut tables = self.tables.lock().await;
        let current = tables
            .appointments
            .get(&appointment.id)
            .ok_or_else(|| StoreError::NotFound(format!("appointment {}", appointment.id)))?;
        if current.updated_at != expected_updated_at {
            return Err(StoreError::StaleWrite(format!("appointment {}", appointment.id)));
        }
        tables.ensure_slot_free(appointment, Some(appointment.id))?;

        tables.appointments.insert(appointment.id, appointment.clone());
        Ok(appointment.clone())
    }

    async fn delete_appointment(&self, id: Uuid) -> Result<(), StoreError> {
        let mut tables = self.tables.lock().await;
        tables
            .appointments
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(format!("appointment {}", id)))
    }

    async fn list_appointments(
        &self,
        range: TimeRange,
        scope: VisibilityScope,
    ) -> Result<Vec<Appointment>, StoreError> {
        let tables = self.tables.lock().await;
        let mut listed: Vec<Appointment> = tables
            .appointments
            .values()
            .filter(|a| range.contains(a.appointment_date))
            .filter(|a| match scope {
                VisibilityScope::All => true,
                VisibilityScope::OwnPatients(doctor_id) => {
                    appointment_owner(a, tables.patients.get(&a.patient_id)) == doctor_id
                }
            })
            .cloned()
            .collect();
        listed.sort_by(|a, b| a.appointment_date.cmp(&b.appointment_date).then(a.id.cmp(&b.id)));
        Ok(listed)
    }

    async fn find_overlapping(
        &self,
        doctor_id: Uuid,
        range: TimeRange,
        exclude: Option<Uuid>,
    ) -> Result<Vec<Appointment>, StoreError> {
        Ok(self.tables.lock().await.overlapping(doctor_id, &range, exclude))
    }

    async fn queue_entries(&self) -> Result<Vec<DoctorQueueEntry>, StoreError> {
        let tables = self.tables.lock().await;
        let mut entries = tables.doctor_queue.clone();
        entries.sort_by_key(|e| e.position);
        Ok(entries)
    }

    async fn assign_from_queue(
        &self,
        patient_id: Uuid,
        doctor_id: Uuid,
        expected_last_assigned_at: Option<DateTime<Utc>>,
        stamp: DateTime<Utc>,
    ) -> Result<QueueClaim, StoreError> {
        let mut tables = self.tables.lock().await;
        let patient = tables
            .live_patient(patient_id)
            .ok_or_else(|| StoreError::NotFound(format!("patient {}", patient_id)))?;
        if patient.assigned_doctor_id.is_some() {
            return Err(StoreError::StaleWrite(format!(
                "patient {} was assigned concurrently",
                patient_id
            )));
        }

        // All checks pass before anything is written.
        let Some(entry) = tables
            .doctor_queue
            .iter_mut()
            .find(|e| e.doctor_id == doctor_id && e.last_assigned_at == expected_last_assigned_at)
        else {
            return Ok(QueueClaim::Lost);
        };
        entry.last_assigned_at = Some(stamp);

        let patient = tables
            .patients
            .get_mut(&patient_id)
            .ok_or_else(|| StoreError::NotFound(format!("patient {}", patient_id)))?;
        patient.assigned_doctor_id = Some(doctor_id);
        patient.assignment_type = Some(AssignmentType::Queue);
        patient.assignment_date = Some(stamp);
        Ok(QueueClaim::Assigned(patient.clone()))
    }

    async fn enqueue_doctor(
        &self,
        doctor_id: Uuid,
        activated_at: DateTime<Utc>,
    ) -> Result<DoctorQueueEntry, StoreError> {
        let mut tables = self.tables.lock().await;
        if !tables.doctors.contains_key(&doctor_id) {
            return Err(StoreError::NotFound(format!("doctor {}", doctor_id)));
        }
        if let Some(existing) = tables.doctor_queue.iter().find(|e| e.doctor_id == doctor_id) {
            return Ok(existing.clone());
        }
        let position = tables.doctor_queue.iter().map(|e| e.position).max().unwrap_or(0) + 1;
        let entry = DoctorQueueEntry {
            doctor_id,
            position,
            last_assigned_at: None,
            activated_at,
        };
        tables.doctor_queue.push(entry.clone());
        Ok(entry)
    }

    async fn dequeue_doctor(&self, doctor_id: Uuid) -> Result<bool, StoreError> {
        Ok(self.tables.lock().await.remove_from_queue(doctor_id))
    }

    async fn insert_treatment(&self, treatment: &Treatment) -> Result<Treatment, StoreError> {
        let mut tables = self.tables.lock().await;
        if tables.treatments.contains_key(&treatment.id) {
            return Err(StoreError::DuplicateId(treatment.id));
        }
        if tables.live_patient(treatment.patient_id).is_none() {
            return Err(StoreError::NotFound(format!("patient {}", treatment.patient_id)));
        }
        if !tables.doctors.contains_key(&treatment.doctor_id) {
            return Err(StoreError::NotFound(format!("doctor {}", treatment.doctor_id)));
        }
        tables.treatments.insert(treatment.id, treatment.clone());
        Ok(treatment.clone())
    }

    async fn get_treatment(&self, id: Uuid) -> Result<Option<Treatment>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables.treatments.get(&id).filter(|t| t.deleted_at.is_none()).cloned())
    }

    async fn update_treatment(
        &self,
        treatment: &Treatment,
        expected_updated_at: DateTime<Utc>,
    ) -> Result<Treatment, StoreError> {
        let mut tables = self.tables.lock().await;
        let current = tables
            .treatments
            .get(&treatment.id)
            .filter(|t| t.deleted_at.is_none())
            .ok_or_else(|| StoreError::NotFound(format!("treatment {}", treatment.id)))?;
        if current.updated_at != expected_updated_at {
            return Err(StoreError::StaleWrite(format!("treatment {}", treatment.id)));
        }
        tables.treatments.insert(treatment.id, treatment.clone());
        Ok(treatment.clone())
    }

    async fn lock_treatments_before(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError> {
        let mut tables = self.tables.lock().await;
        let now = now_micros();
        let mut locked = 0;
        for treatment in tables.treatments.values_mut() {
            if !treatment.locked && treatment.created_at < cutoff {
                treatment.locked = true;
                treatment.updated_at = now;
                locked += 1;
            }
        }
        Ok(locked)
    }

    async fn list_treatments(&self, range: TimeRange) -> Result<Vec<Treatment>, StoreError> {
        let tables = self.tables.lock().await;
        let mut rows: Vec<Treatment> = tables
            .treatments
            .values()
            .filter(|t| t.deleted_at.is_none())
            .filter(|t| range.contains(t.created_at))
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(rows)
    }

    async fn append_activity(&self, entry: &ActivityLogEntry) -> Result<(), StoreError> {
        let mut tables = self.tables.lock().await;
        if tables.activity.iter().any(|e| e.id == entry.id) {
            return Err(StoreError::DuplicateId(entry.id));
        }
        tables.activity.push(entry.clone());
        Ok(())
    }
}
