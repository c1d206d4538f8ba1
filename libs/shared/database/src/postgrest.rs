// PostgREST-backed implementation of the clinic repository.
//
// Atomicity comes from the database: single-statement writes, the exclusion
// constraint on `appointments`, conditional PATCH filters for optimistic
// writes, and plpgsql functions for the multi-row queue updates
// (`enqueue_doctor`, `dequeue_doctor`, `deactivate_doctor`, `assign_from_queue`;
// see migrations/001_clinic_core.sql).

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::Method;
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::{json, Value};
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::{
    now_micros, ActivityLogEntry, Appointment, Doctor, DoctorQueueEntry, Patient, TimeRange,
    Treatment,
};

use crate::error::{DatabaseError, StoreError};
use crate::repository::{ClinicRepository, DoctorDeactivation, QueueClaim, VisibilityScope};
use crate::supabase::SupabaseClient;

const SLOT_HOLDING_STATUSES: &str = "in.(scheduled,confirmed)";

/// Reply of the `assign_from_queue` function.
#[derive(Deserialize)]
struct QueueAssignReply {
    outcome: String,
    patient: Option<Patient>,
}

pub struct SupabaseClinicStore {
    client: SupabaseClient,
}

fn ts(value: DateTime<Utc>) -> String {
    urlencoding::encode(&value.to_rfc3339_opts(SecondsFormat::Micros, true)).into_owned()
}

fn decode_rows<T: DeserializeOwned>(rows: Vec<Value>) -> Result<Vec<T>, StoreError> {
    rows.into_iter()
        .map(serde_json::from_value)
        .collect::<Result<Vec<T>, _>>()
        .map_err(|e| StoreError::Persistence(format!("Failed to parse rows: {}", e)))
}

fn first_row<T: DeserializeOwned>(rows: Vec<Value>) -> Result<Option<T>, StoreError> {
    Ok(decode_rows(rows)?.into_iter().next())
}

fn to_body<T: serde::Serialize>(row: &T) -> Result<Value, StoreError> {
    serde_json::to_value(row).map_err(|e| StoreError::Persistence(e.to_string()))
}

impl SupabaseClinicStore {
    pub fn new(config: &AppConfig) -> Result<Self, DatabaseError> {
        Ok(Self {
            client: SupabaseClient::new(config)?,
        })
    }

    pub fn with_client(client: SupabaseClient) -> Self {
        Self { client }
    }

    async fn select<T: DeserializeOwned>(&self, path: &str) -> Result<Vec<T>, StoreError> {
        let rows: Vec<Value> = self.client.request(Method::GET, path, None).await?;
        decode_rows(rows)
    }

    async fn write(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        entity: &str,
        id: Uuid,
    ) -> Result<Vec<Value>, StoreError> {
        self.client
            .request_representation(method, path, body)
            .await
            .map_err(|e| StoreError::from_database(e, entity, id))
    }

    /// An empty conditional write means either the row is gone or a concurrent
    /// writer changed it first.
    async fn missing_or_stale(&self, table: &str, id: Uuid) -> StoreError {
        let path = format!("/rest/v1/{}?id=eq.{}&select=id", table, id);
        match self.select::<Value>(&path).await {
            Ok(rows) if rows.is_empty() => StoreError::NotFound(format!("{} {}", table, id)),
            Ok(_) => StoreError::StaleWrite(format!("{} {}", table, id)),
            Err(e) => e,
        }
    }
}

#[async_trait]
impl ClinicRepository for SupabaseClinicStore {
    async fn insert_doctor(&self, doctor: &Doctor) -> Result<Doctor, StoreError> {
        let rows = self
            .write(Method::POST, "/rest/v1/doctors", Some(to_body(doctor)?), "doctor", doctor.id)
            .await?;
        first_row(rows)?.ok_or_else(|| StoreError::Persistence("doctor insert returned no row".into()))
    }

    async fn get_doctor(&self, id: Uuid) -> Result<Option<Doctor>, StoreError> {
        let rows = self.select(&format!("/rest/v1/doctors?id=eq.{}", id)).await?;
        Ok(rows.into_iter().next())
    }

    async fn list_doctors(&self) -> Result<Vec<Doctor>, StoreError> {
        self.select("/rest/v1/doctors?order=name.asc,id.asc").await
    }

    async fn set_doctor_active(&self, id: Uuid, active: bool) -> Result<Doctor, StoreError> {
        let path = format!("/rest/v1/doctors?id=eq.{}", id);
        let rows = self
            .write(Method::PATCH, &path, Some(json!({ "active": active })), "doctor", id)
            .await?;
        first_row(rows)?.ok_or_else(|| StoreError::NotFound(format!("doctor {}", id)))
    }

    async fn deactivate_doctor(&self, id: Uuid) -> Result<DoctorDeactivation, StoreError> {
        let body = json!({ "p_doctor_id": id });
        let dequeued: Option<bool> = self
            .client
            .request(Method::POST, "/rest/v1/rpc/deactivate_doctor", Some(body))
            .await
            .map_err(|e| StoreError::from_database(e, "doctor", id))?;
        // NULL means the doctor row does not exist.
        let dequeued = dequeued.ok_or_else(|| StoreError::NotFound(format!("doctor {}", id)))?;
        let doctor = self
            .get_doctor(id)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("doctor {}", id)))?;
        Ok(DoctorDeactivation { doctor, dequeued })
    }

    async fn insert_patient(&self, patient: &Patient) -> Result<Patient, StoreError> {
        let rows = self
            .write(Method::POST, "/rest/v1/patients", Some(to_body(patient)?), "patient", patient.id)
            .await?;
        first_row(rows)?.ok_or_else(|| StoreError::Persistence("patient insert returned no row".into()))
    }

    async fn get_patient(&self, id: Uuid) -> Result<Option<Patient>, StoreError> {
        let path = format!("/rest/v1/patients?id=eq.{}&deleted_at=is.null", id);
        Ok(self.select(&path).await?.into_iter().next())
    }

    async fn update_patient(&self, patient: &Patient) -> Result<Patient, StoreError> {
        let path = format!("/rest/v1/patients?id=eq.{}&deleted_at=is.null", patient.id);
        let body = json!({
            "name": patient.name,
            "phone": patient.phone,
            "anamnez": patient.anamnez,
        });
        let rows = self.write(Method::PATCH, &path, Some(body), "patient", patient.id).await?;
        first_row(rows)?.ok_or_else(|| StoreError::NotFound(format!("patient {}", patient.id)))
    }

    #[instrument(skip(self, appointment), fields(appointment_id = %appointment.id))]
    async fn insert_appointment(&self, appointment: &Appointment) -> Result<Appointment, StoreError> {
        // Overlaps are rejected by the `appointments_no_overlap` exclusion constraint.
        let rows = self
            .write(
                Method::POST,
                "/rest/v1/appointments",
                Some(to_body(appointment)?),
                "appointment",
                appointment.id,
            )
            .await?;
        first_row(rows)?.ok_or_else(|| StoreError::Persistence("appointment insert returned no row".into()))
    }

    async fn get_appointment(&self, id: Uuid) -> Result<Option<Appointment>, StoreError> {
        let rows = self.select(&format!("/rest/v1/appointments?id=eq.{}", id)).await?;
        Ok(rows.into_iter().next())
    }

    async fn update_appointment(
        &self,
        appointment: &Appointment,
        expected_updated_at: DateTime<Utc>,
    ) -> Result<Appointment, StoreError> {
        let path = format!(
            "/rest/v1/appointments?id=eq.{}&updated_at=eq.{}",
            appointment.id,
            ts(expected_updated_at)
        );
        let body = json!({
            "appointment_date": appointment.appointment_date,
            "duration_minutes": appointment.duration_minutes,
            "status": appointment.status,
            "notes": appointment.notes,
            "doctor_id": appointment.doctor_id,
            "updated_at": appointment.updated_at,
        });
        let rows = self
            .write(Method::PATCH, &path, Some(body), "appointment", appointment.id)
            .await?;
        match first_row(rows)? {
            Some(updated) => Ok(updated),
            None => Err(self.missing_or_stale("appointments", appointment.id).await),
        }
    }

    async fn delete_appointment(&self, id: Uuid) -> Result<(), StoreError> {
        let path = format!("/rest/v1/appointments?id=eq.{}", id);
        let rows = self.write(Method::DELETE, &path, None, "appointment", id).await?;
        if rows.is_empty() {
            return Err(StoreError::NotFound(format!("appointment {}", id)));
        }
        Ok(())
    }

    async fn list_appointments(
        &self,
        range: TimeRange,
        scope: VisibilityScope,
    ) -> Result<Vec<Appointment>, StoreError> {
        let window = format!(
            "appointment_date=gte.{}&appointment_date=lt.{}&order=appointment_date.asc,id.asc",
            ts(range.from),
            ts(range.to)
        );
        let path = match scope {
            VisibilityScope::All => format!("/rest/v1/appointments?{}", window),
            // The view adds owner_id = coalesce(patients.assigned_doctor_id, appointments.doctor_id).
            VisibilityScope::OwnPatients(doctor_id) => format!(
                "/rest/v1/appointments_with_owner?owner_id=eq.{}&{}",
                doctor_id, window
            ),
        };
        debug!("Listing appointments with {:?}", scope);
        self.select(&path).await
    }

    async fn find_overlapping(
        &self,
        doctor_id: Uuid,
        range: TimeRange,
        exclude: Option<Uuid>,
    ) -> Result<Vec<Appointment>, StoreError> {
        // Candidates start before the range ends; the end bound is checked locally.
        let mut path = format!(
            "/rest/v1/appointments?doctor_id=eq.{}&status={}&appointment_date=lt.{}&order=appointment_date.asc",
            doctor_id,
            SLOT_HOLDING_STATUSES,
            ts(range.to)
        );
        if let Some(exclude_id) = exclude {
            path.push_str(&format!("&id=neq.{}", exclude_id));
        }
        let candidates: Vec<Appointment> = self.select(&path).await?;
        Ok(candidates
            .into_iter()
            .filter(|a| a.slot().overlaps(&range))
            .collect())
    }

    async fn queue_entries(&self) -> Result<Vec<DoctorQueueEntry>, StoreError> {
        self.select("/rest/v1/doctor_queue?order=position.asc").await
    }

    #[instrument(skip(self))]
    async fn assign_from_queue(
        &self,
        patient_id: Uuid,
        doctor_id: Uuid,
        expected_last_assigned_at: Option<DateTime<Utc>>,
        stamp: DateTime<Utc>,
    ) -> Result<QueueClaim, StoreError> {
        let body = json!({
            "p_patient_id": patient_id,
            "p_doctor_id": doctor_id,
            "p_expected_last_assigned_at": expected_last_assigned_at,
            "p_stamp": stamp,
        });
        let reply: QueueAssignReply = self
            .client
            .request(Method::POST, "/rest/v1/rpc/assign_from_queue", Some(body))
            .await
            .map_err(|e| StoreError::from_database(e, "patient", patient_id))?;

        match (reply.outcome.as_str(), reply.patient) {
            ("assigned", Some(patient)) => Ok(QueueClaim::Assigned(patient)),
            ("lost", _) => {
                warn!("Queue claim for doctor {} lost to a concurrent writer", doctor_id);
                Ok(QueueClaim::Lost)
            }
            ("already_assigned", _) => Err(StoreError::StaleWrite(format!(
                "patient {} was assigned concurrently",
                patient_id
            ))),
            ("missing_patient", _) => Err(StoreError::NotFound(format!("patient {}", patient_id))),
            (other, _) => Err(StoreError::Persistence(format!(
                "unexpected queue assignment outcome '{}'",
                other
            ))),
        }
    }

    async fn enqueue_doctor(
        &self,
        doctor_id: Uuid,
        activated_at: DateTime<Utc>,
    ) -> Result<DoctorQueueEntry, StoreError> {
        let body = json!({ "p_doctor_id": doctor_id, "p_activated_at": activated_at });
        let rows: Vec<Value> = self
            .client
            .request(Method::POST, "/rest/v1/rpc/enqueue_doctor", Some(body))
            .await
            .map_err(|e| StoreError::from_database(e, "doctor", doctor_id))?;
        first_row(rows)?.ok_or_else(|| StoreError::NotFound(format!("doctor {}", doctor_id)))
    }

    async fn dequeue_doctor(&self, doctor_id: Uuid) -> Result<bool, StoreError> {
        let body = json!({ "p_doctor_id": doctor_id });
        let removed: bool = self
            .client
            .request(Method::POST, "/rest/v1/rpc/dequeue_doctor", Some(body))
            .await
            .map_err(|e| StoreError::from_database(e, "doctor", doctor_id))?;
        Ok(removed)
    }

    async fn insert_treatment(&self, treatment: &Treatment) -> Result<Treatment, StoreError> {
        let rows = self
            .write(
                Method::POST,
                "/rest/v1/treatments",
                Some(to_body(treatment)?),
                "treatment",
                treatment.id,
            )
            .await?;
        first_row(rows)?.ok_or_else(|| StoreError::Persistence("treatment insert returned no row".into()))
    }

    async fn get_treatment(&self, id: Uuid) -> Result<Option<Treatment>, StoreError> {
        let path = format!("/rest/v1/treatments?id=eq.{}&deleted_at=is.null", id);
        Ok(self.select(&path).await?.into_iter().next())
    }

    async fn update_treatment(
        &self,
        treatment: &Treatment,
        expected_updated_at: DateTime<Utc>,
    ) -> Result<Treatment, StoreError> {
        let path = format!(
            "/rest/v1/treatments?id=eq.{}&deleted_at=is.null&updated_at=eq.{}",
            treatment.id,
            ts(expected_updated_at)
        );
        let body = json!({
            "cost": treatment.cost,
            "notes": treatment.notes,
            "locked": treatment.locked,
            "updated_at": treatment.updated_at,
            "deleted_at": treatment.deleted_at,
        });
        let rows = self
            .write(Method::PATCH, &path, Some(body), "treatment", treatment.id)
            .await?;
        match first_row(rows)? {
            Some(updated) => Ok(updated),
            None => Err(self.missing_or_stale("treatments", treatment.id).await),
        }
    }

    async fn lock_treatments_before(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError> {
        let path = format!(
            "/rest/v1/treatments?locked=is.false&created_at=lt.{}&select=id",
            ts(cutoff)
        );
        let body = json!({ "locked": true, "updated_at": now_micros() });
        let rows = self
            .client
            .request_representation(Method::PATCH, &path, Some(body))
            .await?;
        Ok(rows.len() as u64)
    }

    async fn list_treatments(&self, range: TimeRange) -> Result<Vec<Treatment>, StoreError> {
        let path = format!(
            "/rest/v1/treatments?deleted_at=is.null&created_at=gte.{}&created_at=lt.{}&order=created_at.asc,id.asc",
            ts(range.from),
            ts(range.to)
        );
        self.select(&path).await
    }

    async fn append_activity(&self, entry: &ActivityLogEntry) -> Result<(), StoreError> {
        self.write(
            Method::POST,
            "/rest/v1/user_activity_logs",
            Some(to_body(entry)?),
            "activity",
            entry.id,
        )
        .await?;
        Ok(())
    }
}
