use serde::Deserialize;
use thiserror::Error;
use uuid::Uuid;

use doctor_queue_cell::QueueError;
use security_cell::{PermissionDenied, ValidationIssue};
use shared_database::StoreError;
use shared_models::AppError;

/// How a new patient gets their doctor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum Intake {
    /// The caller picked the doctor.
    Manual { doctor_id: Uuid },
    /// The next doctor in the rotation.
    Queue,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreatePatientRequest {
    #[serde(default)]
    pub id: Option<Uuid>,
    pub name: String,
    pub phone: String,
    #[serde(default)]
    pub anamnez: Option<String>,
    pub intake: Intake,
}

impl CreatePatientRequest {
    pub fn new(name: impl Into<String>, phone: impl Into<String>, intake: Intake) -> Self {
        Self {
            id: None,
            name: name.into(),
            phone: phone.into(),
            anamnez: None,
            intake,
        }
    }

    pub fn with_anamnez(mut self, anamnez: impl Into<String>) -> Self {
        self.anamnez = Some(anamnez.into());
        self
    }
}

/// Partial update. An empty `anamnez` clears it.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdatePatientRequest {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub anamnez: Option<String>,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PatientError {
    #[error("Patient not found: {0}")]
    NotFound(String),

    #[error("Invalid {field}: {message}")]
    Validation { field: String, message: String },

    #[error("Patient {0} already exists")]
    AlreadyExists(Uuid),

    #[error(transparent)]
    PermissionDenied(#[from] PermissionDenied),

    /// The patient row was saved but the rotation could not place it.
    #[error("Patient {patient_id} saved without a doctor: {source}")]
    QueueAssignment { patient_id: Uuid, source: QueueError },

    #[error("Persistence error: {0}")]
    Persistence(String),
}

impl PatientError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        PatientError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl From<ValidationIssue> for PatientError {
    fn from(issue: ValidationIssue) -> Self {
        PatientError::validation(issue.field(), issue.to_string())
    }
}

impl From<StoreError> for PatientError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(what) => PatientError::NotFound(what),
            StoreError::DuplicateId(id) => PatientError::AlreadyExists(id),
            StoreError::Conflict(msg) | StoreError::StaleWrite(msg) => PatientError::validation("assigned_doctor_id", msg),
            StoreError::Persistence(msg) => PatientError::Persistence(msg),
        }
    }
}

impl From<PatientError> for AppError {
    fn from(err: PatientError) -> Self {
        match err {
            PatientError::NotFound(what) => AppError::NotFound(what),
            PatientError::Validation { field, message } => AppError::validation(field, message),
            PatientError::AlreadyExists(id) => AppError::Conflict(format!("patient {} already exists", id)),
            PatientError::PermissionDenied(denied) => denied.into(),
            PatientError::QueueAssignment { patient_id, source } => match AppError::from(source) {
                AppError::NoActiveDoctors(msg) => AppError::NoActiveDoctors(format!(
                    "patient {} saved unassigned; {}. Retry with POST /queue/assign/{}",
                    patient_id, msg, patient_id
                )),
                other => other,
            },
            PatientError::Persistence(msg) => AppError::Database(msg),
        }
    }
}
