use serde::Deserialize;
use thiserror::Error;
use uuid::Uuid;

use doctor_queue_cell::QueueError;
use security_cell::{PermissionDenied, ValidationIssue};
use shared_database::StoreError;
use shared_models::{AppError, Role};

#[derive(Debug, Clone, Deserialize)]
pub struct CreateDoctorRequest {
    /// Auth user id of the staff member. Generated when absent.
    #[serde(default)]
    pub id: Option<Uuid>,
    pub name: String,
    #[serde(default = "default_role")]
    pub role: Role,
}

fn default_role() -> Role {
    Role::Doctor
}

impl CreateDoctorRequest {
    pub fn new(name: impl Into<String>, role: Role) -> Self {
        Self {
            id: None,
            name: name.into(),
            role,
        }
    }

    pub fn with_id(mut self, id: Uuid) -> Self {
        self.id = Some(id);
        self
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DoctorListQuery {
    #[serde(default)]
    pub active_only: bool,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DoctorError {
    #[error("Doctor not found: {0}")]
    NotFound(Uuid),

    #[error("Invalid {field}: {message}")]
    Validation { field: String, message: String },

    #[error("Doctor {0} already exists")]
    AlreadyExists(Uuid),

    #[error(transparent)]
    PermissionDenied(#[from] PermissionDenied),

    #[error(transparent)]
    Queue(#[from] QueueError),

    #[error("Persistence error: {0}")]
    Persistence(String),
}

impl From<ValidationIssue> for DoctorError {
    fn from(issue: ValidationIssue) -> Self {
        DoctorError::Validation {
            field: issue.field().to_string(),
            message: issue.to_string(),
        }
    }
}

impl From<StoreError> for DoctorError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateId(id) => DoctorError::AlreadyExists(id),
            other => DoctorError::Persistence(other.to_string()),
        }
    }
}

impl From<DoctorError> for AppError {
    fn from(err: DoctorError) -> Self {
        match err {
            DoctorError::NotFound(id) => AppError::NotFound(format!("doctor {}", id)),
            DoctorError::Validation { field, message } => AppError::validation(field, message),
            DoctorError::AlreadyExists(id) => AppError::Conflict(format!("doctor {} already exists", id)),
            DoctorError::PermissionDenied(denied) => denied.into(),
            DoctorError::Queue(queue) => queue.into(),
            DoctorError::Persistence(msg) => AppError::Database(msg),
        }
    }
}
