use thiserror::Error;
use uuid::Uuid;

use security_cell::{PermissionDenied, ValidationIssue};
use shared_database::StoreError;
use shared_models::AppError;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TreatmentError {
    #[error("Invalid {field}: {message}")]
    Validation { field: String, message: String },

    #[error("Treatment {0} is locked")]
    Locked(Uuid),

    #[error("{0} not found")]
    NotFound(String),

    #[error("Treatment conflict: {0}")]
    Conflict(String),

    #[error(transparent)]
    PermissionDenied(#[from] PermissionDenied),

    #[error("Persistence error: {0}")]
    Persistence(String),
}

impl TreatmentError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        TreatmentError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl From<StoreError> for TreatmentError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(what) => TreatmentError::NotFound(what),
            StoreError::Conflict(msg) => TreatmentError::Conflict(msg),
            StoreError::DuplicateId(id) => TreatmentError::Conflict(format!("treatment {} already exists", id)),
            StoreError::StaleWrite(what) => {
                TreatmentError::Conflict(format!("{} was changed by someone else; reload and retry", what))
            }
            StoreError::Persistence(msg) => TreatmentError::Persistence(msg),
        }
    }
}

impl From<ValidationIssue> for TreatmentError {
    fn from(issue: ValidationIssue) -> Self {
        TreatmentError::validation(issue.field(), issue.to_string())
    }
}

impl From<TreatmentError> for AppError {
    fn from(err: TreatmentError) -> Self {
        match err {
            TreatmentError::Validation { field, message } => AppError::validation(field, message),
            TreatmentError::Locked(id) => {
                AppError::validation("locked", format!("treatment {} is locked and can no longer change", id))
            }
            TreatmentError::NotFound(what) => AppError::NotFound(what),
            TreatmentError::Conflict(msg) => AppError::Conflict(msg),
            TreatmentError::PermissionDenied(denied) => denied.into(),
            TreatmentError::Persistence(msg) => AppError::Database(msg),
        }
    }
}
