use thiserror::Error;

use security_cell::{PermissionDenied, ValidationIssue};
use shared_database::StoreError;
use shared_models::AppError;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SchedulingError {
    #[error("Invalid {field}: {message}")]
    Validation { field: String, message: String },

    #[error("Scheduling conflict: {0}")]
    Conflict(String),

    #[error(transparent)]
    PermissionDenied(#[from] PermissionDenied),

    #[error("{0} not found")]
    NotFound(String),

    #[error("Persistence error: {0}")]
    Persistence(String),
}

impl SchedulingError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        SchedulingError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl From<StoreError> for SchedulingError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(what) => SchedulingError::NotFound(what),
            StoreError::Conflict(msg) => SchedulingError::Conflict(msg),
            StoreError::DuplicateId(id) => {
                SchedulingError::Conflict(format!("appointment {} already exists", id))
            }
            StoreError::StaleWrite(what) => {
                SchedulingError::Conflict(format!("{} was changed by someone else; reload and retry", what))
            }
            StoreError::Persistence(msg) => SchedulingError::Persistence(msg),
        }
    }
}

impl From<ValidationIssue> for SchedulingError {
    fn from(issue: ValidationIssue) -> Self {
        SchedulingError::validation(issue.field(), issue.to_string())
    }
}

impl From<SchedulingError> for AppError {
    fn from(err: SchedulingError) -> Self {
        match err {
            SchedulingError::Validation { field, message } => AppError::validation(field, message),
            SchedulingError::Conflict(msg) => AppError::Conflict(msg),
            SchedulingError::PermissionDenied(denied) => denied.into(),
            SchedulingError::NotFound(what) => AppError::NotFound(what),
            SchedulingError::Persistence(msg) => AppError::Database(msg),
        }
    }
}
