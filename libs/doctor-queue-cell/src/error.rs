use thiserror::Error;

use security_cell::PermissionDenied;
use shared_database::StoreError;
use shared_models::AppError;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum QueueError {
    #[error("No active doctors in the rotation")]
    NoActiveDoctors,

    #[error(transparent)]
    PermissionDenied(#[from] PermissionDenied),

    #[error("{0} not found")]
    NotFound(String),

    #[error("Invalid {field}: {message}")]
    Validation { field: String, message: String },

    #[error("Queue is busy: gave up after {attempts} claim attempts")]
    Contended { attempts: u32 },

    #[error("Persistence error: {0}")]
    Persistence(String),
}

impl QueueError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        QueueError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl From<StoreError> for QueueError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(what) => QueueError::NotFound(what),
            StoreError::Persistence(msg) => QueueError::Persistence(msg),
            StoreError::Conflict(msg) | StoreError::StaleWrite(msg) => QueueError::validation("patient_id", msg),
            StoreError::DuplicateId(id) => QueueError::validation("id", format!("record {} already exists", id)),
        }
    }
}

impl From<QueueError> for AppError {
    fn from(err: QueueError) -> Self {
        match err {
            QueueError::NoActiveDoctors => {
                AppError::NoActiveDoctors("no active doctor is available for assignment".to_string())
            }
            QueueError::PermissionDenied(denied) => denied.into(),
            QueueError::NotFound(what) => AppError::NotFound(what),
            QueueError::Validation { field, message } => AppError::validation(field, message),
            QueueError::Contended { attempts } => {
                AppError::Conflict(format!("queue is busy after {} claim attempts; retry", attempts))
            }
            QueueError::Persistence(msg) => AppError::Database(msg),
        }
    }
}
