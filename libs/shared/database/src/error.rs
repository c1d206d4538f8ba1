use thiserror::Error;
use uuid::Uuid;

use shared_models::AppError;

/// Failure of a single PostgREST round-trip.
#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("API error ({status}): {message}")]
    Api {
        status: u16,
        code: Option<String>,
        message: String,
    },

    #[error("Failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Invalid header value: {0}")]
    Header(String),
}

impl DatabaseError {
    /// Postgres SQLSTATE reported by PostgREST, if any.
    pub fn sql_state(&self) -> Option<&str> {
        match self {
            DatabaseError::Api { code, .. } => code.as_deref(),
            _ => None,
        }
    }
}

/// Outcome of a repository unit of work that did not commit.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("Write conflict: {0}")]
    Conflict(String),

    #[error("Record {0} already exists")]
    DuplicateId(Uuid),

    #[error("Record changed concurrently: {0}")]
    StaleWrite(String),

    #[error("Persistence failure: {0}")]
    Persistence(String),
}

// Exclusion constraint, unique key and foreign key violations.
const EXCLUSION_VIOLATION: &str = "23P01";
const UNIQUE_VIOLATION: &str = "23505";
const FOREIGN_KEY_VIOLATION: &str = "23503";

impl StoreError {
    /// Translate a PostgREST failure for a write on `entity` keyed by `id`.
    pub fn from_database(err: DatabaseError, entity: &str, id: Uuid) -> Self {
        match err.sql_state() {
            Some(EXCLUSION_VIOLATION) => {
                StoreError::Conflict(format!("{} {} overlaps an existing booking", entity, id))
            }
            Some(UNIQUE_VIOLATION) => StoreError::DuplicateId(id),
            Some(FOREIGN_KEY_VIOLATION) => {
                StoreError::NotFound(format!("record referenced by {} {}", entity, id))
            }
            _ => match &err {
                DatabaseError::Api { status: 404, .. } => {
                    StoreError::NotFound(format!("{} {}", entity, id))
                }
                _ => StoreError::Persistence(err.to_string()),
            },
        }
    }
}

impl From<DatabaseError> for StoreError {
    fn from(err: DatabaseError) -> Self {
        StoreError::Persistence(err.to_string())
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(what) => AppError::NotFound(what),
            StoreError::Conflict(msg) => AppError::Conflict(msg),
            StoreError::DuplicateId(id) => AppError::Conflict(format!("record {} already exists", id)),
            StoreError::StaleWrite(msg) => AppError::Conflict(format!("record changed concurrently: {}", msg)),
            StoreError::Persistence(msg) => AppError::Database(msg),
        }
    }
}
