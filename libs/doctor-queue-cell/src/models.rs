use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use shared_models::DoctorQueueEntry;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueueAssignment {
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub assigned_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct QueueSnapshot {
    pub entries: Vec<DoctorQueueEntry>,
    /// Doctor the next queue assignment would go to, if any.
    pub next_doctor_id: Option<Uuid>,
}
