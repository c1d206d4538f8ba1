// libs/appointment-cell/src/models.rs
use chrono::{DateTime, NaiveDateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use shared_models::{Appointment, AppointmentStatus, TimeRange};

use crate::error::SchedulingError;

// ==============================================================================
// SERVICE INPUTS
// ==============================================================================

/// Validated input for `AppointmentScheduler::create`.
#[derive(Debug, Clone, PartialEq)]
pub struct AppointmentDraft {
    /// Client-chosen id. Re-submitting the same draft under the same id is a no-op.
    pub id: Option<Uuid>,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub appointment_date: DateTime<Utc>,
    pub duration_minutes: i32,
    pub notes: Option<String>,
}

impl AppointmentDraft {
    pub fn new(patient_id: Uuid, doctor_id: Uuid, appointment_date: DateTime<Utc>, duration_minutes: i32) -> Self {
        Self {
            id: None,
            patient_id,
            doctor_id,
            appointment_date,
            duration_minutes,
            notes: None,
        }
    }

    pub fn with_id(mut self, id: Uuid) -> Self {
        self.id = Some(id);
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    pub fn slot(&self) -> TimeRange {
        TimeRange::starting_at(self.appointment_date, self.duration_minutes)
    }

    /// Whether `existing` was created from an identical draft.
    pub fn matches(&self, existing: &Appointment) -> bool {
        existing.patient_id == self.patient_id
            && existing.doctor_id == self.doctor_id
            && existing.appointment_date == self.appointment_date.trunc_subsecs(6)
            && existing.duration_minutes == self.duration_minutes
            && existing.notes == self.notes
    }
}

/// Partial update. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AppointmentPatch {
    pub appointment_date: Option<DateTime<Utc>>,
    pub duration_minutes: Option<i32>,
    pub status: Option<AppointmentStatus>,
    pub notes: Option<String>,
}

impl AppointmentPatch {
    pub fn reschedule(appointment_date: DateTime<Utc>, duration_minutes: i32) -> Self {
        Self {
            appointment_date: Some(appointment_date),
            duration_minutes: Some(duration_minutes),
            ..Self::default()
        }
    }

    pub fn status(status: AppointmentStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn notes(notes: impl Into<String>) -> Self {
        Self {
            notes: Some(notes.into()),
            ..Self::default()
        }
    }

    /// True when the patch touches anything besides notes.
    pub fn changes_schedule_or_status(&self, current: &Appointment) -> bool {
        self.appointment_date.is_some_and(|d| d != current.appointment_date)
            || self.duration_minutes.is_some_and(|d| d != current.duration_minutes)
            || self.status.is_some_and(|s| s != current.status)
    }
}

// ==============================================================================
// REQUEST/RESPONSE MODELS
// ==============================================================================

#[derive(Debug, Deserialize)]
pub struct CreateAppointmentRequest {
    pub id: Option<Uuid>,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub appointment_date: String,
    pub duration_minutes: i32,
    pub notes: Option<String>,
}

impl TryFrom<CreateAppointmentRequest> for AppointmentDraft {
    type Error = SchedulingError;

    fn try_from(request: CreateAppointmentRequest) -> Result<Self, Self::Error> {
        Ok(Self {
            id: request.id,
            patient_id: request.patient_id,
            doctor_id: request.doctor_id,
            appointment_date: parse_timestamp("appointment_date", &request.appointment_date)?,
            duration_minutes: request.duration_minutes,
            notes: request.notes,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateAppointmentRequest {
    pub appointment_date: Option<String>,
    pub duration_minutes: Option<i32>,
    pub status: Option<AppointmentStatus>,
    pub notes: Option<String>,
}

impl TryFrom<UpdateAppointmentRequest> for AppointmentPatch {
    type Error = SchedulingError;

    fn try_from(request: UpdateAppointmentRequest) -> Result<Self, Self::Error> {
        Ok(Self {
            appointment_date: request
                .appointment_date
                .as_deref()
                .map(|raw| parse_timestamp("appointment_date", raw))
                .transpose()?,
            duration_minutes: request.duration_minutes,
            status: request.status,
            notes: request.notes,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct AppointmentRangeQuery {
    pub from: String,
    pub to: String,
}

impl AppointmentRangeQuery {
    pub fn to_range(&self) -> Result<TimeRange, SchedulingError> {
        let from = parse_timestamp("from", &self.from)?;
        let to = parse_timestamp("to", &self.to)?;
        if to <= from {
            return Err(SchedulingError::validation("to", "must be after from"));
        }
        Ok(TimeRange::new(from, to))
    }
}

#[derive(Debug, Deserialize)]
pub struct ConflictCheckQuery {
    pub doctor_id: Uuid,
    pub appointment_date: String,
    pub duration_minutes: i32,
    pub exclude_appointment_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConflictCheckResponse {
    pub has_conflict: bool,
    pub conflicting_appointments: Vec<Appointment>,
}

/// Accepts RFC 3339 timestamps, or `YYYY-MM-DDTHH:MM[:SS]` read as UTC.
pub fn parse_timestamp(field: &str, raw: &str) -> Result<DateTime<Utc>, SchedulingError> {
    let raw = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Ok(parsed.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .map(|naive| naive.and_utc())
        .ok_or_else(|| SchedulingError::validation(field, format!("'{}' is not a valid timestamp", raw)))
}
