// =====================================================================================
// SECURITY CELL MODELS
// =====================================================================================

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use shared_models::{AppError, Role};

// =====================================================================================
// PERMISSION MODELS
// =====================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Capability {
    ViewAllPatients,
    EditAnyAppointment,
    DeleteAppointment,
    ManageDoctorQueue,
    ChangeOtherUserPassword,
    ScheduleAppointments,
    EditAnyTreatment,
    ViewFinancialReports,
}

impl Capability {
    pub const ALL: [Capability; 8] = [
        Capability::ViewAllPatients,
        Capability::EditAnyAppointment,
        Capability::DeleteAppointment,
        Capability::ManageDoctorQueue,
        Capability::ChangeOtherUserPassword,
        Capability::ScheduleAppointments,
        Capability::EditAnyTreatment,
        Capability::ViewFinancialReports,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::ViewAllPatients => "viewAllPatients",
            Capability::EditAnyAppointment => "editAnyAppointment",
            Capability::DeleteAppointment => "deleteAppointment",
            Capability::ManageDoctorQueue => "manageDoctorQueue",
            Capability::ChangeOtherUserPassword => "changeOtherUserPassword",
            Capability::ScheduleAppointments => "scheduleAppointments",
            Capability::EditAnyTreatment => "editAnyTreatment",
            Capability::ViewFinancialReports => "viewFinancialReports",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How far a role's capability reaches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Grant {
    Any,
    OwnOnly,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny,
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        *self == Decision::Allow
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("role {role} is not permitted to {capability}")]
pub struct PermissionDenied {
    pub actor_id: Uuid,
    pub role: Role,
    pub capability: Capability,
    pub resource_owner_id: Option<Uuid>,
}

impl From<PermissionDenied> for AppError {
    fn from(err: PermissionDenied) -> Self {
        AppError::PermissionDenied(err.to_string())
    }
}

// =====================================================================================
// AUDIT MODELS
// =====================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    CreateAppointment,
    UpdateAppointment,
    CancelAppointment,
    DeleteAppointment,
    AssignPatientFromQueue,
    EnqueueDoctor,
    DequeueDoctor,
    CreateDoctor,
    CreatePatient,
    UpdatePatient,
    CreateTreatment,
    UpdateTreatment,
    DeleteTreatment,
    LockTreatments,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::CreateAppointment => "CREATE_APPOINTMENT",
            AuditAction::UpdateAppointment => "UPDATE_APPOINTMENT",
            AuditAction::CancelAppointment => "CANCEL_APPOINTMENT",
            AuditAction::DeleteAppointment => "DELETE_APPOINTMENT",
            AuditAction::AssignPatientFromQueue => "ASSIGN_PATIENT_FROM_QUEUE",
            AuditAction::EnqueueDoctor => "ENQUEUE_DOCTOR",
            AuditAction::DequeueDoctor => "DEQUEUE_DOCTOR",
            AuditAction::CreateDoctor => "CREATE_DOCTOR",
            AuditAction::CreatePatient => "CREATE_PATIENT",
            AuditAction::UpdatePatient => "UPDATE_PATIENT",
            AuditAction::CreateTreatment => "CREATE_TREATMENT",
            AuditAction::UpdateTreatment => "UPDATE_TREATMENT",
            AuditAction::DeleteTreatment => "DELETE_TREATMENT",
            AuditAction::LockTreatments => "LOCK_TREATMENTS",
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =====================================================================================
// VALIDATION MODELS
// =====================================================================================

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationIssue {
    #[error("{field} is required")]
    Required { field: String },

    #[error("{field} must be {expected}")]
    InvalidFormat { field: String, expected: String },

    #[error("{field} exceeds maximum length of {max_length}")]
    ExceedsMaxLength { field: String, max_length: usize },
}

impl ValidationIssue {
    pub fn field(&self) -> &str {
        match self {
            ValidationIssue::Required { field }
            | ValidationIssue::InvalidFormat { field, .. }
            | ValidationIssue::ExceedsMaxLength { field, .. } => field,
        }
    }
}

impl From<ValidationIssue> for AppError {
    fn from(issue: ValidationIssue) -> Self {
        AppError::validation(issue.field().to_string(), issue.to_string())
    }
}

// =====================================================================================
// REQUEST/RESPONSE MODELS
// =====================================================================================

#[derive(Debug, Clone, Serialize)]
pub struct CapabilityGrant {
    pub capability: Capability,
    pub grant: Grant,
}

#[derive(Debug, Clone, Serialize)]
pub struct CapabilitiesResponse {
    pub actor_id: Uuid,
    pub role: Role,
    pub capabilities: Vec<CapabilityGrant>,
}
