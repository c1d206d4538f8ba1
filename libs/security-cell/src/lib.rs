// =====================================================================================
// SECURITY CELL - PERMISSION GATE, ACTIVITY AUDIT & INPUT VALIDATION
// =====================================================================================
//
// Every mutating clinic operation passes through this cell:
// - role/capability lookup and ownership checks (PermissionGate)
// - append-only activity logging delivered off the request path (AuditLog)
// - resolution of the authenticated caller into a staff Actor
// - field normalization shared by the intake and treatment cells
//
// =====================================================================================

pub mod handlers;
pub mod models;
pub mod router;
pub mod services;

pub use models::{AuditAction, Capability, Decision, Grant, PermissionDenied, ValidationIssue};

pub use services::{
    ActorResolver, AuditLog, AuditSink, AuditWorker, PermissionGate, RepositoryAuditSink,
    ValidationService,
};

pub use router::create_security_router;
