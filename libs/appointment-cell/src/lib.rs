// libs/appointment-cell/src/lib.rs
//
// Appointment lifecycle: booking with per-doctor overlap protection, status
// transitions, cancellation and role-scoped listing.

pub mod error;
pub mod handlers;
pub mod models;
pub mod router;
pub mod services;

pub use error::SchedulingError;
pub use models::{AppointmentDraft, AppointmentPatch, ConflictCheckResponse};
pub use router::appointment_routes;
pub use services::{AppointmentLifecycleService, AppointmentScheduler, ConflictDetectionService};
