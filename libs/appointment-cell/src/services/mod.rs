pub mod conflict;
pub mod lifecycle;
pub mod scheduler;

pub use conflict::ConflictDetectionService;
pub use lifecycle::AppointmentLifecycleService;
pub use scheduler::AppointmentScheduler;
