// Treatment records: per-tooth procedures with their cost, editable until the
// end-of-day lock, and the income rows finance exports from them.

pub mod error;
pub mod handlers;
pub mod models;
pub mod router;
pub mod services;

pub use error::TreatmentError;
pub use models::{
    CreateTreatmentRequest, IncomeQuery, IncomeReport, LockRequest, LockSummary, UpdateTreatmentRequest,
};
pub use router::treatment_routes;
pub use services::TreatmentService;
