pub mod handlers;
pub mod router;
pub mod models;
pub mod services;

pub use models::{CreateDoctorRequest, DoctorError, DoctorListQuery};
pub use services::DoctorService;
pub use router::doctor_routes;
