pub mod queue;
pub mod rotation;

pub use queue::DoctorQueue;
pub use rotation::{LeastRecentlyAssigned, RotationPolicy};
