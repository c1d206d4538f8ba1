pub mod auth;
pub mod clinic;
pub mod error;

pub use auth::{Actor, Role, User};
pub use clinic::*;
pub use error::AppError;
