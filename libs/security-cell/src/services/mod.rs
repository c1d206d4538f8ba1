pub mod actor;
pub mod audit;
pub mod permission;
pub mod validation;

pub use actor::{actor_middleware, ActorResolver};
pub use audit::{AuditLog, AuditSink, AuditWorker, RepositoryAuditSink};
pub use permission::PermissionGate;
pub use validation::ValidationService;
