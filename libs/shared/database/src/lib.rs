pub mod error;
pub mod memory;
pub mod postgrest;
pub mod repository;
pub mod supabase;

pub use error::{DatabaseError, StoreError};
pub use memory::InMemoryClinicStore;
pub use postgrest::SupabaseClinicStore;
pub use repository::{ClinicRepository, DoctorDeactivation, QueueClaim, VisibilityScope};
pub use supabase::SupabaseClient;
