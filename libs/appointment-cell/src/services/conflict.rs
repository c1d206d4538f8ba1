use std::sync::Arc;

use tracing::{debug, warn};
use uuid::Uuid;

use shared_database::ClinicRepository;
use shared_models::TimeRange;

use crate::error::SchedulingError;
use crate::models::ConflictCheckResponse;

/// Read-only overlap lookup. Booking itself relies on the repository's atomic
/// check-and-insert, so a clear answer here is advisory only.
pub struct ConflictDetectionService {
    repository: Arc<dyn ClinicRepository>,
}

impl ConflictDetectionService {
    pub fn new(repository: Arc<dyn ClinicRepository>) -> Self {
        Self { repository }
    }

    /// Slot-holding appointments of `doctor_id` that overlap `slot`.
    pub async fn check_conflicts(
        &self,
        doctor_id: Uuid,
        slot: TimeRange,
        exclude_appointment_id: Option<Uuid>,
    ) -> Result<ConflictCheckResponse, SchedulingError> {
        debug!("Checking conflicts for doctor {} from {} to {}", doctor_id, slot.from, slot.to);

        let conflicting_appointments = self
            .repository
            .find_overlapping(doctor_id, slot, exclude_appointment_id)
            .await?;

        let has_conflict = !conflicting_appointments.is_empty();
        if has_conflict {
            warn!(
                "Conflict detected for doctor {} - {} conflicting appointments",
                doctor_id,
                conflicting_appointments.len()
            );
        }

        Ok(ConflictCheckResponse {
            has_conflict,
            conflicting_appointments,
        })
    }
}
