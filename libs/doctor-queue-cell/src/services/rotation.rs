use shared_models::DoctorQueueEntry;

/// Chooses which doctor in the rotation receives the next patient.
pub trait RotationPolicy: Send + Sync {
    fn select<'a>(&self, entries: &'a [DoctorQueueEntry]) -> Option<&'a DoctorQueueEntry>;
}

/// Round robin over active doctors: the least recently assigned doctor wins,
/// ties go to the lower position. A doctor who never received a patient
/// counts as assigned at activation, so a reactivated doctor waits at the back.
#[derive(Debug, Clone, Copy, Default)]
pub struct LeastRecentlyAssigned;

impl RotationPolicy for LeastRecentlyAssigned {
    fn select<'a>(&self, entries: &'a [DoctorQueueEntry]) -> Option<&'a DoctorQueueEntry> {
        entries
            .iter()
            .min_by_key(|entry| (entry.effective_last_assigned(), entry.position))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use uuid::Uuid;

    fn t(minutes: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 8, 0, 0).unwrap() + Duration::minutes(minutes)
    }

    fn entry(position: i32, activated: i64, last: Option<i64>) -> DoctorQueueEntry {
        DoctorQueueEntry {
            doctor_id: Uuid::new_v4(),
            position,
            last_assigned_at: last.map(t),
            activated_at: t(activated),
        }
    }

    #[test]
    fn empty_rotation_selects_nobody() {
        assert!(LeastRecentlyAssigned.select(&[]).is_none());
    }

    #[test]
    fn fresh_rotation_goes_by_position() {
        let entries = vec![entry(1, 0, None), entry(2, 0, None), entry(3, 0, None)];
        assert_eq!(LeastRecentlyAssigned.select(&entries).unwrap().position, 1);
    }

    #[test]
    fn least_recently_assigned_wins() {
        let entries = vec![entry(1, 0, Some(30)), entry(2, 0, Some(10)), entry(3, 0, Some(20))];
        assert_eq!(LeastRecentlyAssigned.select(&entries).unwrap().position, 2);
    }

    #[test]
    fn equal_stamps_break_by_position() {
        let entries = vec![entry(2, 0, Some(10)), entry(1, 0, Some(10))];
        assert_eq!(LeastRecentlyAssigned.select(&entries).unwrap().position, 1);
    }

    #[test]
    fn never_assigned_doctor_ranks_by_activation_time() {
        // Reactivated at minute 40, after everybody else's last patient.
        let entries = vec![entry(1, 0, Some(30)), entry(2, 40, None), entry(3, 0, Some(35))];
        assert_eq!(LeastRecentlyAssigned.select(&entries).unwrap().position, 1);

        // Activated at minute 5, before anybody else's last patient.
        let entries = vec![entry(1, 0, Some(30)), entry(2, 5, None)];
        assert_eq!(LeastRecentlyAssigned.select(&entries).unwrap().position, 2);
    }
}
