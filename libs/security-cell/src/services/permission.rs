// =====================================================================================
// PERMISSION GATE - ROLE/CAPABILITY LOOKUP WITH OWNERSHIP CHECKS
// =====================================================================================

use tracing::warn;
use uuid::Uuid;

use shared_database::VisibilityScope;
use shared_models::{Actor, Role};

use crate::models::{Capability, CapabilityGrant, Decision, Grant, PermissionDenied};

/// Stateless gate. Anything not granted in [`PermissionGate::grant`] is denied.
#[derive(Debug, Clone, Copy, Default)]
pub struct PermissionGate;

impl PermissionGate {
    pub fn new() -> Self {
        Self
    }

    pub fn grant(role: Role, capability: Capability) -> Grant {
        use Capability::*;

        match (role, capability) {
            (Role::Admin, ViewAllPatients)
            | (Role::Admin, EditAnyAppointment)
            | (Role::Admin, DeleteAppointment)
            | (Role::Admin, ManageDoctorQueue)
            | (Role::Admin, ChangeOtherUserPassword)
            | (Role::Admin, ScheduleAppointments)
            | (Role::Admin, EditAnyTreatment)
            | (Role::Admin, ViewFinancialReports) => Grant::Any,

            (Role::Doctor, ViewAllPatients)
            | (Role::Doctor, EditAnyAppointment)
            | (Role::Doctor, ScheduleAppointments)
            | (Role::Doctor, EditAnyTreatment) => Grant::OwnOnly,

            (Role::Assistant, ViewAllPatients) | (Role::Assistant, ScheduleAppointments) => Grant::Any,

            _ => Grant::None,
        }
    }

    pub fn check(&self, actor: &Actor, capability: Capability, resource_owner_id: Option<Uuid>) -> Decision {
        match Self::grant(actor.role, capability) {
            Grant::Any => Decision::Allow,
            Grant::OwnOnly if resource_owner_id == Some(actor.id) => Decision::Allow,
            Grant::OwnOnly | Grant::None => Decision::Deny,
        }
    }

    /// Like [`check`](Self::check), logging denials as security events.
    pub fn require(
        &self,
        actor: &Actor,
        capability: Capability,
        resource_owner_id: Option<Uuid>,
    ) -> Result<(), PermissionDenied> {
        if self.check(actor, capability, resource_owner_id).is_allowed() {
            return Ok(());
        }

        warn!(
            target: "security",
            actor_id = %actor.id,
            role = %actor.role,
            capability = %capability,
            resource_owner_id = ?resource_owner_id,
            "Permission denied"
        );

        Err(PermissionDenied {
            actor_id: actor.id,
            role: actor.role,
            capability,
            resource_owner_id,
        })
    }

    /// Listing scope implied by `viewAllPatients`.
    pub fn visibility_scope(&self, actor: &Actor) -> Result<VisibilityScope, PermissionDenied> {
        match Self::grant(actor.role, Capability::ViewAllPatients) {
            Grant::Any => Ok(VisibilityScope::All),
            Grant::OwnOnly => Ok(VisibilityScope::OwnPatients(actor.id)),
            Grant::None => self.require(actor, Capability::ViewAllPatients, None).map(|_| VisibilityScope::All),
        }
    }

    pub fn capabilities_for(role: Role) -> Vec<CapabilityGrant> {
        Capability::ALL
            .iter()
            .map(|capability| CapabilityGrant {
                capability: *capability,
                grant: Self::grant(role, *capability),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn actor(role: Role) -> Actor {
        Actor::new(Uuid::new_v4(), "Test", role)
    }

    #[test]
    fn capability_table_matches_roles() {
        use Capability::*;

        let expected = [
            (ViewAllPatients, [Grant::Any, Grant::OwnOnly, Grant::Any]),
            (EditAnyAppointment, [Grant::Any, Grant::OwnOnly, Grant::None]),
            (DeleteAppointment, [Grant::Any, Grant::None, Grant::None]),
            (ManageDoctorQueue, [Grant::Any, Grant::None, Grant::None]),
            (ChangeOtherUserPassword, [Grant::Any, Grant::None, Grant::None]),
        ];

        for (capability, [admin, doctor, assistant]) in expected {
            assert_eq!(PermissionGate::grant(Role::Admin, capability), admin, "admin {}", capability);
            assert_eq!(PermissionGate::grant(Role::Doctor, capability), doctor, "doctor {}", capability);
            assert_eq!(PermissionGate::grant(Role::Assistant, capability), assistant, "assistant {}", capability);
        }
    }

    #[test]
    fn own_only_compares_owner_with_actor() {
        let gate = PermissionGate::new();
        let doctor = actor(Role::Doctor);

        assert_eq!(gate.check(&doctor, Capability::EditAnyAppointment, Some(doctor.id)), Decision::Allow);
        assert_eq!(gate.check(&doctor, Capability::EditAnyAppointment, Some(Uuid::new_v4())), Decision::Deny);
        assert_eq!(gate.check(&doctor, Capability::EditAnyAppointment, None), Decision::Deny);
    }

    #[test]
    fn no_grant_denies_even_for_own_resources() {
        let gate = PermissionGate::new();
        let doctor = actor(Role::Doctor);
        assert_eq!(gate.check(&doctor, Capability::DeleteAppointment, Some(doctor.id)), Decision::Deny);

        let assistant = actor(Role::Assistant);
        assert_eq!(gate.check(&assistant, Capability::EditAnyAppointment, Some(assistant.id)), Decision::Deny);
    }

    #[test]
    fn require_reports_the_denied_capability() {
        let gate = PermissionGate::new();
        let assistant = actor(Role::Assistant);
        let err = gate.require(&assistant, Capability::ManageDoctorQueue, None).unwrap_err();
        assert_eq!(err.capability, Capability::ManageDoctorQueue);
        assert_eq!(err.role, Role::Assistant);
    }

    #[test]
    fn visibility_scope_follows_view_all_patients() {
        let gate = PermissionGate::new();
        let doctor = actor(Role::Doctor);
        assert_eq!(gate.visibility_scope(&doctor).unwrap(), VisibilityScope::OwnPatients(doctor.id));
        assert_eq!(gate.visibility_scope(&actor(Role::Admin)).unwrap(), VisibilityScope::All);
        assert_eq!(gate.visibility_scope(&actor(Role::Assistant)).unwrap(), VisibilityScope::All);
    }

    #[test]
    fn capabilities_for_lists_every_capability() {
        let grants = PermissionGate::capabilities_for(Role::Assistant);
        assert_eq!(grants.len(), Capability::ALL.len());
        assert!(grants
            .iter()
            .any(|g| g.capability == Capability::ScheduleAppointments && g.grant == Grant::Any));
    }
}
