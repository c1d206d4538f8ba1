// =====================================================================================
// SECURITY CELL HANDLERS - HTTP ENDPOINTS
// =====================================================================================

use axum::{Extension, Json};
use tracing::instrument;

use shared_models::Actor;

use crate::models::CapabilitiesResponse;
use crate::services::PermissionGate;

/// Capability grants of the calling staff member's role.
#[instrument(skip(actor), fields(actor_id = %actor.id))]
pub async fn get_capabilities(Extension(actor): Extension<Actor>) -> Json<CapabilitiesResponse> {
    Json(CapabilitiesResponse {
        actor_id: actor.id,
        role: actor.role,
        capabilities: PermissionGate::capabilities_for(actor.role),
    })
}
