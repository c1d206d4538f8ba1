// =====================================================================================
// SECURITY CELL ROUTER
// =====================================================================================

use axum::{routing::get, Router};

use crate::handlers::get_capabilities;

/// Routes expect the caller's `Actor` in request extensions (see `actor_middleware`).
pub fn create_security_router() -> Router {
    Router::new().route("/capabilities", get(get_capabilities))
}
