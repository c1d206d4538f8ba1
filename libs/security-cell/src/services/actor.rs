// =====================================================================================
// ACTOR RESOLUTION - AUTHENTICATED USER TO STAFF MEMBER
// =====================================================================================

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use shared_database::ClinicRepository;
use shared_models::{auth::User, Actor, AppError};
use shared_utils::extractor::extract_user;

/// Maps a validated token subject onto an active `doctors` row.
#[derive(Clone)]
pub struct ActorResolver {
    repository: Arc<dyn ClinicRepository>,
}

impl ActorResolver {
    pub fn new(repository: Arc<dyn ClinicRepository>) -> Self {
        Self { repository }
    }

    #[instrument(skip(self, user), fields(user_id = %user.id))]
    pub async fn resolve(&self, user: &User) -> Result<Actor, AppError> {
        let id = Uuid::parse_str(&user.id)
            .map_err(|_| AppError::Auth("Token subject is not a staff id".to_string()))?;

        let doctor = self.repository.get_doctor(id).await?.ok_or_else(|| {
            warn!(target: "security", user_id = %id, "Token for unknown staff member");
            AppError::Auth("Unknown staff member".to_string())
        })?;

        if !doctor.active {
            warn!(target: "security", user_id = %id, "Token for deactivated staff member");
            return Err(AppError::Auth("Staff member is deactivated".to_string()));
        }

        debug!("Resolved actor {} as {}", doctor.id, doctor.role);
        Ok(Actor::new(doctor.id, doctor.name, doctor.role))
    }
}

// Runs after `auth_middleware`; stores the resolved `Actor` in request extensions.
pub async fn actor_middleware(
    State(resolver): State<Arc<ActorResolver>>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let user = extract_user(&request)?;
    let actor = resolver.resolve(&user).await?;

    request.extensions_mut().insert(actor);

    Ok(next.run(request).await)
}
