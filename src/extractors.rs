use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::auth::middleware::{resolve, session_token};
use crate::auth::{Identity, Viewer};
use crate::db::models::UserId;
use crate::error::AppError;
use crate::state::AppState;

/// The authenticated user making the request.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub id: UserId,
    pub username: String,
}

impl From<Identity> for CurrentUser {
    fn from(identity: Identity) -> Self {
        Self {
            id: identity.user_id,
            username: identity.username,
        }
    }
}

/// Extractor that requires authentication.
/// Rejects with a redirect to the login page if there is no valid session.
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let MaybeUser(user) = MaybeUser::from_request_parts(parts, state).await?;
        user.ok_or(AppError::Unauthorized)
    }
}

/// Optional user extractor. `None` instead of a redirect when anonymous.
pub struct MaybeUser(pub Option<CurrentUser>);

impl FromRequestParts<AppState> for MaybeUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        // Normally set by the authenticate layer; routers mounted without it
        // resolve the cookie here.
        let identity = match parts.extensions.get::<Viewer>() {
            Some(Viewer(identity)) => identity.clone(),
            None => {
                let token = session_token(&parts.headers, &state.config.auth.cookie_name);
                resolve(&state.sessions, token, state.deadline())?
            }
        };
        Ok(MaybeUser(identity.map(CurrentUser::from)))
    }
}
