//! Request-time identity resolution.
//!
//! [`authenticate`] runs once per request, before any handler, and stores a
//! [`Viewer`] in the request extensions. A missing, unknown, revoked or
//! expired token all produce the same anonymous viewer.

use axum::extract::{Request, State};
use axum::http::{header, HeaderMap};
use axum::middleware::Next;
use axum::response::Response;

use crate::auth::session::{Identity, SessionError, SessionManager};
use crate::db::Deadline;
use crate::error::AppError;
use crate::state::AppState;

/// Who is making the request. `None` is anonymous.
#[derive(Debug, Clone, Default)]
pub struct Viewer(pub Option<Identity>);

/// Resolve an optional session token to an identity.
pub fn resolve(
    sessions: &SessionManager,
    token: Option<&str>,
    deadline: Deadline,
) -> Result<Option<Identity>, SessionError> {
    match token {
        Some(token) if !token.is_empty() => sessions.validate(token, deadline),
        _ => Ok(None),
    }
}

pub async fn authenticate(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = session_token(request.headers(), &state.config.auth.cookie_name);
    let identity = resolve(&state.sessions, token, state.deadline())?;
    request.extensions_mut().insert(Viewer(identity));
    Ok(next.run(request).await)
}

/// Value of the named cookie, if the request carries one.
pub fn session_token<'a>(headers: &'a HeaderMap, cookie_name: &str) -> Option<&'a str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|s| s.split(';'))
        .map(|s| s.trim())
        .find_map(|cookie| {
            let (key, val) = cookie.split_once('=')?;
            (key.trim() == cookie_name).then(|| val.trim())
        })
}
