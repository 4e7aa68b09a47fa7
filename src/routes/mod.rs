pub mod assets;
pub mod auth;
pub mod home;
pub mod posts;

use axum::middleware;
use axum::routing::get;
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::auth::middleware::authenticate;
use crate::state::AppState;

/// The full application router with identity resolution and request tracing.
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/", get(home::index))
        .route("/assets/{*path}", get(assets::serve))
        .merge(auth::router())
        .merge(posts::router())
        .layer(middleware::from_fn_with_state(state.clone(), authenticate))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Accept only same-site absolute paths as redirect targets.
pub(crate) fn local_path(candidate: Option<&str>) -> Option<&str> {
    candidate.filter(|p| p.starts_with('/') && !p.starts_with("//") && !p.contains('\\'))
}
