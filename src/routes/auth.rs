use askama::Template;
use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Form, Router};
use chrono::Utc;
use serde::Deserialize;

use crate::auth::middleware::session_token;
use crate::auth::{self, CredentialError, IssuedSession, LoginError};
use crate::config::AuthConfig;
use crate::error::AppResult;
use crate::extractors::MaybeUser;
use crate::routes::home::{html_with_status, Html};
use crate::state::AppState;

pub const MIN_PASSWORD_LEN: usize = 8;

// -- Templates --

#[derive(Template, Default)]
#[template(path = "pages/login.html")]
pub struct LoginTemplate {
    pub viewer: Option<String>,
    pub email: String,
    pub error: String,
}

#[derive(Template, Default)]
#[template(path = "pages/register.html")]
pub struct RegisterTemplate {
    pub viewer: Option<String>,
    pub email: String,
    pub username: String,
    pub email_error: String,
    pub username_error: String,
    pub password_error: String,
    pub error: String,
}

// -- Request types --

#[derive(Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Deserialize)]
pub struct RegisterForm {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub confirm: String,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/register", get(register_page).post(register))
        .route("/login", get(login_page).post(login))
        .route("/logout", post(logout))
}

// -- Cookie helpers --

/// Cookie carrying an issued session. Value and lifetime come straight from
/// the issued session.
pub fn session_cookie(config: &AuthConfig, issued: &IssuedSession) -> String {
    let max_age = (issued.expires_at - Utc::now()).num_seconds().max(0);
    let mut cookie = format!(
        "{}={}; HttpOnly; SameSite=Lax; Path=/; Max-Age={}; Expires={}",
        config.cookie_name,
        issued.token.as_str(),
        max_age,
        issued.expires_at.format("%a, %d %b %Y %H:%M:%S GMT"),
    );
    if config.secure_cookie {
        cookie.push_str("; Secure");
    }
    cookie
}

pub fn clear_session_cookie(config: &AuthConfig) -> String {
    let mut cookie = format!(
        "{}=; HttpOnly; SameSite=Lax; Path=/; Max-Age=0",
        config.cookie_name
    );
    if config.secure_cookie {
        cookie.push_str("; Secure");
    }
    cookie
}

fn see_other(location: &str) -> Response {
    (StatusCode::SEE_OTHER, [(header::LOCATION, location.to_string())]).into_response()
}

// -- Registration --

async fn register_page(MaybeUser(user): MaybeUser) -> Response {
    if user.is_some() {
        return see_other("/");
    }
    Html(RegisterTemplate::default()).into_response()
}

/// POST /register: create the account, then send the user to log in
async fn register(
    State(state): State<AppState>,
    Form(form): Form<RegisterForm>,
) -> AppResult<Response> {
    let email = form.email.trim().to_string();
    let username = form.username.trim().to_string();
    let mut page = RegisterTemplate {
        email: email.clone(),
        username: username.clone(),
        ..Default::default()
    };

    if email.is_empty() || username.is_empty() || form.password.is_empty() {
        page.error = "All fields are required".into();
    } else if !email.contains('@') {
        page.email_error = "Enter a valid email address".into();
    } else if form.password.chars().count() < MIN_PASSWORD_LEN {
        page.password_error = format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        );
    } else if form.password != form.confirm {
        page.password_error = "Passwords do not match".into();
    }
    if !(page.error.is_empty() && page.email_error.is_empty() && page.password_error.is_empty())
    {
        return Ok(html_with_status(StatusCode::BAD_REQUEST, page));
    }

    let hash = state.passwords.hash(&form.password)?;
    match state
        .credentials
        .create(&email, &username, &hash, state.deadline())
    {
        Ok(_) => Ok(see_other("/login")),
        Err(CredentialError::DuplicateEmail) => {
            page.email_error = "Email already exists".into();
            Ok(html_with_status(StatusCode::CONFLICT, page))
        }
        Err(CredentialError::DuplicateUsername) => {
            page.username_error = "Username already exists".into();
            Ok(html_with_status(StatusCode::CONFLICT, page))
        }
        Err(e) => Err(e.into()),
    }
}

// -- Login / logout --

async fn login_page(MaybeUser(user): MaybeUser) -> Response {
    if user.is_some() {
        return see_other("/");
    }
    Html(LoginTemplate::default()).into_response()
}

/// POST /login: verify credentials and start a session
async fn login(State(state): State<AppState>, Form(form): Form<LoginForm>) -> AppResult<Response> {
    let email = form.email.trim().to_string();

    let result = auth::login(
        &state.credentials,
        &state.passwords,
        &state.sessions,
        &email,
        &form.password,
        state.deadline(),
    );

    match result {
        Ok((_user, issued)) => Ok((
            StatusCode::SEE_OTHER,
            [
                (header::LOCATION, "/".to_string()),
                (
                    header::SET_COOKIE,
                    session_cookie(&state.config.auth, &issued),
                ),
            ],
        )
            .into_response()),
        Err(e @ LoginError::InvalidCredentials) => Ok(html_with_status(
            StatusCode::UNAUTHORIZED,
            LoginTemplate {
                viewer: None,
                email,
                error: e.to_string(),
            },
        )),
        Err(e) => Err(e.into()),
    }
}

/// POST /logout: revoke the session and clear the cookie
async fn logout(State(state): State<AppState>, headers: HeaderMap) -> AppResult<Response> {
    if let Some(token) = session_token(&headers, &state.config.auth.cookie_name) {
        state.sessions.revoke(token, state.deadline())?;
    }

    Ok((
        StatusCode::SEE_OTHER,
        [
            (header::LOCATION, "/".to_string()),
            (
                header::SET_COOKIE,
                clear_session_cookie(&state.config.auth),
            ),
        ],
    )
        .into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::SessionToken;
    use chrono::Duration;

    fn issued(hours: i64) -> IssuedSession {
        IssuedSession {
            token: SessionToken::generate(),
            expires_at: Utc::now() + Duration::hours(hours),
        }
    }

    #[test]
    fn session_cookie_carries_token_and_lifetime() {
        let config = AuthConfig::default();
        let issued = issued(24);
        let cookie = session_cookie(&config, &issued);

        assert!(cookie.starts_with(&format!("forum_session={};", issued.token.as_str())));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("SameSite=Lax"));
        assert!(cookie.contains("Path=/"));
        assert!(cookie.contains("Expires="));
        assert!(!cookie.contains("Secure"));

        let max_age: i64 = cookie
            .split("; ")
            .find_map(|part| part.strip_prefix("Max-Age="))
            .unwrap()
            .parse()
            .unwrap();
        assert!((86_390..=86_400).contains(&max_age));
    }

    #[test]
    fn secure_flag_follows_config() {
        let config = AuthConfig {
            secure_cookie: true,
            ..AuthConfig::default()
        };
        assert!(session_cookie(&config, &issued(1)).ends_with("; Secure"));
        assert!(clear_session_cookie(&config).ends_with("; Secure"));
    }

    #[test]
    fn clear_cookie_expires_immediately() {
        let cookie = clear_session_cookie(&AuthConfig::default());
        assert!(cookie.starts_with("forum_session=;"));
        assert!(cookie.contains("Max-Age=0"));
    }
}
