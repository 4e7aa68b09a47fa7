pub mod credentials;
pub mod middleware;
pub mod password;
pub mod session;

pub use credentials::{CredentialError, CredentialStore};
pub use middleware::Viewer;
pub use password::PasswordHasher;
pub use session::{Identity, IssuedSession, SessionError, SessionManager, SessionToken};

use crate::db::models::User;
use crate::db::Deadline;

#[derive(Debug, thiserror::Error)]
pub enum LoginError {
    /// Deliberately says nothing about which half was wrong.
    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error(transparent)]
    Credential(#[from] CredentialError),

    #[error(transparent)]
    Session(#[from] SessionError),
}

/// Check an e-mail/password pair and issue a session for its owner.
///
/// Any prior session of that user is revoked by the issue.
pub fn login(
    credentials: &CredentialStore,
    passwords: &PasswordHasher,
    sessions: &SessionManager,
    email: &str,
    password: &str,
    deadline: Deadline,
) -> Result<(User, IssuedSession), LoginError> {
    let user = match credentials.find_by_email(email, deadline) {
        Ok(user) => user,
        Err(CredentialError::NotFound) => {
            passwords.verify_decoy(password);
            return Err(LoginError::InvalidCredentials);
        }
        Err(e) => return Err(e.into()),
    };

    if !passwords.verify(password, &user.password_hash) {
        tracing::info!(user_id = %user.id, "Login rejected");
        return Err(LoginError::InvalidCredentials);
    }

    let issued = sessions.issue(user.id, deadline)?;
    Ok((user, issued))
}
