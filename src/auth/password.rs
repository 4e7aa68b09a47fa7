use std::sync::Arc;

/// bcrypt hashing with the configured cost.
///
/// Holds a throwaway hash so that a login attempt for an unknown e-mail
/// still pays for one full bcrypt verification.
#[derive(Clone)]
pub struct PasswordHasher {
    cost: u32,
    decoy: Arc<str>,
}

impl PasswordHasher {
    pub fn new(cost: u32) -> Result<Self, bcrypt::BcryptError> {
        let decoy = bcrypt::hash("agora-decoy-password", cost)?;
        Ok(Self {
            cost,
            decoy: decoy.into(),
        })
    }

    pub fn hash(&self, plaintext: &str) -> Result<String, bcrypt::BcryptError> {
        bcrypt::hash(plaintext, self.cost)
    }

    /// Constant-time verification via bcrypt. A malformed stored hash never
    /// verifies.
    pub fn verify(&self, plaintext: &str, hash: &str) -> bool {
        bcrypt::verify(plaintext, hash).unwrap_or(false)
    }

    /// Burn the same time as `verify` when there is no stored hash to check.
    pub fn verify_decoy(&self, plaintext: &str) {
        let _ = bcrypt::verify(plaintext, &self.decoy);
    }
}
