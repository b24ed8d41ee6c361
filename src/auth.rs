use argon2::password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, SaltString};
use argon2::{Argon2, PasswordVerifier};
use sea_orm::{ColumnTrait, Condition, DatabaseConnection, EntityTrait, QueryFilter};
use std::sync::Arc;

use crate::entities::{user, User};
use crate::errors::ServiceError;
use crate::session::Session;

/// Password verification seam. Production uses Argon2; tests can swap in
/// a cheap implementation to avoid paying the KDF cost per request.
pub trait CredentialVerifier: Send + Sync {
    fn verify(&self, password: &str, password_hash: &str) -> bool;
    fn hash(&self, password: &str) -> Result<String, ServiceError>;
}

#[derive(Default)]
pub struct Argon2Verifier;

impl CredentialVerifier for Argon2Verifier {
    fn verify(&self, password: &str, password_hash: &str) -> bool {
        let Ok(parsed) = PasswordHash::new(password_hash) else {
            return false;
        };
        Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok()
    }

    fn hash(&self, password: &str) -> Result<String, ServiceError> {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| ServiceError::Internal(format!("Password hashing failed: {}", e)))
    }
}

/// Authentication over stored accounts. Login accepts either username or
/// email as the identifier.
pub struct AuthService {
    db: Arc<DatabaseConnection>,
    verifier: Arc<dyn CredentialVerifier>,
}

impl AuthService {
    pub fn new(db: Arc<DatabaseConnection>, verifier: Arc<dyn CredentialVerifier>) -> Self {
        Self { db, verifier }
    }

    /// Resolves credentials to an account. Failures are deliberately
    /// indistinguishable: unknown identifier and wrong password return
    /// the same error.
    pub async fn authenticate(
        &self,
        identifier: &str,
        password: &str,
    ) -> Result<user::Model, ServiceError> {
        let account = User::find()
            .filter(
                Condition::any()
                    .add(user::Column::Username.eq(identifier))
                    .add(user::Column::Email.eq(identifier)),
            )
            .one(self.db.as_ref())
            .await?;

        match account {
            Some(account) if self.verifier.verify(password, &account.password_hash) => Ok(account),
            _ => Err(ServiceError::Unauthorized(
                "Invalid credentials".to_string(),
            )),
        }
    }

    pub async fn get_user(&self, user_id: i64) -> Result<user::Model, ServiceError> {
        User::find_by_id(user_id)
            .one(self.db.as_ref())
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("User {} not found", user_id)))
    }
}

/// Requires a logged-in session; returns the user id.
pub fn require_user(session: &Session) -> Result<i64, ServiceError> {
    session
        .user_id()
        .ok_or_else(|| ServiceError::Unauthorized("Login required".to_string()))
}

/// Requires the session user to hold the admin flag.
pub async fn require_admin(auth: &AuthService, session: &Session) -> Result<user::Model, ServiceError> {
    let user_id = require_user(session)?;
    let account = auth.get_user(user_id).await?;
    if !account.is_admin {
        return Err(ServiceError::Forbidden(
            "Administrator access required".to_string(),
        ));
    }
    Ok(account)
}
