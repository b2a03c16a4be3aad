//! Password hashing and bearer tokens.
//!
//! Passwords are bcrypt hashed on the blocking pool. Tokens are HS256 JWTs
//! carrying the username as `sub` plus the user id and roles; they are checked
//! for signature and expiry with zero leeway. Nothing is kept server side, so
//! signing out is up to the client.

use crate::model::{Role, User};
use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Hashes `password` with the given bcrypt cost.
pub async fn hash_password(password: &str, cost: u32) -> Result<String, AuthError> {
    let password = password.to_string();

    let hashed = tokio::task::spawn_blocking(move || bcrypt::hash(password, cost)).await??;

    Ok(hashed)
}

/// Checks `password` against a stored bcrypt hash.
///
/// A malformed stored hash counts as a mismatch.
pub async fn verify_password(password: &str, hash: &str) -> Result<bool, AuthError> {
    let password = password.to_string();
    let hash = hash.to_string();

    let result = tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash)).await?;

    match result {
        Ok(matches) => Ok(matches),
        Err(bcrypt::BcryptError::InvalidHash(_)) | Err(bcrypt::BcryptError::InvalidPrefix(_)) => {
            tracing::warn!("stored password hash is malformed");
            Ok(false)
        }
        Err(e) => Err(e.into()),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// Username.
    pub sub: String,
    pub uid: i64,
    pub roles: Vec<Role>,
    pub iat: i64,
    pub exp: i64,
}

/// Signing material plus token lifetime.
#[derive(Clone)]
pub struct TokenKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl TokenKeys {
    pub fn new(secret: &[u8], ttl: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            ttl,
        }
    }

    pub fn issue(&self, user: &User) -> Result<String, AuthError> {
        self.issue_at(user, Utc::now())
    }

    /// Issues a token as if the current time were `now`.
    pub fn issue_at(&self, user: &User, now: DateTime<Utc>) -> Result<String, AuthError> {
        let iat = now.timestamp();
        let claims = Claims {
            sub: user.username.clone(),
            uid: user.id,
            roles: user.roles.clone(),
            iat,
            exp: iat + self.ttl.as_secs() as i64,
        };

        Ok(jsonwebtoken::encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &self.encoding,
        )?)
    }

    /// Checks signature and expiry and returns the claims.
    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        let data = jsonwebtoken::decode::<Claims>(token, &self.decoding, &validation)?;

        Ok(data.claims)
    }
}

/// The authenticated caller of one request.
#[derive(Debug, Clone, PartialEq)]
pub struct Principal {
    pub user_id: i64,
    pub username: String,
    pub roles: Vec<Role>,
}

impl Principal {
    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }

    pub fn is_admin(&self) -> bool {
        self.has_role(Role::Admin)
    }
}

impl From<&User> for Principal {
    fn from(user: &User) -> Self {
        Self {
            user_id: user.id,
            username: user.username.clone(),
            roles: user.roles.clone(),
        }
    }
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid token: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),

    #[error("password hashing failed: {0}")]
    Hash(#[from] bcrypt::BcryptError),

    #[error("blocking task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

#[cfg(test)]
mod tests {
    use super::{AuthError, Principal, TokenKeys, hash_password, verify_password};
    use crate::model::{Role, User};
    use chrono::{Duration as ChronoDuration, Utc};
    use std::time::Duration;

    const SECRET: &[u8] = b"0123456789abcdef0123456789abcdef";

    fn user() -> User {
        User {
            id: 7,
            username: "alice".to_string(),
            email: "alice@example.com".to_string(),
            password_hash: String::new(),
            roles: vec![Role::User, Role::Admin],
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_hash_and_verify() {
        let hash = hash_password("secret-password", 4).await.unwrap();

        assert_ne!("secret-password", hash);
        assert!(verify_password("secret-password", &hash).await.unwrap());
        assert!(!verify_password("wrong-password", &hash).await.unwrap());
        assert!(!verify_password("secret-password", "not a hash").await.unwrap());
    }

    #[test]
    fn test_token_round_trip() {
        let keys = TokenKeys::new(SECRET, Duration::from_secs(3600));

        let claims = keys.verify(&keys.issue(&user()).unwrap()).unwrap();

        assert_eq!("alice", claims.sub);
        assert_eq!(7, claims.uid);
        assert_eq!(vec![Role::User, Role::Admin], claims.roles);
        assert_eq!(3600, claims.exp - claims.iat);
    }

    #[test]
    fn test_token_expires() {
        let keys = TokenKeys::new(SECRET, Duration::from_secs(60));
        let issued_at = Utc::now() - ChronoDuration::seconds(61);

        let token = keys.issue_at(&user(), issued_at).unwrap();

        assert!(matches!(keys.verify(&token), Err(AuthError::Token(_))));
    }

    #[test]
    fn test_token_signed_with_other_secret() {
        let keys = TokenKeys::new(SECRET, Duration::from_secs(60));
        let other = TokenKeys::new(b"another-secret-another-secret-xx", Duration::from_secs(60));

        let token = other.issue(&user()).unwrap();

        assert!(keys.verify(&token).is_err());
        assert!(keys.verify("garbage").is_err());
    }

    #[test]
    fn test_principal_roles() {
        let principal = Principal::from(&user());

        assert!(principal.is_admin());
        assert!(principal.has_role(Role::User));
        assert_eq!(7, principal.user_id);
    }
}
