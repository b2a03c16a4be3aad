use super::AppError;
use crate::{
    auth::{self, Principal, TokenKeys},
    database::Database,
    model::{Role, User},
};
use serde::{Deserialize, Serialize};

pub const ADMIN_USERNAME: &str = "admin";
pub const ADMIN_EMAIL: &str = "admin@gallery.local";

#[derive(Debug, Clone, Deserialize)]
pub struct SignupRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

impl SignupRequest {
    fn validate(&self) -> Result<(), AppError> {
        let username_len = self.username.trim().chars().count();
        if !(3..=20).contains(&username_len) {
            return Err(AppError::Validation(
                "Username must be between 3 and 20 characters".to_string(),
            ));
        }

        let email = self.email.trim();
        if email.is_empty() || !email.contains('@') || email.chars().count() > 50 {
            return Err(AppError::Validation(
                "Email must be a valid address of at most 50 characters".to_string(),
            ));
        }

        let password_len = self.password.chars().count();
        if !(6..=40).contains(&password_len) {
            return Err(AppError::Validation(
                "Password must be between 6 and 40 characters".to_string(),
            ));
        }

        Ok(())
    }
}

/// Body returned by signin and signup.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuthToken {
    pub token: String,
    #[serde(rename = "type")]
    pub token_type: &'static str,
    pub id: i64,
    pub username: String,
    pub email: String,
    pub roles: Vec<Role>,
}

impl AuthToken {
    fn new(token: String, user: &User) -> Self {
        Self {
            token,
            token_type: "Bearer",
            id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
            roles: user.roles.clone(),
        }
    }
}

/// Registers a `ROLE_USER` account and signs it in.
pub async fn signup(
    db: &Database,
    keys: &TokenKeys,
    bcrypt_cost: u32,
    request: SignupRequest,
) -> Result<AuthToken, AppError> {
    request.validate()?;

    let username = request.username.trim();
    let email = request.email.trim();

    if db.username_exists(username).await? {
        return Err(AppError::Conflict("Username is already taken".to_string()));
    }
    if db.email_exists(email).await? {
        return Err(AppError::Conflict("Email is already in use".to_string()));
    }

    let hash = auth::hash_password(&request.password, bcrypt_cost).await?;

    // A concurrent signup can still win the race; the UNIQUE index decides.
    let user = db
        .create_user(username, email, &hash, &[Role::User])
        .await
        .map_err(|e| {
            if e.is_unique_violation() {
                AppError::Conflict("Username or email is already taken".to_string())
            } else {
                e.into()
            }
        })?;

    tracing::info!(user_id = user.id, username = %user.username, "registered user");

    Ok(AuthToken::new(keys.issue(&user)?, &user))
}

/// Verifies credentials and issues a token.
///
/// Unknown users and wrong passwords are reported identically.
pub async fn signin(
    db: &Database,
    keys: &TokenKeys,
    username: &str,
    password: &str,
) -> Result<AuthToken, AppError> {
    let bad_credentials = || AppError::Unauthorized("Bad credentials".to_string());

    let user = db
        .get_user_by_username(username.trim())
        .await?
        .ok_or_else(bad_credentials)?;

    if !auth::verify_password(password, &user.password_hash).await? {
        tracing::debug!(username = %user.username, "password mismatch");
        return Err(bad_credentials());
    }

    Ok(AuthToken::new(keys.issue(&user)?, &user))
}

/// Resolves a bearer token into the principal of a still existing user.
///
/// Any failure leaves the request anonymous, so this returns `None` rather
/// than an error for bad tokens.
pub async fn authenticate(
    db: &Database,
    keys: &TokenKeys,
    token: &str,
) -> Result<Option<Principal>, AppError> {
    let claims = match keys.verify(token) {
        Ok(claims) => claims,
        Err(e) => {
            tracing::warn!(error = %e, "rejected bearer token");
            return Ok(None);
        }
    };

    let user = db
        .get_user(claims.uid)
        .await?
        .filter(|user| user.username == claims.sub);

    if user.is_none() {
        tracing::warn!(user_id = claims.uid, "bearer token for unknown user");
    }

    Ok(user.as_ref().map(Principal::from))
}

/// Makes sure an `admin` account with both roles exists.
///
/// An existing account keeps its password and only gains the admin role.
pub async fn ensure_admin(
    db: &Database,
    bcrypt_cost: u32,
    password: &str,
) -> Result<User, AppError> {
    if let Some(user) = db.get_user_by_username(ADMIN_USERNAME).await? {
        if !user.has_role(Role::Admin) {
            db.ensure_user_role(user.id, Role::Admin).await?;
            tracing::info!(user_id = user.id, "granted admin role");
        }
        return db
            .get_user(user.id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User not found with id: {}", user.id)));
    }

    let hash = auth::hash_password(password, bcrypt_cost).await?;
    let user = db
        .create_user(ADMIN_USERNAME, ADMIN_EMAIL, &hash, &[Role::User, Role::Admin])
        .await?;

    tracing::info!(user_id = user.id, "created admin account");

    Ok(user)
}

/// Creates an account with explicit roles, as used by the admin CLI.
pub async fn create_user(
    db: &Database,
    bcrypt_cost: u32,
    request: SignupRequest,
    roles: &[Role],
) -> Result<User, AppError> {
    request.validate()?;

    let hash = auth::hash_password(&request.password, bcrypt_cost).await?;

    db.create_user(request.username.trim(), request.email.trim(), &hash, roles)
        .await
        .map_err(|e| {
            if e.is_unique_violation() {
                AppError::Conflict("Username or email is already taken".to_string())
            } else {
                e.into()
            }
        })
}
