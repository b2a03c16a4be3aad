//! # Service layer
//!
//! Free async functions that orchestrate the repository, storage, upstream
//! client and token keys. Handlers call these and never touch SQL directly.
//!
//! - [`accounts`]: signup, signin, bearer token resolution, admin bootstrap.
//! - [`images`]: listing and search (local and upstream), uploads, external
//!   saves, likes, privacy changes and deletion.
//! - [`favorites`], [`comments`], [`categories`], [`history`]: the remaining
//!   resources.
//!
//! Every image lookup goes through [`visible_image`], so an image the caller
//! may not see is indistinguishable from one that does not exist.
//!
//! ## Error Handling
//!
//! [`AppError`] wraps the errors of every collaborator and adds the domain
//! outcomes (validation, not found, conflict, unauthenticated, forbidden) the
//! web layer turns into status codes.

pub mod accounts;
pub mod categories;
pub mod comments;
pub mod favorites;
pub mod history;
pub mod images;

use crate::{
    auth::{AuthError, Principal},
    database::{Database, DatabaseError},
    model::Image,
    storage::StorageError,
    upstream::UpstreamError,
};

/// Loads an image if `viewer` is allowed to see it.
///
/// Missing and hidden images both yield `AppError::NotFound`.
pub async fn visible_image(
    db: &Database,
    id: i64,
    viewer: Option<&Principal>,
) -> Result<Image, AppError> {
    db.get_image(id)
        .await?
        .filter(|image| image.is_visible_to(viewer.map(|p| p.user_id)))
        .ok_or_else(|| image_not_found(id))
}

pub(crate) fn image_not_found(id: i64) -> AppError {
    AppError::NotFound(format!("Image not found with id: {id}"))
}

/// Error types within the application, encapsulating collaborator failures and domain outcomes.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("upstream error: {0}")]
    Upstream(#[from] UpstreamError),

    #[error("authentication error: {0}")]
    Auth(#[from] AuthError),

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),
}

#[cfg(test)]
pub(crate) mod tests {
    use crate::{
        app::{AppError, visible_image},
        auth::Principal,
        database::{
            Database,
            tests::{get_database, new_image},
        },
        model::{ImagePrivacy, Role},
    };

    pub async fn principal(db: &Database, name: &str, roles: &[Role]) -> Principal {
        let user = db
            .create_user(name, &format!("{name}@example.com"), "hash", roles)
            .await
            .unwrap();
        Principal::from(&user)
    }

    #[tokio::test]
    async fn test_visible_image_hides_private() {
        let db = get_database().await;
        let alice = principal(&db, "alice", &[Role::User]).await;
        let bob = principal(&db, "bob", &[Role::User]).await;
        let image = db
            .ensure_image(&new_image(
                "https://cdn.example.com/a.jpg",
                Some(alice.user_id),
                ImagePrivacy::Private,
            ))
            .await
            .unwrap()
            .image;

        assert!(visible_image(&db, image.id, Some(&alice)).await.is_ok());
        assert!(matches!(
            visible_image(&db, image.id, Some(&bob)).await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            visible_image(&db, image.id, None).await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            visible_image(&db, image.id + 1, Some(&alice)).await,
            Err(AppError::NotFound(_))
        ));
    }
}
