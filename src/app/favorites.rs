use super::{AppError, visible_image};
use crate::{
    auth::Principal,
    database::Database,
    model::Favorite,
    query::{Page, PageRequest},
};

/// Favorites a visible image. A second add of the same pair is a conflict.
pub async fn add(db: &Database, principal: &Principal, image_id: i64) -> Result<Favorite, AppError> {
    visible_image(db, image_id, Some(principal)).await?;

    let favorite = db
        .add_favorite(principal.user_id, image_id)
        .await?
        .ok_or_else(|| AppError::Conflict("Image already in favorites".to_string()))?;

    tracing::info!(user_id = principal.user_id, image_id, "added favorite");

    Ok(favorite)
}

/// Drops the caller's favorite regardless of the image's current privacy.
pub async fn remove(db: &Database, principal: &Principal, image_id: i64) -> Result<(), AppError> {
    if !db.remove_favorite(principal.user_id, image_id).await? {
        return Err(AppError::NotFound("Image not in favorites".to_string()));
    }

    tracing::info!(user_id = principal.user_id, image_id, "removed favorite");

    Ok(())
}

pub async fn check(db: &Database, principal: &Principal, image_id: i64) -> Result<bool, AppError> {
    visible_image(db, image_id, Some(principal)).await?;

    Ok(db.favorite_exists(principal.user_id, image_id).await?)
}

pub async fn list(
    db: &Database,
    principal: &Principal,
    page: PageRequest,
) -> Result<Page<Favorite>, AppError> {
    Ok(db.get_favorites(principal.user_id, page).await?)
}

/// Adds every id independently and returns the favorites actually created.
///
/// Ids that fail (hidden, missing, already favorited) are logged and skipped.
pub async fn batch_add(
    db: &Database,
    principal: &Principal,
    image_ids: &[i64],
) -> Result<Vec<Favorite>, AppError> {
    if image_ids.is_empty() {
        return Err(AppError::Validation(
            "Image IDs list cannot be empty".to_string(),
        ));
    }

    let mut added = Vec::with_capacity(image_ids.len());
    for &image_id in image_ids {
        match add(db, principal, image_id).await {
            Ok(favorite) => added.push(favorite),
            Err(e) => {
                tracing::warn!(user_id = principal.user_id, image_id, error = %e, "skipped favorite")
            }
        }
    }

    if added.is_empty() {
        return Err(AppError::Validation(
            "No images were added to favorites".to_string(),
        ));
    }

    Ok(added)
}
