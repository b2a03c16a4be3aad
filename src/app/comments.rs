use super::{AppError, visible_image};
use crate::{
    auth::Principal,
    database::Database,
    model::Comment,
    query::{Page, PageRequest},
};

pub const MAX_COMMENT_LEN: usize = 1000;

/// Comments on a visible image and bumps its comment counter.
pub async fn add(
    db: &Database,
    principal: &Principal,
    image_id: i64,
    content: &str,
) -> Result<Comment, AppError> {
    let content = content.trim();
    if content.is_empty() {
        return Err(AppError::Validation("Comment cannot be empty".to_string()));
    }
    if content.chars().count() > MAX_COMMENT_LEN {
        return Err(AppError::Validation(format!(
            "Comment must be at most {MAX_COMMENT_LEN} characters"
        )));
    }

    visible_image(db, image_id, Some(principal)).await?;

    let comment = db.add_comment(image_id, principal.user_id, content).await?;
    tracing::info!(comment_id = comment.id, image_id, user_id = principal.user_id, "added comment");

    Ok(comment)
}

pub async fn list_by_image(
    db: &Database,
    viewer: Option<&Principal>,
    image_id: i64,
    page: PageRequest,
) -> Result<Page<Comment>, AppError> {
    visible_image(db, image_id, viewer).await?;

    Ok(db.get_comments_by_image(image_id, page).await?)
}

/// A user's comments, limited to images the viewer can see.
pub async fn list_by_user(
    db: &Database,
    viewer: Option<&Principal>,
    user_id: i64,
    page: PageRequest,
) -> Result<Page<Comment>, AppError> {
    if db.get_user(user_id).await?.is_none() {
        return Err(AppError::NotFound(format!("User not found with id: {user_id}")));
    }

    Ok(db
        .get_comments_by_user(user_id, viewer.map(|p| p.user_id), page)
        .await?)
}
