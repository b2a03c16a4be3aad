use crate::{
    AppState,
    error::ApiError,
    extract::{CurrentUser, JsonBody, MaybeUser, Paging, PathParam},
};
use axum::{Json, extract::State};
use gallery::{app::comments, model::Comment, query::Page};
use serde::Deserialize;

#[derive(Deserialize)]
pub struct CommentBody {
    #[serde(default)]
    comment: String,
}

pub async fn add_comment(
    State(state): State<AppState>,
    CurrentUser(principal): CurrentUser,
    PathParam(image_id): PathParam<i64>,
    JsonBody(body): JsonBody<CommentBody>,
) -> Result<Json<Comment>, ApiError> {
    Ok(Json(
        comments::add(&state.db, &principal, image_id, &body.comment).await?,
    ))
}

pub async fn image_comments(
    State(state): State<AppState>,
    viewer: MaybeUser,
    PathParam(image_id): PathParam<i64>,
    Paging(page): Paging,
) -> Result<Json<Page<Comment>>, ApiError> {
    Ok(Json(
        comments::list_by_image(&state.db, viewer.principal(), image_id, page).await?,
    ))
}

pub async fn user_comments(
    State(state): State<AppState>,
    viewer: MaybeUser,
    PathParam(user_id): PathParam<i64>,
    Paging(page): Paging,
) -> Result<Json<Page<Comment>>, ApiError> {
    Ok(Json(
        comments::list_by_user(&state.db, viewer.principal(), user_id, page).await?,
    ))
}
