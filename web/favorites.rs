use crate::{
    AppState,
    error::ApiError,
    extract::{CurrentUser, JsonBody, Paging, PathParam},
};
use axum::{Json, extract::State};
use gallery::{app::favorites, model::Favorite, query::Page};

pub async fn add_favorite(
    State(state): State<AppState>,
    CurrentUser(principal): CurrentUser,
    PathParam(image_id): PathParam<i64>,
) -> Result<Json<Favorite>, ApiError> {
    Ok(Json(favorites::add(&state.db, &principal, image_id).await?))
}

pub async fn remove_favorite(
    State(state): State<AppState>,
    CurrentUser(principal): CurrentUser,
    PathParam(image_id): PathParam<i64>,
) -> Result<(), ApiError> {
    favorites::remove(&state.db, &principal, image_id).await?;

    Ok(())
}

pub async fn check_favorite(
    State(state): State<AppState>,
    CurrentUser(principal): CurrentUser,
    PathParam(image_id): PathParam<i64>,
) -> Result<Json<bool>, ApiError> {
    Ok(Json(
        favorites::check(&state.db, &principal, image_id).await?,
    ))
}

pub async fn list_favorites(
    State(state): State<AppState>,
    CurrentUser(principal): CurrentUser,
    Paging(page): Paging,
) -> Result<Json<Page<Favorite>>, ApiError> {
    Ok(Json(favorites::list(&state.db, &principal, page).await?))
}

/// Body is a bare JSON array of image ids.
pub async fn batch_add_favorites(
    State(state): State<AppState>,
    CurrentUser(principal): CurrentUser,
    JsonBody(image_ids): JsonBody<Vec<i64>>,
) -> Result<Json<Vec<Favorite>>, ApiError> {
    Ok(Json(
        favorites::batch_add(&state.db, &principal, &image_ids).await?,
    ))
}
