use crate::{
    AppState,
    error::ApiError,
    extract::{CurrentUser, JsonBody, Paging},
};
use axum::{Json, extract::State};
use gallery::{
    app::history::{self, SaveSearchRequest},
    model::SearchHistory,
    query::Page,
};
use serde_json::{Value, json};

pub async fn save_search(
    State(state): State<AppState>,
    CurrentUser(principal): CurrentUser,
    JsonBody(request): JsonBody<SaveSearchRequest>,
) -> Result<Json<SearchHistory>, ApiError> {
    Ok(Json(history::save(&state.db, &principal, request).await?))
}

pub async fn list_searches(
    State(state): State<AppState>,
    CurrentUser(principal): CurrentUser,
    Paging(page): Paging,
) -> Result<Json<Page<SearchHistory>>, ApiError> {
    Ok(Json(history::list(&state.db, &principal, page).await?))
}

pub async fn clear_searches(
    State(state): State<AppState>,
    CurrentUser(principal): CurrentUser,
) -> Result<Json<Value>, ApiError> {
    let removed = history::clear(&state.db, &principal).await?;

    Ok(Json(json!({
        "message": "Search history cleared",
        "removed": removed,
    })))
}
